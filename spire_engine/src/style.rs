//! Styling helpers for terminal output.
//!
//! The [`SceneStyle`] trait provides convenience methods for applying ANSI
//! styling via the `colored` crate. Implementations for `&str` and `String`
//! are provided so string literals can be styled directly.

use colored::{ColoredString, Colorize};

/// Convenience trait for applying color and style to text output.
pub trait SceneStyle {
    fn narration_style(&self) -> ColoredString;
    fn choice_number_style(&self) -> ColoredString;
    fn choice_style(&self) -> ColoredString;
    fn header_style(&self) -> ColoredString;
    fn status_style(&self) -> ColoredString;
    fn game_over_style(&self) -> ColoredString;
    fn error_style(&self) -> ColoredString;
}

impl SceneStyle for &str {
    fn narration_style(&self) -> ColoredString {
        self.truecolor(210, 210, 200)
    }
    fn choice_number_style(&self) -> ColoredString {
        self.bold().truecolor(220, 180, 40)
    }
    fn choice_style(&self) -> ColoredString {
        self.truecolor(102, 208, 250)
    }
    fn header_style(&self) -> ColoredString {
        let bracketed = format!("[{self}]");
        bracketed.truecolor(75, 80, 75)
    }
    fn status_style(&self) -> ColoredString {
        self.dimmed().truecolor(110, 220, 110)
    }
    fn game_over_style(&self) -> ColoredString {
        self.bold().truecolor(230, 30, 30)
    }
    fn error_style(&self) -> ColoredString {
        self.truecolor(230, 30, 30)
    }
}

impl SceneStyle for String {
    fn narration_style(&self) -> ColoredString {
        self.as_str().narration_style()
    }
    fn choice_number_style(&self) -> ColoredString {
        self.as_str().choice_number_style()
    }
    fn choice_style(&self) -> ColoredString {
        self.as_str().choice_style()
    }
    fn header_style(&self) -> ColoredString {
        self.as_str().header_style()
    }
    fn status_style(&self) -> ColoredString {
        self.as_str().status_style()
    }
    fn game_over_style(&self) -> ColoredString {
        self.as_str().game_over_style()
    }
    fn error_style(&self) -> ColoredString {
        self.as_str().error_style()
    }
}
