//! Terminal presentation of rendered scenes.
//!
//! The engine hands back clean text plus effect spans; in a real client
//! those spans drive animation. Here each effect kind maps to a static ANSI
//! approximation so authored markup stays visible while playtesting.

use colored::{ColoredString, Colorize};
use spire_data::Choice;

use crate::state::{GameOverReason, GameState};
use crate::style::SceneStyle as _;
use crate::template::{RenderedText, Segment, TextEffectKind};

const MIN_WIDTH: usize = 40;
const MAX_WIDTH: usize = 100;

pub struct SceneView {
    width: usize,
}

impl Default for SceneView {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneView {
    pub fn new() -> Self {
        Self {
            width: textwrap::termwidth().clamp(MIN_WIDTH, MAX_WIDTH),
        }
    }

    pub fn with_width(width: usize) -> Self {
        Self {
            width: width.clamp(MIN_WIDTH, MAX_WIDTH),
        }
    }

    /// Print one scene frame: header, styled narration, numbered choices.
    pub fn show_scene(&self, scene_id: &str, rendered: &RenderedText, choices: &[&Choice]) {
        println!("{}", scene_id.header_style());
        println!();
        self.show_segments(&rendered.segments);
        println!();
        for err in &rendered.errors {
            println!("{}", format!("(markup: {err})").error_style());
        }
        for (number, choice) in choices.iter().enumerate() {
            println!(
                "  {} {}",
                format!("{})", number + 1).choice_number_style(),
                choice.text.choice_style()
            );
        }
    }

    pub fn show_status(&self, state: &GameState) {
        let line = format!(
            "floor {}  health {}  mind {}  gold {}  deaths {}",
            state.current_floor, state.health, state.mind, state.gold, state.death_count
        );
        println!("{}", line.status_style());
    }

    pub fn show_game_over(&self, reason: GameOverReason) {
        println!();
        println!("{}", format!("GAME OVER: {reason}").game_over_style());
    }

    /// Word-wrap the narration while keeping per-segment styling. Splitting
    /// happens at whitespace only, so effect spans color whole words.
    fn show_segments(&self, segments: &[Segment]) {
        let mut column = 0usize;
        for segment in segments {
            for word in segment.text.split_inclusive(char::is_whitespace) {
                if word.ends_with('\n') {
                    print!("{}", style_segment_text(word.trim_end_matches('\n'), segment));
                    println!();
                    column = 0;
                    continue;
                }
                let len = word.chars().count();
                if column > 0 && column + len > self.width {
                    println!();
                    column = 0;
                }
                print!("{}", style_segment_text(word, segment));
                column += len;
            }
        }
        println!();
    }
}

/// ANSI stand-in for an effect span. The first effect on a segment wins;
/// the terminal cannot layer nested animations.
fn style_segment_text(text: &str, segment: &Segment) -> ColoredString {
    let Some(effect) = segment.effects.first() else {
        return text.narration_style();
    };
    let colored = match effect.color.as_deref().and_then(parse_hex_color) {
        Some((r, g, b)) => text.truecolor(r, g, b),
        None => text.normal(),
    };
    match effect.kind {
        TextEffectKind::Shake => colored.red().italic(),
        TextEffectKind::Wave => colored.cyan(),
        TextEffectKind::Pulse => colored.magenta(),
        TextEffectKind::Glow | TextEffectKind::Emphasis => colored.bold(),
        TextEffectKind::Rainbow => colored.bold().underline(),
        TextEffectKind::Fade => colored.dimmed(),
    }
}

/// `#rrggbb` to an RGB triple; anything else is ignored.
fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
    let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
    let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
    Some((r, g, b))
}
