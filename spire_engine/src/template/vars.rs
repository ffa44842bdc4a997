//! `${category:key}` variable substitution.
//!
//! Tokens resolve through a registry mapping `category:key` to a state
//! accessor plus an optional formatter and a default. Unresolved tokens are
//! left verbatim in the output and reported (and logged) as errors, never
//! thrown; a typo in story text must not take the UI down.

use log::error;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::state::GameState;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+):([A-Za-z0-9_]+)\}").expect("token regex compiles"));

type Accessor = fn(&GameState, &str) -> Option<f64>;
type Formatter = fn(f64) -> String;

/// One registered token: how to read it from state, how to print it, and what
/// to show when the state has no value for it.
#[derive(Clone, Copy)]
pub struct VariableEntry {
    pub accessor: Accessor,
    pub formatter: Option<Formatter>,
    pub default: &'static str,
}

impl fmt::Debug for VariableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableEntry")
            .field("has_formatter", &self.formatter.is_some())
            .field("default", &self.default)
            .finish()
    }
}

/// Token that could not be resolved; left verbatim in the rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedToken {
    pub token: String,
}

impl fmt::Display for UnresolvedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unresolved template token '{}'", self.token)
    }
}

/// Static registry from `category:key` to accessor. Exact entries win; the
/// `variables`, `items`, and `levels` categories fall through to their state
/// maps so author-defined keys need no registration.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    entries: HashMap<String, VariableEntry>,
}

impl VariableRegistry {
    /// Registry with the built-in stat and progression tokens.
    pub fn standard() -> Self {
        let mut registry = Self::default();
        registry.register("stats", "health", |state, _| state.stat("health"));
        registry.register("stats", "mind", |state, _| state.stat("mind"));
        registry.register("stats", "gold", |state, _| state.stat("gold"));
        #[allow(clippy::cast_precision_loss)]
        {
            registry.register("progress", "death_count", |state, _| Some(f64::from(state.death_count)));
            registry.register("progress", "floor", |state, _| Some(state.current_floor as f64));
        }
        registry
    }

    /// Register `category:key` with a plain integer-style formatter.
    pub fn register(&mut self, category: &str, key: &str, accessor: Accessor) {
        self.register_entry(
            category,
            key,
            VariableEntry {
                accessor,
                formatter: None,
                default: "0",
            },
        );
    }

    pub fn register_entry(&mut self, category: &str, key: &str, entry: VariableEntry) {
        self.entries.insert(format!("{category}:{key}"), entry);
    }

    fn resolve(&self, category: &str, key: &str, state: &GameState) -> Option<String> {
        if let Some(entry) = self.entries.get(&format!("{category}:{key}")) {
            let Some(value) = (entry.accessor)(state, key) else {
                return Some(entry.default.to_string());
            };
            return Some(match entry.formatter {
                Some(format) => format(value),
                None => format_number(value),
            });
        }

        // Dynamic categories backed directly by state maps.
        #[allow(clippy::cast_precision_loss)]
        match category {
            "variables" => Some(format_number(state.variable(key))),
            "items" => Some(state.item_quantity(key).to_string()),
            "levels" => Some(state.level(key).to_string()),
            _ => None,
        }
    }
}

/// Replace every resolvable `${category:key}` token. Unresolved tokens stay
/// verbatim and come back in the error list.
pub fn substitute(text: &str, state: &GameState, registry: &VariableRegistry) -> (String, Vec<UnresolvedToken>) {
    let mut errors = Vec::new();
    let rendered = TOKEN_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let category = &caps[1];
        let key = &caps[2];
        match registry.resolve(category, key, state) {
            Some(value) => value,
            None => {
                let token = caps[0].to_string();
                error!("template token '{token}' has no registry entry; left verbatim");
                errors.push(UnresolvedToken { token: token.clone() });
                token
            },
        }
    });
    (rendered.into_owned(), errors)
}

/// Integers print without a trailing `.0`; everything else keeps one decimal.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}
