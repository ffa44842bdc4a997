//! Text templating: variable substitution, inline effect tags, caching.
//!
//! Rendering runs a fixed pipeline: `${category:key}` tokens are substituted
//! against the current state first, then the substituted text is scanned for
//! `{{effect}}...{{effect}}` spans and split into segments. The tag scan (the
//! expensive, state-independent half) is cached, keyed by the exact string
//! the scanner received; substitution always runs fresh.

pub mod cache;
pub mod tags;
pub mod vars;

use std::time::Duration;

use thiserror::Error;

pub use cache::ParseCache;
pub use tags::{Segment, TagError, TextEffect, TextEffectKind, remove_tags, scan_tags, segment_text};
pub use vars::{UnresolvedToken, VariableEntry, VariableRegistry, substitute};

use crate::state::GameState;

/// Problems encountered while rendering. Reported alongside the rendered
/// output; rendering itself never fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unresolved template token '{token}'")]
    UnresolvedToken { token: String },
    #[error("unsupported effect tag '{tag}'")]
    UnsupportedEffect { tag: String },
    #[error("unmatched opening tag '{tag}'")]
    UnmatchedTag { tag: String },
}

/// Fully rendered scene text: clean display string, effect spans in clean
/// coordinates, and the segment runs the UI animates.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedText {
    pub text: String,
    pub effects: Vec<TextEffect>,
    pub segments: Vec<Segment>,
    pub errors: Vec<TemplateError>,
}

/// Template engine configuration. `use_cache: false` bypasses the parse cache
/// entirely.
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub use_cache: bool,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            cache_capacity: cache::DEFAULT_CAPACITY,
            cache_ttl: cache::DEFAULT_TTL,
            use_cache: true,
        }
    }
}

/// Stateful template engine: registry plus parse cache.
#[derive(Debug)]
pub struct TemplateEngine {
    registry: VariableRegistry,
    cache: ParseCache,
    use_cache: bool,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new(VariableRegistry::standard(), &TemplateConfig::default())
    }
}

impl TemplateEngine {
    pub fn new(registry: VariableRegistry, config: &TemplateConfig) -> Self {
        Self {
            registry,
            cache: ParseCache::new(config.cache_capacity, config.cache_ttl),
            use_cache: config.use_cache,
        }
    }

    pub fn registry_mut(&mut self) -> &mut VariableRegistry {
        &mut self.registry
    }

    /// Render scene text against the given state snapshot.
    pub fn render(&mut self, raw: &str, state: &GameState) -> RenderedText {
        let (substituted, token_errors) = substitute(raw, state, &self.registry);

        let scan = if self.use_cache {
            if let Some(hit) = self.cache.get(&substituted) {
                hit
            } else {
                let scan = scan_tags(&substituted);
                self.cache.insert(substituted.clone(), scan.clone());
                scan
            }
        } else {
            scan_tags(&substituted)
        };

        let segments = segment_text(&scan.clean, &scan.effects);
        let mut errors: Vec<TemplateError> = token_errors
            .into_iter()
            .map(|err| TemplateError::UnresolvedToken { token: err.token })
            .collect();
        errors.extend(scan.errors.iter().map(|err| match err {
            TagError::UnsupportedEffect { tag } => TemplateError::UnsupportedEffect { tag: tag.clone() },
            TagError::UnmatchedOpenTag { tag } => TemplateError::UnmatchedTag { tag: tag.clone() },
        }));

        RenderedText {
            text: scan.clean,
            effects: scan.effects,
            segments,
            errors,
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}
