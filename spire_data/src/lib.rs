//! Shared data model for Spire story content.

pub mod defs;
pub mod validate;

pub use defs::*;
pub use validate::{
    ValidationError, ValidationReport, ValidationWarning, validate_chapter, validate_choice, validate_condition,
    validate_effects, validate_scene, validate_scenes,
};
