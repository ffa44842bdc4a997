#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

pub const SPIRE_VERSION: &str = env!("CARGO_PKG_VERSION");

// Core modules
pub mod chapters;
pub mod condition;
pub mod effects;
pub mod engine;
pub mod play;
pub mod probability;
pub mod rng;
pub mod selector;
pub mod source;
pub mod state;
pub mod store;
pub mod style;
pub mod template;
pub mod view;

// Re-exports for convenience
pub use chapters::ChapterManager;
pub use condition::{evaluate, evaluate_opt};
pub use effects::{EffectApplier, StandardApplier};
pub use engine::{GAME_OVER_CHAPTER_ID, GAME_OVER_SCENE, GAME_START_SCENE, SceneEngine, scene_display_text};
pub use play::run_play;
pub use probability::{calculate_probability, calculate_probability_with_max, process_probability};
pub use rng::{FixedRandom, RandomSource, ThreadRandom};
pub use selector::{available_choices, filter_random_selectable_scenes, select_random_from_scenes};
pub use source::{BundledChapters, ChapterLoadError, ChapterSource};
pub use state::{GameOverReason, GameState, GameStateDispatch, ItemStack};
pub use store::{FileStore, KvStore, MemoryStore, RoutedStore, SaveData};
pub use template::{RenderedText, TemplateConfig, TemplateEngine};
pub use view::SceneView;
