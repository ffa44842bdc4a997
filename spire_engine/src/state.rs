//! Player state snapshot and game-over bookkeeping.
//!
//! The authoritative `GameState` lives in the surrounding application; the
//! engine only receives snapshots and returns new ones. Nothing here mutates
//! state behind the caller's back.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Sentinel flag forcing a game over regardless of resources.
pub const FORCE_GAME_OVER_FLAG: &str = "force_game_over";

/// One held item and its quantity. Order of the containing list is authored
/// order; quantity may legitimately be zero after effects apply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemStack {
    pub id: String,
    pub quantity: i64,
}

/// Snapshot of everything the evaluators read: survival resources, toggles,
/// held items, skill levels, authored counters, and scene history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    pub health: i64,
    pub mind: i64,
    pub gold: i64,
    pub flags: HashSet<String>,
    pub buffs: HashSet<String>,
    pub items: Vec<ItemStack>,
    pub levels: HashMap<String, i64>,
    pub variables: HashMap<String, f64>,
    /// Finished and not re-selectable unless the scene is `repeatable`.
    pub completed_scenes: HashSet<String>,
    /// Ever shown to the player; drives first-visit detection.
    pub visited_scenes: HashSet<String>,
    pub death_count: u32,
    pub death_count_by_floor: HashMap<i64, u32>,
    pub current_floor: i64,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            health: 10,
            mind: 10,
            gold: 0,
            flags: HashSet::new(),
            buffs: HashSet::new(),
            items: Vec::new(),
            levels: HashMap::new(),
            variables: HashMap::new(),
            completed_scenes: HashSet::new(),
            visited_scenes: HashSet::new(),
            death_count: 0,
            death_count_by_floor: HashMap::new(),
            current_floor: 1,
        }
    }
}

impl GameState {
    /// Numeric value of a named stat, or None if the key names no stat.
    /// `gold` and the survival resources are stats; authored counters live in
    /// `variables` instead.
    pub fn stat(&self, key: &str) -> Option<f64> {
        #[allow(clippy::cast_precision_loss)]
        match key {
            "health" => Some(self.health as f64),
            "mind" => Some(self.mind as f64),
            "gold" => Some(self.gold as f64),
            _ => None,
        }
    }

    /// Held quantity for an item id; missing entries count as zero.
    pub fn item_quantity(&self, id: &str) -> i64 {
        self.items
            .iter()
            .find(|stack| stack.id == id)
            .map_or(0, |stack| stack.quantity)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn has_buff(&self, buff: &str) -> bool {
        self.buffs.contains(buff)
    }

    /// Skill level for a skill id; unknown skills are level zero.
    pub fn level(&self, skill: &str) -> i64 {
        self.levels.get(skill).copied().unwrap_or(0)
    }

    /// Authored counter value; unset counters read as zero.
    pub fn variable(&self, key: &str) -> f64 {
        self.variables.get(key).copied().unwrap_or(0.0)
    }

    pub fn is_first_visit(&self, scene_id: &str) -> bool {
        !self.visited_scenes.contains(scene_id)
    }

    pub fn mark_visited(&mut self, scene_id: &str) {
        self.visited_scenes.insert(scene_id.to_string());
    }

    pub fn mark_completed(&mut self, scene_id: &str) {
        self.completed_scenes.insert(scene_id.to_string());
    }

    /// Why the game is over right now, if it is. The force flag wins over
    /// resource exhaustion so the reason matches what triggered the transition.
    pub fn game_over_reason(&self) -> Option<GameOverReason> {
        if self.flags.contains(FORCE_GAME_OVER_FLAG) {
            Some(GameOverReason::Forced)
        } else if self.health <= 0 {
            Some(GameOverReason::HealthExhausted)
        } else if self.mind <= 0 {
            Some(GameOverReason::MindExhausted)
        } else {
            None
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over_reason().is_some()
    }
}

/// What ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverReason {
    HealthExhausted,
    MindExhausted,
    Forced,
}

impl fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameOverReason::HealthExhausted => write!(f, "health exhausted"),
            GameOverReason::MindExhausted => write!(f, "mind exhausted"),
            GameOverReason::Forced => write!(f, "forced game over"),
        }
    }
}

/// Side-effect channel into the external reducer. The engine uses it for a
/// small number of mutations that must reach the authoritative state: death
/// counting and clearing the force-game-over flag.
pub trait GameStateDispatch {
    fn increment_death_count(&mut self, floor: i64);
    fn clear_flag(&mut self, flag: &str);
}
