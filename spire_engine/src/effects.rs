//! Effect application boundary.
//!
//! The engine constructs and validates [`SceneEffects`] but never executes
//! them itself; the surrounding state-management layer does. [`EffectApplier`]
//! is that seam. [`StandardApplier`] is the reference reducer used by the
//! play binary and the tests.

use log::warn;
use spire_data::{GameData, SceneEffects, ValidationReport, validate_effects};

use crate::state::{GameState, ItemStack};

/// External collaborator that turns an effects block plus a state snapshot
/// into a new snapshot.
pub trait EffectApplier {
    fn apply(&self, effects: &SceneEffects, state: &GameState) -> GameState;
}

/// Validate an effects block before handing it to an applier. Invalid blocks
/// must be rejected at authoring time; this is the runtime gate for callers
/// that want one.
pub fn check_effects(effects: &SceneEffects, data: Option<&GameData>) -> ValidationReport {
    validate_effects(effects, data)
}

/// Straightforward reducer: buffs and flags are set membership, item deltas
/// clamp at zero and drop emptied stacks, experience keys feed `variables`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardApplier;

impl EffectApplier for StandardApplier {
    fn apply(&self, effects: &SceneEffects, state: &GameState) -> GameState {
        let mut next = state.clone();

        for buff in &effects.add_buffs {
            next.buffs.insert(buff.clone());
        }
        for buff in &effects.remove_buffs {
            next.buffs.remove(buff);
        }
        for flag in &effects.set_flags {
            next.flags.insert(flag.clone());
        }
        for flag in &effects.unset_flags {
            next.flags.remove(flag);
        }

        for delta in &effects.items {
            if let Some(stack) = next.items.iter_mut().find(|stack| stack.id == delta.id) {
                stack.quantity += delta.delta;
            } else if delta.delta > 0 {
                next.items.push(ItemStack {
                    id: delta.id.clone(),
                    quantity: delta.delta,
                });
            } else {
                warn!("item effect removes '{}' which is not held", delta.id);
            }
        }
        next.items.retain(|stack| stack.quantity > 0);

        for (key, amount) in &effects.experience {
            *next.variables.entry(key.clone()).or_insert(0.0) += amount;
        }

        next
    }
}
