//! Probability-weighted branch outcomes.
//!
//! Rate computation is a pure additive sum: each modifier category contributes
//! `quantity * per_unit`, capped at its own `max` *before* accumulation, then
//! the total is clamped to `[0,1]` and optionally to `max_rate`. Capping each
//! bonus rather than the final rate is deliberate: several capped categories
//! may still sum past their individual caps.

use log::debug;
use spire_data::{ModifierSpec, NextTarget, ProbabilityModifiers, ProbabilitySpec};
use std::collections::BTreeMap;

use crate::rng::RandomSource;
use crate::state::GameState;

/// Compute the modified success rate, clamped to `[0,1]`.
pub fn calculate_probability(base_rate: f64, modifiers: Option<&ProbabilityModifiers>, state: &GameState) -> f64 {
    let mut rate = base_rate;
    if let Some(modifiers) = modifiers {
        rate += category_bonus(&modifiers.stats, |key| state.stat(key).unwrap_or(0.0));
        rate += category_bonus(&modifiers.buffs, |key| presence(state.has_buff(key)));
        rate += category_bonus(&modifiers.flags, |key| presence(state.has_flag(key)));
        #[allow(clippy::cast_precision_loss)]
        {
            rate += category_bonus(&modifiers.items, |key| state.item_quantity(key) as f64);
            rate += category_bonus(&modifiers.skills, |key| state.level(key) as f64);
        }
        rate += category_bonus(&modifiers.variables, |key| state.variable(key));
    }
    rate.clamp(0.0, 1.0)
}

/// Like [`calculate_probability`], with an additional clamp to `max_rate`.
pub fn calculate_probability_with_max(
    base_rate: f64,
    max_rate: Option<f64>,
    modifiers: Option<&ProbabilityModifiers>,
    state: &GameState,
) -> f64 {
    let rate = calculate_probability(base_rate, modifiers, state);
    match max_rate {
        Some(cap) => rate.min(cap),
        None => rate,
    }
}

/// Single uniform draw against a success rate.
pub fn roll_probability(rate: f64, random: &mut dyn RandomSource) -> bool {
    random.roll() < rate
}

/// Resolve a probability branch to its success or failure target with one
/// roll against the max-rate-aware computed rate.
pub fn process_probability<'a>(
    spec: &'a ProbabilitySpec,
    state: &GameState,
    random: &mut dyn RandomSource,
) -> &'a NextTarget {
    let rate = calculate_probability_with_max(spec.base_rate, spec.max_rate, spec.modifier.as_ref(), state);
    let success = roll_probability(rate, random);
    debug!("probability branch: rate={rate:.3} success={success}");
    if success { &spec.success_next } else { &spec.failure_next }
}

fn category_bonus(specs: &BTreeMap<String, ModifierSpec>, quantity: impl Fn(&str) -> f64) -> f64 {
    specs
        .iter()
        .map(|(key, spec)| {
            let bonus = quantity(key) * spec.per_unit;
            match spec.max {
                Some(cap) => bonus.min(cap),
                None => bonus,
            }
        })
        .sum()
}

fn presence(present: bool) -> f64 {
    if present { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::FixedRandom;
    use crate::state::ItemStack;

    fn test_state() -> GameState {
        let mut state = GameState {
            health: 6,
            ..GameState::default()
        };
        state.buffs.insert("haste".into());
        state.items.push(ItemStack {
            id: "charm".into(),
            quantity: 3,
        });
        state.levels.insert("climbing".into(), 2);
        state.variables.insert("karma".into(), 4.0);
        state
    }

    fn modifier(per_unit: f64, max: Option<f64>) -> ModifierSpec {
        ModifierSpec { per_unit, max }
    }

    #[test]
    fn base_rate_passes_through_without_modifiers() {
        let rate = calculate_probability(0.3, None, &test_state());
        assert!((rate - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn stat_and_item_bonuses_accumulate() {
        let mut modifiers = ProbabilityModifiers::default();
        modifiers.stats.insert("health".into(), modifier(0.02, None));
        modifiers.items.insert("charm".into(), modifier(0.05, None));
        // 0.1 + 6*0.02 + 3*0.05 = 0.37
        let rate = calculate_probability(0.1, Some(&modifiers), &test_state());
        assert!((rate - 0.37).abs() < 1e-9);
    }

    #[test]
    fn presence_categories_contribute_zero_or_one_unit() {
        let mut modifiers = ProbabilityModifiers::default();
        modifiers.buffs.insert("haste".into(), modifier(0.2, None));
        modifiers.flags.insert("unset_flag".into(), modifier(0.5, None));
        let rate = calculate_probability(0.1, Some(&modifiers), &test_state());
        assert!((rate - 0.3).abs() < 1e-9);
    }

    #[test]
    fn per_category_cap_applies_before_accumulation() {
        let mut modifiers = ProbabilityModifiers::default();
        // Uncapped this would be 3*0.2 = 0.6; cap holds it to 0.25.
        modifiers.items.insert("charm".into(), modifier(0.2, Some(0.25)));
        modifiers.skills.insert("climbing".into(), modifier(0.3, Some(0.25)));
        // Two capped categories still sum past an individual cap.
        let rate = calculate_probability(0.0, Some(&modifiers), &test_state());
        assert!((rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn final_rate_clamps_to_unit_interval() {
        let mut modifiers = ProbabilityModifiers::default();
        modifiers.variables.insert("karma".into(), modifier(10.0, None));
        assert!((calculate_probability(0.5, Some(&modifiers), &test_state()) - 1.0).abs() < f64::EPSILON);

        let mut negative = ProbabilityModifiers::default();
        negative.variables.insert("karma".into(), modifier(-10.0, None));
        assert!(calculate_probability(0.5, Some(&negative), &test_state()).abs() < f64::EPSILON);
    }

    #[test]
    fn max_rate_caps_after_accumulation() {
        let mut modifiers = ProbabilityModifiers::default();
        modifiers.variables.insert("karma".into(), modifier(0.1, None));
        let rate = calculate_probability_with_max(0.5, Some(0.6), Some(&modifiers), &test_state());
        assert!((rate - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn monotonic_in_per_unit() {
        let state = test_state();
        let mut last = 0.0;
        for step in 0..10 {
            let mut modifiers = ProbabilityModifiers::default();
            modifiers
                .variables
                .insert("karma".into(), modifier(0.01 * f64::from(step), None));
            let rate = calculate_probability(0.2, Some(&modifiers), &state);
            assert!(rate >= last);
            last = rate;
        }
    }

    #[test]
    fn process_probability_resolves_by_single_roll() {
        let spec = ProbabilitySpec {
            base_rate: 0.5,
            max_rate: None,
            modifier: None,
            success_next: NextTarget {
                chapter_id: None,
                scene_id: Some("scene_s".into()),
            },
            failure_next: NextTarget {
                chapter_id: None,
                scene_id: Some("scene_f".into()),
            },
        };
        let state = test_state();

        let mut lucky = FixedRandom::new([0.4]);
        let target = process_probability(&spec, &state, &mut lucky);
        assert_eq!(target.scene_id.as_deref(), Some("scene_s"));

        let mut unlucky = FixedRandom::new([0.6]);
        let target = process_probability(&spec, &state, &mut unlucky);
        assert_eq!(target.scene_id.as_deref(), Some("scene_f"));
    }
}
