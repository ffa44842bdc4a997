//! Condition evaluation over a [`GameState`] snapshot.
//!
//! Conditions are recursive boolean trees (`$and` / `$or` over atomic leaf
//! tests). Evaluation assumes pre-validated content and never fails: a
//! well-formed condition always yields a boolean. Validation-time errors are
//! the job of `spire_data::validate`.

use spire_data::{AtomCondition, Condition, ItemCheck, NumCheck, SetCheck};

use crate::state::GameState;

/// Evaluate a condition tree against the given state.
///
/// `$and` of an empty list is true; `$or` of an empty list is false. An
/// atomic leaf requires every present field to hold.
pub fn evaluate(condition: &Condition, state: &GameState) -> bool {
    match condition {
        Condition::All { all } => all.iter().all(|kid| evaluate(kid, state)),
        Condition::Any { any } => any.iter().any(|kid| evaluate(kid, state)),
        Condition::Atom(atom) => evaluate_atom(atom, state),
    }
}

/// Evaluate an optional condition; absence is vacuously true ("always
/// available").
pub fn evaluate_opt(condition: Option<&Condition>, state: &GameState) -> bool {
    condition.is_none_or(|cond| evaluate(cond, state))
}

fn evaluate_atom(atom: &AtomCondition, state: &GameState) -> bool {
    if let Some(stats) = &atom.stats {
        // Unknown stat keys read as 0 so pre-validated-but-dangling content
        // degrades to a comparison against zero rather than a panic.
        let ok = stats
            .iter()
            .all(|(key, check)| num_check_holds(*check, state.stat(key).unwrap_or(0.0)));
        if !ok {
            return false;
        }
    }
    if let Some(variables) = &atom.variables {
        let ok = variables
            .iter()
            .all(|(key, check)| num_check_holds(*check, state.variable(key)));
        if !ok {
            return false;
        }
    }
    if let Some(buffs) = &atom.buffs {
        if !set_check_holds(buffs, |id| state.has_buff(id)) {
            return false;
        }
    }
    if let Some(flags) = &atom.flags {
        if !set_check_holds(flags, |id| state.has_flag(id)) {
            return false;
        }
    }
    if let Some(items) = &atom.items {
        let ok = items
            .iter()
            .all(|(id, check)| item_check_holds(*check, state.item_quantity(id)));
        if !ok {
            return false;
        }
    }
    true
}

fn num_check_holds(check: NumCheck, value: f64) -> bool {
    match check {
        NumCheck::Exact(expected) => (value - expected).abs() < f64::EPSILON,
        NumCheck::Range { min, max } => {
            min.is_none_or(|lo| value >= lo) && max.is_none_or(|hi| value <= hi)
        },
    }
}

fn item_check_holds(check: ItemCheck, quantity: i64) -> bool {
    match check {
        ItemCheck::Exact(expected) => quantity == expected,
        ItemCheck::Range { min, max } => {
            min.is_none_or(|lo| quantity >= lo) && max.is_none_or(|hi| quantity <= hi)
        },
    }
}

fn set_check_holds(check: &SetCheck, present: impl Fn(&str) -> bool) -> bool {
    check.includes.iter().all(|id| present(id)) && check.not_in.iter().all(|id| !present(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ItemStack;
    use spire_data::AtomCondition;
    use std::collections::BTreeMap;

    fn test_state() -> GameState {
        let mut state = GameState {
            health: 7,
            mind: 3,
            gold: 20,
            ..GameState::default()
        };
        state.buffs.insert("haste".into());
        state.flags.insert("met_guide".into());
        state.items.push(ItemStack {
            id: "rope".into(),
            quantity: 2,
        });
        state.variables.insert("karma".into(), 5.0);
        state
    }

    fn atom(build: impl FnOnce(&mut AtomCondition)) -> Condition {
        let mut leaf = AtomCondition::default();
        build(&mut leaf);
        Condition::Atom(leaf)
    }

    #[test]
    fn empty_and_is_true_while_empty_or_is_false() {
        let state = test_state();
        assert!(evaluate(&Condition::All { all: Vec::new() }, &state));
        assert!(!evaluate(&Condition::Any { any: Vec::new() }, &state));
    }

    #[test]
    fn absent_condition_is_vacuously_true() {
        assert!(evaluate_opt(None, &test_state()));
    }

    #[test]
    fn stat_range_checks() {
        let state = test_state();
        let cond = atom(|leaf| {
            let mut stats = BTreeMap::new();
            stats.insert(
                "health".to_string(),
                NumCheck::Range {
                    min: Some(5.0),
                    max: None,
                },
            );
            leaf.stats = Some(stats);
        });
        assert!(evaluate(&cond, &state));

        let cond = atom(|leaf| {
            let mut stats = BTreeMap::new();
            stats.insert(
                "health".to_string(),
                NumCheck::Range {
                    min: Some(8.0),
                    max: None,
                },
            );
            leaf.stats = Some(stats);
        });
        assert!(!evaluate(&cond, &state));
    }

    #[test]
    fn buff_membership_and_exclusion() {
        let state = test_state();
        let cond = atom(|leaf| {
            leaf.buffs = Some(SetCheck {
                includes: vec!["haste".into()],
                not_in: vec!["poisoned".into()],
            });
        });
        assert!(evaluate(&cond, &state));

        let cond = atom(|leaf| {
            leaf.buffs = Some(SetCheck {
                includes: Vec::new(),
                not_in: vec!["haste".into()],
            });
        });
        assert!(!evaluate(&cond, &state));
    }

    #[test]
    fn item_exact_and_range_against_missing_item() {
        let state = test_state();
        let held = atom(|leaf| {
            let mut items = BTreeMap::new();
            items.insert("rope".to_string(), ItemCheck::Exact(2));
            leaf.items = Some(items);
        });
        assert!(evaluate(&held, &state));

        // Missing item reads as quantity 0.
        let missing = atom(|leaf| {
            let mut items = BTreeMap::new();
            items.insert(
                "lantern".to_string(),
                ItemCheck::Range {
                    min: None,
                    max: Some(0),
                },
            );
            leaf.items = Some(items);
        });
        assert!(evaluate(&missing, &state));
    }

    #[test]
    fn implicit_and_across_atom_fields() {
        let state = test_state();
        let cond = atom(|leaf| {
            let mut stats = BTreeMap::new();
            stats.insert(
                "gold".to_string(),
                NumCheck::Range {
                    min: Some(10.0),
                    max: None,
                },
            );
            leaf.stats = Some(stats);
            leaf.flags = Some(SetCheck {
                includes: vec!["met_guide".into()],
                not_in: Vec::new(),
            });
        });
        assert!(evaluate(&cond, &state));

        let cond = atom(|leaf| {
            let mut stats = BTreeMap::new();
            stats.insert(
                "gold".to_string(),
                NumCheck::Range {
                    min: Some(10.0),
                    max: None,
                },
            );
            leaf.stats = Some(stats);
            leaf.flags = Some(SetCheck {
                includes: vec!["never_set".into()],
                not_in: Vec::new(),
            });
        });
        assert!(!evaluate(&cond, &state));
    }

    #[test]
    fn nested_composites_recurse() {
        let state = test_state();
        let haste = atom(|leaf| {
            leaf.buffs = Some(SetCheck {
                includes: vec!["haste".into()],
                not_in: Vec::new(),
            });
        });
        let broke = atom(|leaf| {
            let mut stats = BTreeMap::new();
            stats.insert("gold".to_string(), NumCheck::Exact(0.0));
            leaf.stats = Some(stats);
        });
        let cond = Condition::All {
            all: vec![
                Condition::Any {
                    any: vec![haste, broke],
                },
                atom(|leaf| {
                    let mut vars = BTreeMap::new();
                    vars.insert(
                        "karma".to_string(),
                        NumCheck::Range {
                            min: Some(1.0),
                            max: Some(9.0),
                        },
                    );
                    leaf.variables = Some(vars);
                }),
            ],
        };
        assert!(evaluate(&cond, &state));
    }
}
