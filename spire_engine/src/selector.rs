//! Scene filtering and random selection.
//!
//! Selection is two-phase: priority scenes (those whose `priority_condition`
//! currently holds) are picked uniformly before any other scene is even
//! considered. Priority scenes skip the `condition` and `random_selectable`
//! gates but still honor the completed/repeatable gate.

use log::debug;
use spire_data::{Choice, Scene};

use crate::condition::{evaluate, evaluate_opt};
use crate::rng::RandomSource;
use crate::state::GameState;

/// Scenes eligible for uniform-random chapter entry: gating condition holds
/// (or is absent), not completed unless repeatable, and opted in via
/// `random_selectable`.
pub fn filter_random_selectable_scenes<'a>(scenes: &'a [Scene], state: &GameState) -> Vec<&'a Scene> {
    scenes
        .iter()
        .filter(|scene| scene.random_selectable)
        .filter(|scene| passes_completion_gate(scene, state))
        .filter(|scene| evaluate_opt(scene.condition.as_ref(), state))
        .collect()
}

/// Choices currently offered by a scene, with their indices into the filtered
/// list. A failed condition hides a choice only when
/// `visible_if_failed_condition` is explicitly false; the default is to show
/// it.
pub fn available_choices<'a>(scene: &'a Scene, state: &GameState) -> Vec<&'a Choice> {
    scene
        .choices
        .iter()
        .filter(|choice| match &choice.condition {
            None => true,
            Some(cond) if evaluate(cond, state) => true,
            Some(_) => choice.visible_if_failed_condition != Some(false),
        })
        .collect()
}

/// Two-phase random selection over a chapter's scenes.
///
/// Phase 1: uniform pick among priority scenes (priority condition defined
/// and true, completion gate passed). Phase 2: uniform pick among
/// [`filter_random_selectable_scenes`] results, or `None` when nothing
/// qualifies; the caller owns the fallback.
pub fn select_random_from_scenes<'a>(
    scenes: &'a [Scene],
    state: &GameState,
    random: &mut dyn RandomSource,
) -> Option<&'a Scene> {
    let priority: Vec<&Scene> = scenes
        .iter()
        .filter(|scene| {
            scene
                .priority_condition
                .as_ref()
                .is_some_and(|cond| evaluate(cond, state))
        })
        .filter(|scene| passes_completion_gate(scene, state))
        .collect();
    if !priority.is_empty() {
        let picked = priority[random.pick_index(priority.len())];
        debug!("priority selection: {} of {} candidate(s)", picked.id, priority.len());
        return Some(picked);
    }

    let eligible = filter_random_selectable_scenes(scenes, state);
    if eligible.is_empty() {
        debug!("random selection found no eligible scene among {}", scenes.len());
        return None;
    }
    Some(eligible[random.pick_index(eligible.len())])
}

fn passes_completion_gate(scene: &Scene, state: &GameState) -> bool {
    scene.repeatable || !state.completed_scenes.contains(&scene.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::FixedRandom;
    use spire_data::{AtomCondition, Condition, SetCheck};

    fn always_true() -> Condition {
        Condition::All { all: Vec::new() }
    }

    fn requires_flag(flag: &str) -> Condition {
        Condition::Atom(AtomCondition {
            flags: Some(SetCheck {
                includes: vec![flag.to_string()],
                not_in: Vec::new(),
            }),
            ..AtomCondition::default()
        })
    }

    fn scene(id: &str) -> Scene {
        Scene {
            id: id.to_string(),
            text: format!("text for {id}"),
            random_selectable: true,
            ..Scene::default()
        }
    }

    #[test]
    fn filter_requires_random_selectable_opt_in() {
        let mut hidden = scene("scene_hidden");
        hidden.random_selectable = false;
        let scenes = vec![scene("scene_a"), hidden];
        let picked = filter_random_selectable_scenes(&scenes, &GameState::default());
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "scene_a");
    }

    #[test]
    fn filter_excludes_completed_unless_repeatable() {
        let mut repeat = scene("scene_repeat");
        repeat.repeatable = true;
        let scenes = vec![scene("scene_done"), repeat];
        let mut state = GameState::default();
        state.completed_scenes.insert("scene_done".into());
        state.completed_scenes.insert("scene_repeat".into());
        let picked = filter_random_selectable_scenes(&scenes, &state);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "scene_repeat");
    }

    #[test]
    fn filter_applies_gating_condition() {
        let mut gated = scene("scene_gated");
        gated.condition = Some(requires_flag("unset"));
        let scenes = vec![gated, scene("scene_open")];
        let picked = filter_random_selectable_scenes(&scenes, &GameState::default());
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, "scene_open");
    }

    #[test]
    fn priority_scene_wins_regardless_of_selectability() {
        let mut priority = scene("scene_priority");
        priority.random_selectable = false;
        priority.condition = Some(requires_flag("unset"));
        priority.priority_condition = Some(always_true());
        let scenes = vec![scene("scene_a"), priority, scene("scene_b")];
        // Run with several draws; the priority scene must always win.
        for draw in [0.0, 0.5, 0.99] {
            let mut random = FixedRandom::new([draw]);
            let picked = select_random_from_scenes(&scenes, &GameState::default(), &mut random);
            assert_eq!(picked.map(|s| s.id.as_str()), Some("scene_priority"));
        }
    }

    #[test]
    fn completed_priority_scene_is_skipped() {
        let mut priority = scene("scene_priority");
        priority.priority_condition = Some(always_true());
        let scenes = vec![priority, scene("scene_other")];
        let mut state = GameState::default();
        state.completed_scenes.insert("scene_priority".into());
        let mut random = FixedRandom::new([0.0]);
        let picked = select_random_from_scenes(&scenes, &state, &mut random);
        assert_eq!(picked.map(|s| s.id.as_str()), Some("scene_other"));
    }

    #[test]
    fn empty_eligible_set_returns_none() {
        let mut done = scene("scene_done");
        done.random_selectable = false;
        let scenes = vec![done];
        let mut random = FixedRandom::new([0.0]);
        assert!(select_random_from_scenes(&scenes, &GameState::default(), &mut random).is_none());
    }

    #[test]
    fn failed_condition_choice_shown_by_default_hidden_when_explicit() {
        let mut subject = scene("scene_choices");
        subject.choices = vec![
            Choice {
                text: "always".into(),
                ..Choice::default()
            },
            Choice {
                text: "shown but locked".into(),
                condition: Some(requires_flag("unset")),
                ..Choice::default()
            },
            Choice {
                text: "hidden".into(),
                condition: Some(requires_flag("unset")),
                visible_if_failed_condition: Some(false),
                ..Choice::default()
            },
        ];
        let offered = available_choices(&subject, &GameState::default());
        let texts: Vec<&str> = offered.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["always", "shown but locked"]);
    }
}
