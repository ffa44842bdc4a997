//! The stateful session orchestrator.
//!
//! `SceneEngine` tracks the current scene and chapter, resolves player
//! choices through the condition, probability, and selection layers, and
//! detects game over. It holds the latest state snapshot but never the
//! authoritative copy; the surrounding application owns that and pushes
//! fresh snapshots in through [`SceneEngine::update_game_state`].

use log::{debug, error, info, warn};
use spire_data::{Choice, NextTarget, Scene};
use std::collections::HashSet;

use crate::chapters::ChapterManager;
use crate::probability::process_probability;
use crate::rng::RandomSource;
use crate::selector::{available_choices, select_random_from_scenes};
use crate::state::{FORCE_GAME_OVER_FLAG, GameOverReason, GameState, GameStateDispatch};

/// Scene id preferred when a chapter is entered at game start.
pub const GAME_START_SCENE: &str = "scene_game_start";
/// Destination of the game-over transition and of the hard fallback when a
/// move target resolves to nothing.
pub const GAME_OVER_SCENE: &str = "scene_game_over";
pub const GAME_OVER_CHAPTER_ID: &str = "chapter_game_over";

/// Display text for a scene: the first conditional variant whose condition
/// holds, else the base text.
pub fn scene_display_text<'a>(scene: &'a Scene, state: &GameState) -> &'a str {
    scene
        .conditional_text
        .iter()
        .find(|variant| crate::condition::evaluate(&variant.condition, state))
        .map_or(scene.text.as_str(), |variant| variant.text.as_str())
}

pub struct SceneEngine {
    manager: ChapterManager,
    current_scene: Option<Scene>,
    current_chapter_id: Option<String>,
    state: GameState,
    /// Denormalized copy of `state.completed_scenes`, refreshed on every
    /// snapshot update. Read by the selection layer via the snapshot; kept
    /// here so completion checks stay cheap between updates.
    completed: HashSet<String>,
    random: Box<dyn RandomSource>,
    dispatch: Option<Box<dyn GameStateDispatch>>,
}

impl SceneEngine {
    pub fn new(manager: ChapterManager, random: Box<dyn RandomSource>) -> Self {
        Self {
            manager,
            current_scene: None,
            current_chapter_id: None,
            state: GameState::default(),
            completed: HashSet::new(),
            random,
            dispatch: None,
        }
    }

    pub fn with_dispatch(mut self, dispatch: Box<dyn GameStateDispatch>) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.current_scene.as_ref()
    }

    pub fn current_chapter_id(&self) -> Option<&str> {
        self.current_chapter_id.as_deref()
    }

    pub fn game_state(&self) -> &GameState {
        &self.state
    }

    pub fn chapter_manager_mut(&mut self) -> &mut ChapterManager {
        &mut self.manager
    }

    /// Replace the held snapshot with a fresh one from the external reducer
    /// and resync the completed-scene cache.
    pub fn update_game_state(&mut self, state: GameState) {
        self.completed = state.completed_scenes.clone();
        self.state = state;
    }

    /// Resume a saved session: snapshot, scene pointer, and chapter pointer
    /// restored as one unit.
    pub fn restore(&mut self, state: GameState, scene: Option<Scene>, chapter_id: Option<String>) {
        self.update_game_state(state);
        self.current_scene = scene;
        self.current_chapter_id = chapter_id;
    }

    pub fn is_game_over(&self) -> bool {
        self.state.is_game_over()
    }

    /// Fast completion check against the cached set; avoids cloning the
    /// snapshot when callers only need the one membership answer.
    pub fn is_scene_completed(&self, scene_id: &str) -> bool {
        self.completed.contains(scene_id)
    }

    /// Begin a session. Idempotent: if a scene is already current, it is
    /// returned unchanged so duplicate start calls cannot reset progress.
    ///
    /// The chapter is the explicit one if given, else the first registered
    /// chapter. Within it a scene named [`GAME_START_SCENE`] is preferred;
    /// absent that, the selection algorithm decides.
    pub fn start_game(&mut self, chapter_id: Option<&str>) -> Option<Scene> {
        if let Some(scene) = &self.current_scene {
            debug!("start_game called with scene '{}' already current", scene.id);
            return Some(scene.clone());
        }
        let chapter_id = match chapter_id.or_else(|| self.manager.first_chapter_id()) {
            Some(id) => id.to_string(),
            None => {
                error!("start_game: no chapter id given and none registered");
                return None;
            },
        };
        if !self.manager.load_and_register(&chapter_id) {
            return None;
        }
        let scene = match self.manager.scene_in_chapter(&chapter_id, GAME_START_SCENE) {
            Some(start) => Some(start.clone()),
            None => self
                .manager
                .transition_to_chapter(&chapter_id, None, Some(&self.state), self.random.as_mut()),
        };
        scene.inspect(|s| {
            info!("game started in chapter '{chapter_id}' at scene '{}'", s.id);
            self.enter_scene(s.clone(), chapter_id);
        })
    }

    /// Resolve the player's pick against the freshly filtered choice list of
    /// the current scene (or an explicit override when the UI is resolving
    /// against a scene it already holds).
    ///
    /// The index is into the list [`available_choices`] produces now, not
    /// into the authored list and not into whatever the UI displayed earlier.
    /// Out-of-range picks and invariant violations log and return `None`.
    pub fn select_choice(&mut self, choice_index: usize) -> Option<Scene> {
        let scene = match &self.current_scene {
            Some(scene) => scene.clone(),
            None => {
                error!("select_choice({choice_index}) with no current scene");
                return None;
            },
        };
        self.select_choice_in(choice_index, &scene)
    }

    pub fn select_choice_in(&mut self, choice_index: usize, scene: &Scene) -> Option<Scene> {
        if self.state.is_game_over() && scene.id != GAME_OVER_SCENE {
            warn!("select_choice during game over; redirecting to the game-over scene");
            return self.move_to_game_over_scene();
        }

        let available: Vec<Choice> = available_choices(scene, &self.state).into_iter().cloned().collect();
        let Some(choice) = available.get(choice_index) else {
            let listing: Vec<&str> = available.iter().map(|c| c.text.as_str()).collect();
            error!(
                "choice index {choice_index} out of range for scene '{}'; {} available: {listing:?}",
                scene.id,
                available.len()
            );
            return None;
        };
        let choice = choice.clone();

        let departed = scene.id.clone();
        let next = if let Some(spec) = &choice.probability {
            let target = process_probability(spec, &self.state, self.random.as_mut());
            debug!(
                "probability branch on '{}' resolved to {:?}/{:?}",
                choice.text, target.chapter_id, target.scene_id
            );
            self.resolve_next(target.clone())
        } else {
            self.resolve_next(choice.next.clone().unwrap_or_default())
        };

        if next.is_some() {
            self.state.mark_completed(&departed);
            self.completed.insert(departed);
        }
        next
    }

    /// Move precedence for a resolved target:
    /// 1. chapter and scene: explicit move, chapter auto-loaded;
    /// 2. chapter only: enter via the selection algorithm;
    /// 3. scene only: lookup scoped to the current chapter, nowhere else;
    /// 4. neither: random selection in the current chapter, hard falling
    ///    back to the game-over scene when nothing is eligible.
    fn resolve_next(&mut self, target: NextTarget) -> Option<Scene> {
        match (target.chapter_id, target.scene_id) {
            (Some(chapter_id), Some(scene_id)) => {
                let scene =
                    self.manager
                        .transition_to_chapter(&chapter_id, Some(&scene_id), None, self.random.as_mut())?;
                self.enter_scene(scene.clone(), chapter_id);
                Some(scene)
            },
            (Some(chapter_id), None) => {
                let scene = self.manager.transition_to_chapter(
                    &chapter_id,
                    None,
                    Some(&self.state),
                    self.random.as_mut(),
                )?;
                self.enter_scene(scene.clone(), chapter_id);
                Some(scene)
            },
            (None, Some(scene_id)) => {
                let Some(chapter_id) = self.current_chapter_id.clone() else {
                    error!("scene-only move to '{scene_id}' with no current chapter");
                    return None;
                };
                let Some(scene) = self.manager.scene_in_chapter(&chapter_id, &scene_id).cloned() else {
                    warn!("scene '{scene_id}' not found in current chapter '{chapter_id}'");
                    return None;
                };
                self.enter_scene(scene.clone(), chapter_id);
                Some(scene)
            },
            (None, None) => self.random_move_in_current_chapter(),
        }
    }

    fn random_move_in_current_chapter(&mut self) -> Option<Scene> {
        if let Some(chapter_id) = self.current_chapter_id.clone()
            && let Some(chapter) = self.manager.chapter(&chapter_id)
            && let Some(scene) =
                select_random_from_scenes(&chapter.scenes, &self.state, self.random.as_mut()).cloned()
        {
            self.enter_scene(scene.clone(), chapter_id);
            return Some(scene);
        }
        warn!("no eligible scene for an empty move target; falling back to the game-over scene");
        let scene = self.manager.transition_to_chapter(
            GAME_OVER_CHAPTER_ID,
            Some(GAME_OVER_SCENE),
            None,
            self.random.as_mut(),
        )?;
        self.enter_scene(scene.clone(), GAME_OVER_CHAPTER_ID.to_string());
        Some(scene)
    }

    /// Transition to the game-over destination, counting the death exactly
    /// once per game-over event.
    ///
    /// A forced game over does not increment here: the force path is counted
    /// by whichever collaborator raised the flag. Re-entering while already
    /// on the game-over scene never double-counts.
    pub fn move_to_game_over_scene(&mut self) -> Option<Scene> {
        let already_there = self
            .current_scene
            .as_ref()
            .is_some_and(|scene| scene.id == GAME_OVER_SCENE);
        match self.state.game_over_reason() {
            Some(GameOverReason::Forced) => {
                info!("forced game over; death already accounted for");
            },
            Some(reason) if !already_there => {
                let floor = self.state.current_floor;
                self.state.death_count += 1;
                *self.state.death_count_by_floor.entry(floor).or_insert(0) += 1;
                if let Some(dispatch) = &mut self.dispatch {
                    dispatch.increment_death_count(floor);
                }
                info!("game over ({reason}) on floor {floor}; death count {}", self.state.death_count);
            },
            Some(_) => debug!("already on the game-over scene; death not re-counted"),
            None => debug!("game-over move requested without a game-over state"),
        }
        if self.state.flags.remove(FORCE_GAME_OVER_FLAG) {
            if let Some(dispatch) = &mut self.dispatch {
                dispatch.clear_flag(FORCE_GAME_OVER_FLAG);
            }
        }
        let scene = self.manager.transition_to_chapter(
            GAME_OVER_CHAPTER_ID,
            Some(GAME_OVER_SCENE),
            None,
            self.random.as_mut(),
        )?;
        self.enter_scene(scene.clone(), GAME_OVER_CHAPTER_ID.to_string());
        Some(scene)
    }

    fn enter_scene(&mut self, scene: Scene, chapter_id: String) {
        self.state.mark_visited(&scene.id);
        self.current_scene = Some(scene);
        self.current_chapter_id = Some(chapter_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::FixedRandom;
    use crate::source::BundledChapters;
    use spire_data::{Chapter, ProbabilitySpec};

    fn scene(id: &str) -> Scene {
        Scene {
            id: id.to_string(),
            text: format!("text for {id}"),
            ..Scene::default()
        }
    }

    fn choice_to(scene_id: &str) -> Choice {
        Choice {
            text: format!("go to {scene_id}"),
            next: Some(NextTarget {
                chapter_id: None,
                scene_id: Some(scene_id.to_string()),
            }),
            ..Choice::default()
        }
    }

    fn chapter(id: &str, scenes: Vec<Scene>) -> Chapter {
        Chapter {
            id: id.to_string(),
            scenes,
            ..Chapter::default()
        }
    }

    fn game_over_chapter() -> Chapter {
        chapter(GAME_OVER_CHAPTER_ID, vec![scene(GAME_OVER_SCENE)])
    }

    fn engine_with(chapters: Vec<Chapter>, draws: impl IntoIterator<Item = f64>) -> SceneEngine {
        let mut manager = ChapterManager::new(Box::new(BundledChapters::new(chapters.clone())));
        for chapter in chapters {
            manager.register_chapter(chapter);
        }
        SceneEngine::new(manager, Box::new(FixedRandom::new(draws)))
    }

    #[test]
    fn start_game_prefers_the_start_scene_and_is_idempotent() {
        let mut engine = engine_with(
            vec![chapter("chapter_1", vec![scene("scene_other"), scene(GAME_START_SCENE)])],
            [0.0],
        );
        let first = engine.start_game(Some("chapter_1"));
        assert_eq!(first.as_ref().map(|s| s.id.as_str()), Some(GAME_START_SCENE));

        // Second call must not move anywhere.
        let second = engine.start_game(Some("chapter_1"));
        assert_eq!(second.map(|s| s.id), first.map(|s| s.id));
    }

    #[test]
    fn start_game_without_start_scene_falls_back_to_selection() {
        let mut selectable = scene("scene_pick_me");
        selectable.random_selectable = true;
        let mut engine = engine_with(vec![chapter("chapter_1", vec![scene("scene_plain"), selectable])], [0.0]);
        let started = engine.start_game(None);
        assert_eq!(started.map(|s| s.id), Some("scene_pick_me".to_string()));
    }

    #[test]
    fn direct_move_bypasses_selectability_filtering() {
        let mut a = scene(GAME_START_SCENE);
        a.choices = vec![choice_to("scene_b")];
        let b = scene("scene_b"); // random_selectable stays false
        let mut engine = engine_with(vec![chapter("chapter_1", vec![a, b])], [0.0]);
        engine.start_game(None);

        let landed = engine.select_choice(0);
        assert_eq!(landed.map(|s| s.id), Some("scene_b".to_string()));
        assert_eq!(engine.current_chapter_id(), Some("chapter_1"));
    }

    #[test]
    fn probability_branch_resolves_by_roll() {
        let spec = ProbabilitySpec {
            base_rate: 0.5,
            max_rate: None,
            modifier: None,
            success_next: NextTarget {
                chapter_id: None,
                scene_id: Some("scene_s".to_string()),
            },
            failure_next: NextTarget {
                chapter_id: None,
                scene_id: Some("scene_f".to_string()),
            },
        };
        let mut start = scene(GAME_START_SCENE);
        start.choices = vec![Choice {
            text: "try it".to_string(),
            probability: Some(spec),
            ..Choice::default()
        }];
        let story = vec![chapter("chapter_1", vec![start, scene("scene_s"), scene("scene_f")])];

        let mut engine = engine_with(story.clone(), [0.4]);
        engine.start_game(None);
        assert_eq!(engine.select_choice(0).map(|s| s.id), Some("scene_s".to_string()));

        let mut engine = engine_with(story, [0.6]);
        engine.start_game(None);
        assert_eq!(engine.select_choice(0).map(|s| s.id), Some("scene_f".to_string()));
    }

    #[test]
    fn out_of_range_choice_returns_none() {
        let mut start = scene(GAME_START_SCENE);
        start.choices = vec![choice_to("scene_b")];
        let mut engine = engine_with(vec![chapter("chapter_1", vec![start, scene("scene_b")])], [0.0]);
        engine.start_game(None);
        assert!(engine.select_choice(5).is_none());
        // Still on the start scene.
        assert_eq!(engine.current_scene().map(|s| s.id.as_str()), Some(GAME_START_SCENE));
    }

    #[test]
    fn explicit_chapter_move_auto_loads() {
        let mut start = scene(GAME_START_SCENE);
        start.choices = vec![Choice {
            text: "descend".to_string(),
            next: Some(NextTarget {
                chapter_id: Some("chapter_2".to_string()),
                scene_id: Some("scene_deep".to_string()),
            }),
            ..Choice::default()
        }];
        let mut engine = engine_with(
            vec![
                chapter("chapter_1", vec![start]),
                chapter("chapter_2", vec![scene("scene_deep")]),
            ],
            [0.0],
        );
        engine.start_game(Some("chapter_1"));
        let landed = engine.select_choice(0);
        assert_eq!(landed.map(|s| s.id), Some("scene_deep".to_string()));
        assert_eq!(engine.current_chapter_id(), Some("chapter_2"));
    }

    #[test]
    fn empty_target_with_nothing_eligible_falls_back_to_game_over() {
        let mut start = scene(GAME_START_SCENE);
        start.choices = vec![Choice {
            text: "drift".to_string(),
            ..Choice::default()
        }];
        let mut engine = engine_with(vec![chapter("chapter_1", vec![start]), game_over_chapter()], [0.0]);
        engine.start_game(None);
        let landed = engine.select_choice(0);
        assert_eq!(landed.map(|s| s.id), Some(GAME_OVER_SCENE.to_string()));
        assert_eq!(engine.current_chapter_id(), Some(GAME_OVER_CHAPTER_ID));
    }

    #[test]
    fn game_over_counts_one_death_exactly_once() {
        let mut engine = engine_with(
            vec![chapter("chapter_1", vec![scene(GAME_START_SCENE)]), game_over_chapter()],
            [0.0],
        );
        engine.start_game(None);
        let mut dead = engine.game_state().clone();
        dead.health = 0;
        engine.update_game_state(dead);
        assert!(engine.is_game_over());

        let landed = engine.move_to_game_over_scene();
        assert_eq!(landed.map(|s| s.id), Some(GAME_OVER_SCENE.to_string()));
        assert_eq!(engine.game_state().death_count, 1);
        assert_eq!(engine.game_state().death_count_by_floor.get(&1), Some(&1));

        // Re-entering the transition while already there must not re-count.
        engine.move_to_game_over_scene();
        assert_eq!(engine.game_state().death_count, 1);
    }

    #[test]
    fn forced_game_over_clears_the_flag_without_counting() {
        let mut engine = engine_with(
            vec![chapter("chapter_1", vec![scene(GAME_START_SCENE)]), game_over_chapter()],
            [0.0],
        );
        engine.start_game(None);
        let mut forced = engine.game_state().clone();
        forced.flags.insert(FORCE_GAME_OVER_FLAG.to_string());
        engine.update_game_state(forced);

        engine.move_to_game_over_scene();
        assert_eq!(engine.game_state().death_count, 0);
        assert!(!engine.game_state().has_flag(FORCE_GAME_OVER_FLAG));
    }

    #[test]
    fn select_choice_during_game_over_redirects() {
        let mut start = scene(GAME_START_SCENE);
        start.choices = vec![choice_to("scene_b")];
        let mut engine = engine_with(
            vec![chapter("chapter_1", vec![start, scene("scene_b")]), game_over_chapter()],
            [0.0],
        );
        engine.start_game(None);
        let mut dead = engine.game_state().clone();
        dead.mind = 0;
        engine.update_game_state(dead);

        let landed = engine.select_choice(0);
        assert_eq!(landed.map(|s| s.id), Some(GAME_OVER_SCENE.to_string()));
    }

    #[test]
    fn conditional_text_first_match_wins() {
        use spire_data::{Condition, ConditionalText};
        let always = Condition::All { all: Vec::new() };
        let never = Condition::Any { any: Vec::new() };
        let mut s = scene("scene_a");
        s.conditional_text = vec![
            ConditionalText {
                condition: never.clone(),
                text: "hidden".to_string(),
            },
            ConditionalText {
                condition: always.clone(),
                text: "first match".to_string(),
            },
            ConditionalText {
                condition: always,
                text: "second match".to_string(),
            },
        ];
        let state = GameState::default();
        assert_eq!(scene_display_text(&s, &state), "first match");

        s.conditional_text = vec![ConditionalText {
            condition: never,
            text: "hidden".to_string(),
        }];
        assert_eq!(scene_display_text(&s, &state), "text for scene_a");
    }

    #[test]
    fn completed_scene_is_recorded_on_departure() {
        let mut a = scene(GAME_START_SCENE);
        a.choices = vec![choice_to("scene_b")];
        let mut engine = engine_with(vec![chapter("chapter_1", vec![a, scene("scene_b")])], [0.0]);
        engine.start_game(None);
        engine.select_choice(0);
        assert!(engine.game_state().completed_scenes.contains(GAME_START_SCENE));
        assert!(engine.is_scene_completed(GAME_START_SCENE));
        assert!(engine.game_state().visited_scenes.contains("scene_b"));
    }
}
