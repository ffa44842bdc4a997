//! Chapter registration, load-on-demand, and scoped scene lookup.
//!
//! Lookups are deliberately chapter-scoped: there is no global scene index,
//! so the same scene id may exist in several chapters without ambiguity. A
//! scene is reachable only by naming its chapter or by already being inside
//! it.

use log::{debug, error, info, warn};
use spire_data::{Chapter, Scene};
use std::collections::{HashMap, HashSet};

use crate::rng::RandomSource;
use crate::selector::select_random_from_scenes;
use crate::source::ChapterSource;
use crate::state::GameState;

/// Owns the registered chapter map and mediates loading through the injected
/// [`ChapterSource`].
pub struct ChapterManager {
    source: Box<dyn ChapterSource>,
    chapters: HashMap<String, Chapter>,
    /// Per-chapter scene-id-to-index maps, built at registration.
    scene_index: HashMap<String, HashMap<String, usize>>,
    /// Registration order; the first registered chapter is the default start.
    order: Vec<String>,
    /// In-flight guard: a chapter id is resident while its load runs, so a
    /// reentrant request for the same id cannot double-load.
    loading: HashSet<String>,
}

impl ChapterManager {
    pub fn new(source: Box<dyn ChapterSource>) -> Self {
        Self {
            source,
            chapters: HashMap::new(),
            scene_index: HashMap::new(),
            order: Vec::new(),
            loading: HashSet::new(),
        }
    }

    /// Register a chapter. Re-registering an id overwrites the previous copy;
    /// that is logged, not an error.
    pub fn register_chapter(&mut self, chapter: Chapter) {
        let id = chapter.id.clone();
        let index: HashMap<String, usize> = chapter
            .scenes
            .iter()
            .enumerate()
            .map(|(idx, scene)| (scene.id.clone(), idx))
            .collect();
        if self.chapters.insert(id.clone(), chapter).is_some() {
            warn!("chapter '{id}' re-registered; previous copy replaced");
        } else {
            self.order.push(id.clone());
            info!("chapter '{id}' registered");
        }
        self.scene_index.insert(id, index);
    }

    /// Register everything the source can provide, in id order so the
    /// default start chapter is stable across runs. Returns the count.
    pub fn register_all(&mut self) -> usize {
        match self.source.load_all_chapters() {
            Ok(mut chapters) => {
                chapters.sort_by(|a, b| a.id.cmp(&b.id));
                let count = chapters.len();
                for chapter in chapters {
                    self.register_chapter(chapter);
                }
                count
            },
            Err(err) => {
                error!("failed to load chapter set: {err}");
                0
            },
        }
    }

    /// Drop every registered chapter. The next request for any id goes back
    /// through the source. Player progress is untouched; this only empties
    /// the content cache.
    pub fn clear_registered(&mut self) {
        let count = self.chapters.len();
        self.chapters.clear();
        self.scene_index.clear();
        self.order.clear();
        info!("{count} registered chapter(s) cleared");
    }

    pub fn is_registered(&self, chapter_id: &str) -> bool {
        self.chapters.contains_key(chapter_id)
    }

    pub fn chapter(&self, chapter_id: &str) -> Option<&Chapter> {
        self.chapters.get(chapter_id)
    }

    /// First registered chapter id, the default game-start chapter.
    pub fn first_chapter_id(&self) -> Option<&str> {
        self.order.first().map(String::as_str)
    }

    /// Scene lookup scoped to one chapter. No cross-chapter search exists.
    pub fn scene_in_chapter(&self, chapter_id: &str, scene_id: &str) -> Option<&Scene> {
        let idx = *self.scene_index.get(chapter_id)?.get(scene_id)?;
        self.chapters.get(chapter_id).and_then(|chapter| chapter.scenes.get(idx))
    }

    /// Ensure a chapter is registered, loading it through the source if
    /// needed. Returns false (after logging) when the chapter is unavailable;
    /// never panics or throws past this boundary.
    pub fn load_and_register(&mut self, chapter_id: &str) -> bool {
        if self.is_registered(chapter_id) {
            return true;
        }
        if !self.loading.insert(chapter_id.to_string()) {
            debug!("chapter '{chapter_id}' load already in flight; not re-requested");
            return false;
        }
        let outcome = self.source.load_chapter(chapter_id);
        self.loading.remove(chapter_id);

        match outcome {
            Ok(chapter) => {
                let next = chapter.next_chapter_id.clone();
                self.register_chapter(chapter);
                if let Some(next_id) = next {
                    self.preload(&next_id);
                }
                true
            },
            Err(err) => {
                error!("failed to load chapter '{chapter_id}': {err}");
                false
            },
        }
    }

    /// Best-effort read-ahead of a declared next chapter. Must never surface
    /// a failure to the transition that triggered it.
    fn preload(&mut self, chapter_id: &str) {
        if self.is_registered(chapter_id) || !self.loading.insert(chapter_id.to_string()) {
            return;
        }
        let outcome = self.source.load_chapter(chapter_id);
        self.loading.remove(chapter_id);
        match outcome {
            Ok(chapter) => {
                debug!("preloaded next chapter '{chapter_id}'");
                self.register_chapter(chapter);
            },
            Err(err) => debug!("preload of chapter '{chapter_id}' failed: {err}"),
        }
    }

    /// Enter a chapter and resolve a scene in it.
    ///
    /// With `target_scene_id` the named scene is returned (or `None` with a
    /// warning if the chapter lacks it). Otherwise, with a state snapshot,
    /// the two-phase selection algorithm runs scoped to the chapter, falling
    /// back to a uniform pick over all its scenes; without state the bare
    /// uniform pick is all there is.
    pub fn transition_to_chapter(
        &mut self,
        chapter_id: &str,
        target_scene_id: Option<&str>,
        state: Option<&GameState>,
        random: &mut dyn RandomSource,
    ) -> Option<Scene> {
        if !self.load_and_register(chapter_id) {
            return None;
        }
        let chapter = self.chapters.get(chapter_id)?;

        if let Some(scene_id) = target_scene_id {
            let found = self.scene_in_chapter(chapter_id, scene_id).cloned();
            if found.is_none() {
                warn!(
                    "scene '{scene_id}' not found in chapter '{chapter_id}' ({} scene(s))",
                    chapter.scenes.len()
                );
            }
            return found;
        }

        if chapter.scenes.is_empty() {
            warn!("chapter '{chapter_id}' has no scenes");
            return None;
        }

        if let Some(state) = state {
            if let Some(selected) = select_random_from_scenes(&chapter.scenes, state, random) {
                return Some(selected.clone());
            }
            debug!("no eligible scene in chapter '{chapter_id}'; falling back to uniform pick");
        }
        let idx = random.pick_index(chapter.scenes.len());
        Some(chapter.scenes[idx].clone())
    }
}
