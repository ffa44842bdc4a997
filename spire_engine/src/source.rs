//! Chapter-loading collaborator boundary.
//!
//! The engine consumes chapters through [`ChapterSource`]; where they come
//! from (bundled files, a remote service) is the application's choice, wired
//! in by explicit constructor injection rather than a process-wide factory.
//! [`BundledChapters`] is the locally-bundled implementation: JSON chapter
//! files validated at startup and mirrored into a key-value store for faster
//! subsequent boots.

use log::{debug, info, warn};
use spire_data::{Chapter, GameData, validate_chapter};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::store::KvStore;

const CHAPTER_CACHE_PREFIX: &str = "chapter_cache:";

/// Why a chapter could not be produced. All variants are recoverable: the
/// caller logs and falls back.
#[derive(Debug, Error)]
pub enum ChapterLoadError {
    #[error("chapter '{id}' not found")]
    NotFound { id: String },
    #[error("io failure loading chapter '{id}': {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },
    #[error("chapter '{id}' failed to parse: {source}")]
    Parse {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("chapter '{id}' failed validation: {details}")]
    Invalid { id: String, details: String },
}

/// External provider of chapter content.
pub trait ChapterSource {
    fn load_chapter(&self, id: &str) -> Result<Chapter, ChapterLoadError>;

    fn load_all_chapters(&self) -> Result<Vec<Chapter>, ChapterLoadError>;

    /// Best-effort read-ahead; failures are logged and swallowed.
    fn preload_chapter(&self, id: &str) {
        if let Err(err) = self.load_chapter(id) {
            debug!("preload of chapter '{id}' failed: {err}");
        }
    }
}

/// Chapters bundled with the build: one JSON file per chapter, validated
/// before anything registers them.
#[derive(Debug, Default)]
pub struct BundledChapters {
    chapters: HashMap<String, Chapter>,
}

impl BundledChapters {
    /// Build from an in-memory chapter list. Later entries win duplicate ids.
    pub fn new(chapters: impl IntoIterator<Item = Chapter>) -> Self {
        let mut bundled = Self::default();
        for chapter in chapters {
            bundled.insert_fresh(chapter);
        }
        bundled
    }

    /// Load every `*.json` chapter file in a directory. Files failing to
    /// parse or validate are rejected, not skipped: bundled content is
    /// expected to have passed the authoring gate.
    pub fn from_dir(dir: &Path, data: Option<&GameData>) -> Result<Self, ChapterLoadError> {
        let mut bundled = Self::default();
        let dir_id = dir.display().to_string();
        let entries = fs::read_dir(dir).map_err(|source| ChapterLoadError::Io {
            id: dir_id.clone(),
            source,
        })?;
        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let file_id = path.display().to_string();
            let json = fs::read_to_string(&path).map_err(|source| ChapterLoadError::Io {
                id: file_id.clone(),
                source,
            })?;
            let chapter: Chapter = serde_json::from_str(&json).map_err(|source| ChapterLoadError::Parse {
                id: file_id.clone(),
                source,
            })?;
            let report = validate_chapter(&chapter, data);
            for warning in &report.warnings {
                warn!("chapter '{}': {warning}", chapter.id);
            }
            if !report.is_valid() {
                let details = report
                    .errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(ChapterLoadError::Invalid {
                    id: chapter.id.clone(),
                    details,
                });
            }
            bundled.insert_fresh(chapter);
        }
        info!("{} bundled chapter(s) loaded from {dir_id}", bundled.chapters.len());
        Ok(bundled)
    }

    /// Restore previously-persisted chapters from the key-value store, then
    /// overlay fresh content on top. Persisted duplicates log at debug (they
    /// are expected on every warm boot); fresh duplicates log at warn.
    pub fn from_dir_with_store(
        dir: &Path,
        data: Option<&GameData>,
        store: &mut dyn KvStore,
    ) -> Result<Self, ChapterLoadError> {
        let mut bundled = Self::default();
        if let Ok(Some(index)) = store.retrieve(&format!("{CHAPTER_CACHE_PREFIX}index")) {
            for id in index.split('\n').filter(|id| !id.is_empty()) {
                match store.retrieve(&format!("{CHAPTER_CACHE_PREFIX}{id}")) {
                    Ok(Some(json)) => match serde_json::from_str::<Chapter>(&json) {
                        Ok(chapter) => {
                            if bundled.chapters.insert(chapter.id.clone(), chapter).is_some() {
                                debug!("persisted chapter cache re-registered '{id}'; later copy wins");
                            }
                        },
                        Err(err) => warn!("persisted chapter '{id}' is corrupt, ignoring: {err}"),
                    },
                    _ => debug!("persisted chapter '{id}' missing from store"),
                }
            }
            info!("{} chapter(s) restored from persisted cache", bundled.chapters.len());
        }

        let fresh = Self::from_dir(dir, data)?;
        for (_, chapter) in fresh.chapters {
            bundled.insert_fresh(chapter);
        }
        bundled.persist(store);
        Ok(bundled)
    }

    /// Mirror the chapter set into the store. Failures only warn; the
    /// in-memory set stays authoritative.
    pub fn persist(&self, store: &mut dyn KvStore) {
        let mut index = Vec::new();
        for (id, chapter) in &self.chapters {
            match serde_json::to_string(chapter) {
                Ok(json) => {
                    if let Err(err) = store.store(&format!("{CHAPTER_CACHE_PREFIX}{id}"), &json) {
                        warn!("failed to persist chapter '{id}': {err}");
                        continue;
                    }
                    index.push(id.clone());
                },
                Err(err) => warn!("failed to serialize chapter '{id}': {err}"),
            }
        }
        index.sort();
        if let Err(err) = store.store(&format!("{CHAPTER_CACHE_PREFIX}index"), &index.join("\n")) {
            warn!("failed to persist chapter index: {err}");
        }
    }

    fn insert_fresh(&mut self, chapter: Chapter) {
        let id = chapter.id.clone();
        if self.chapters.insert(id.clone(), chapter).is_some() {
            warn!("duplicate chapter id '{id}' in fresh content; later copy wins");
        }
    }
}

impl ChapterSource for BundledChapters {
    fn load_chapter(&self, id: &str) -> Result<Chapter, ChapterLoadError> {
        self.chapters
            .get(id)
            .cloned()
            .ok_or_else(|| ChapterLoadError::NotFound { id: id.to_string() })
    }

    fn load_all_chapters(&self) -> Result<Vec<Chapter>, ChapterLoadError> {
        let mut all: Vec<Chapter> = self.chapters.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}
