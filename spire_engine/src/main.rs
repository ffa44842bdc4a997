#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Spire **
//! Scene/chapter resolution engine with a terminal runner.

use spire_engine::store::{read_autosave, self_test};
use spire_engine::{
    BundledChapters, ChapterManager, FileStore, RoutedStore, SceneEngine, TemplateEngine, ThreadRandom, run_play,
};

use anyhow::{Context, Result, bail};
use colored::Colorize;

use log::{info, warn};

use std::io::Write;
use std::path::Path;

const DEFAULT_DATA_DIR: &str = "spire_engine/data";
const SAVE_DIR: &str = "spire_engine/saves";

fn main() -> Result<()> {
    env_logger::init();
    let data_dir = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
    info!("Start: loading chapters from {data_dir}...");

    let mut store = RoutedStore::new(
        Box::new(FileStore::new(format!("{SAVE_DIR}/secure"))),
        Box::new(FileStore::new(SAVE_DIR)),
    );
    if !self_test(&mut store) {
        warn!("save-store self test failed; progress may not persist");
    }

    let source = BundledChapters::from_dir_with_store(Path::new(&data_dir), None, &mut store)
        .with_context(|| format!("while loading chapters from {data_dir}"))?;
    let mut manager = ChapterManager::new(Box::new(source));
    let count = manager.register_all();
    info!("{count} chapter(s) registered.");

    let mut engine = SceneEngine::new(manager, Box::new(ThreadRandom));
    let mut template = TemplateEngine::default();

    match read_autosave(&store) {
        Ok(Some(save)) => {
            info!("resuming from autosave written at {}", save.saved_at);
            engine.restore(save.game_state, save.current_scene, save.current_chapter_id);
        },
        Ok(None) => {},
        Err(err) => warn!("could not read autosave: {err}"),
    }
    if engine.current_scene().is_none() && engine.start_game(None).is_none() {
        bail!("no playable chapter content under {data_dir}");
    }

    // clear the screen
    print!("\x1B[2J\x1B[H");
    std::io::stdout().flush()?;
    info!("Starting the game!");

    println!("{:^84}", "SPIRE: A CLIMB IN THE DARK".bright_yellow().underline());
    println!();

    run_play(&mut engine, &mut template, &mut store)
}
