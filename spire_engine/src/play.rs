//! Interactive terminal play loop.
//!
//! A thin front end over [`SceneEngine`]: show the current scene, read a
//! numbered choice, feed it back in, autosave after every move. The engine
//! itself never blocks on input; everything interactive lives here.

use anyhow::Result;
use log::warn;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::effects::{EffectApplier, StandardApplier};
use crate::engine::{GAME_OVER_SCENE, SceneEngine, scene_display_text};
use crate::selector::available_choices;
use crate::store::{KvStore, SaveData, write_autosave};
use crate::template::TemplateEngine;
use crate::view::SceneView;

pub fn run_play(engine: &mut SceneEngine, template: &mut TemplateEngine, store: &mut dyn KvStore) -> Result<()> {
    let view = SceneView::new();
    let mut editor = DefaultEditor::new()?;

    loop {
        let Some(scene) = engine.current_scene().cloned() else {
            println!("No scene to show.");
            break;
        };
        let text = scene_display_text(&scene, engine.game_state());
        let rendered = template.render(text, engine.game_state());
        let choices = available_choices(&scene, engine.game_state());

        view.show_status(engine.game_state());
        view.show_scene(&scene.id, &rendered, &choices);

        if engine.is_game_over() && scene.id != GAME_OVER_SCENE {
            if let Some(reason) = engine.game_state().game_over_reason() {
                view.show_game_over(reason);
            }
            engine.move_to_game_over_scene();
            continue;
        }

        if choices.is_empty() {
            println!("The story ends here.");
            break;
        }

        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            "save" => {
                autosave(engine, store);
                println!("Saved.");
                continue;
            },
            _ => {},
        }

        let Ok(number) = input.parse::<usize>() else {
            println!("Enter a choice number, 'save', or 'quit'.");
            continue;
        };
        if number == 0 || number > choices.len() {
            println!("Pick a number between 1 and {}.", choices.len());
            continue;
        }
        if let Some(entered) = engine.select_choice(number - 1) {
            // The engine only selects; mutations ride the reducer seam.
            if let Some(effects) = &entered.effects {
                let next_state = StandardApplier.apply(effects, engine.game_state());
                engine.update_game_state(next_state);
            }
            autosave(engine, store);
        }
    }
    Ok(())
}

fn autosave(engine: &SceneEngine, store: &mut dyn KvStore) {
    let data = SaveData::capture(
        engine.game_state().clone(),
        engine.current_scene().cloned(),
        engine.current_chapter_id().map(str::to_string),
    );
    if let Err(err) = write_autosave(store, &data) {
        warn!("autosave failed: {err}");
    }
}
