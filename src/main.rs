//! Headless runner
//!
//! Usage: `brick-breaker [settings.json] [seconds]`
//!
//! Plays on autopilot for a bounded time, logging a HUD line twice a second,
//! then saves and prints the final frame as JSON. Resumes from the save slot
//! when one exists.

use std::env;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use brick_breaker::Settings;
use brick_breaker::game::{Command, Game};
use brick_breaker::sim::{GameEvent, GamePhase};

const DEFAULT_RUN_SECS: u64 = 10;
const HUD_INTERVAL: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Brick Breaker (headless) starting...");

    let mut args = env::args().skip(1);
    let settings_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("settings.json"));
    let run_secs = args
        .next()
        .map(|s| s.parse::<u64>())
        .transpose()
        .context("run time must be a whole number of seconds")?
        .unwrap_or(DEFAULT_RUN_SECS);

    let settings = Settings::load(&settings_path);
    let mut game = Game::new(&settings);
    game.set_autopilot(true);

    if game.has_save() {
        game.send(Command::Load);
    }
    if game.phase() == GamePhase::Menu {
        game.send(Command::Start);
    }

    let deadline = Instant::now() + Duration::from_secs(run_secs);
    let handle = game.handle();
    while Instant::now() < deadline && handle.is_running() {
        thread::sleep(HUD_INTERVAL);

        for event in game.drain_events() {
            match event {
                GameEvent::LevelUp { level } => log::info!("Level up: {}", level),
                GameEvent::LifeLost { lives } => log::info!("Life lost ({} left)", lives),
                other => log::debug!("{:?}", other),
            }
        }
        if let Some(frame) = game.latest_frame() {
            let visible = frame.blocks.iter().filter(|b| b.visible).count();
            log::info!(
                "level {} | score {} | lives {} | blocks {} | t {} ms",
                frame.level,
                frame.score,
                frame.lives,
                visible,
                handle.elapsed_ms()
            );
        }
    }

    game.stop();

    let phase = game.phase();
    if phase.is_terminal() {
        log::info!("Session ended: {:?}", phase);
    } else {
        game.send(Command::Save);
    }

    let frame = game.frame();
    println!("{}", serde_json::to_string_pretty(&frame)?);
    Ok(())
}
