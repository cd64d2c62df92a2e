//! Threaded game session
//!
//! Wires a `SessionState` to the four-task `Scheduler`. The state sits
//! behind one mutex; every callback takes it once per tick, so a logic or
//! render tick never observes a half-finished physics tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::persistence::{PersistResult, SaveSlot, Snapshot};
use crate::scheduler::{GameLoop, Scheduler, SchedulerHandle};
use crate::settings::Settings;
use crate::sim::state::{Frame, GameEvent, GamePhase, SessionState};
use crate::sim::tick::{Direction, autopilot, nudge_delays, physics_tick};

/// Player/UI commands routed into the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start a new game from the menu
    Start,
    /// One held-key move: a burst of one-unit nudges
    MovePaddle(Direction),
    TogglePause,
    /// Audio is external; the session only records and announces it
    ToggleMute,
    Save,
    Load,
    Restart,
}

/// State shared by all scheduler tasks
struct Session {
    state: Mutex<SessionState>,
    latest: Mutex<Option<Frame>>,
    last_phase: Mutex<GamePhase>,
    handle: SchedulerHandle,
    slot: SaveSlot,
    autopilot: AtomicBool,
    muted: AtomicBool,
}

impl Session {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl GameLoop for Session {
    fn on_init(&self) -> anyhow::Result<()> {
        let state = self.lock();
        log::info!(
            "Session ready (seed {}, phase {:?}, save slot {})",
            state.seed,
            state.phase,
            self.slot.path().display()
        );
        Ok(())
    }

    fn on_update(&self) -> anyhow::Result<()> {
        let frame = Frame::capture(&self.lock());

        let mut last = self.last_phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *last != frame.phase {
            log::info!(
                "{:?} | level {} | score {} | lives {}",
                frame.phase,
                frame.level,
                frame.score,
                frame.lives
            );
            *last = frame.phase;
        }
        drop(last);

        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        Ok(())
    }

    fn on_physics_update(&self) -> anyhow::Result<()> {
        let mut state = self.lock();
        if self.autopilot.load(Ordering::Relaxed) && state.phase == GamePhase::Playing {
            autopilot(&mut state);
        }
        physics_tick(&mut state);

        if state.phase.is_terminal() {
            // Non-joining: we are running on a scheduler thread
            self.handle.request_stop();
        }
        Ok(())
    }

    fn on_render(&self) -> anyhow::Result<()> {
        let state = self.lock();
        log::trace!(
            "render ball ({:.1}, {:.1}) paddle {:.1}",
            state.ball.pos.x,
            state.ball.pos.y,
            state.paddle.x
        );
        Ok(())
    }

    fn on_time(&self, ms: u64, _elapsed_ms: u64) -> anyhow::Result<()> {
        self.lock().advance_clock(ms);
        Ok(())
    }
}

/// A running (or runnable) game
pub struct Game {
    scheduler: Scheduler,
    session: Arc<Session>,
}

impl Game {
    pub fn new(settings: &Settings) -> Self {
        let mut scheduler = Scheduler::new();
        scheduler.configure(settings.ticks_per_second);
        scheduler.set_clock_policy(settings.clock_policy);

        let seed = settings.session_seed();
        let session = Arc::new(Session {
            state: Mutex::new(SessionState::new(seed, settings.rules())),
            latest: Mutex::new(None),
            last_phase: Mutex::new(GamePhase::Menu),
            handle: scheduler.handle(),
            slot: SaveSlot::new(settings.save_path.clone()),
            autopilot: AtomicBool::new(false),
            muted: AtomicBool::new(false),
        });
        log::info!("Game created with seed {}", seed);

        Self { scheduler, session }
    }

    /// Launch the scheduler tasks
    pub fn start(&mut self) {
        if self.session.handle.is_running() {
            return;
        }
        self.scheduler.start(self.session.clone());
    }

    /// Stop the scheduler and wait for its tasks
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn handle(&self) -> SchedulerHandle {
        self.scheduler.handle()
    }

    pub fn set_autopilot(&self, enabled: bool) {
        self.session.autopilot.store(enabled, Ordering::Relaxed);
        log::info!("Autopilot: {}", enabled);
    }

    pub fn is_muted(&self) -> bool {
        self.session.muted.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> GamePhase {
        self.session.lock().phase
    }

    /// Current state, captured now
    pub fn frame(&self) -> Frame {
        Frame::capture(&self.session.lock())
    }

    /// Frame published by the most recent logic tick
    pub fn latest_frame(&self) -> Option<Frame> {
        self.session
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn drain_events(&self) -> Vec<GameEvent> {
        self.session.lock().drain_events()
    }

    /// Run `f` with the session locked
    pub fn with_state<T>(&self, f: impl FnOnce(&mut SessionState) -> T) -> T {
        f(&mut self.session.lock())
    }

    /// Apply a command. Save/load failures are logged, never fatal.
    pub fn send(&mut self, command: Command) {
        match command {
            Command::Start => {
                let mut state = self.session.lock();
                if state.phase == GamePhase::Menu {
                    state.restart();
                }
                drop(state);
                self.start();
            }
            Command::MovePaddle(direction) => {
                // Detached: the burst ends on its own
                drop(self.move_paddle(direction));
            }
            Command::TogglePause => self.toggle_pause(),
            Command::ToggleMute => {
                let muted = !self.session.muted.fetch_xor(true, Ordering::Relaxed);
                self.session.lock().push_event(GameEvent::MuteToggled);
                log::info!("Muted: {}", muted);
            }
            Command::Save => {
                if let Err(e) = self.save() {
                    log::error!("Error saving game: {}", e);
                }
            }
            Command::Load => {
                if let Err(e) = self.load() {
                    log::error!("Error loading game: {}", e);
                }
            }
            Command::Restart => self.restart(),
        }
    }

    /// Nudge the paddle 30 times on a background thread, accelerating
    pub fn move_paddle(&self, direction: Direction) -> JoinHandle<()> {
        let session = Arc::clone(&self.session);
        thread::spawn(move || {
            for delay in nudge_delays() {
                if !session.handle.is_running() {
                    break;
                }
                {
                    let mut state = session.lock();
                    if state.phase == GamePhase::Playing {
                        state.paddle.nudge(direction.delta());
                    }
                }
                thread::sleep(delay);
            }
        })
    }

    fn toggle_pause(&mut self) {
        let paused = self.session.lock().toggle_pause();
        let handle = &self.session.handle;
        if paused {
            handle.pause();
        } else {
            handle.resume();
        }
        log::info!("Paused: {}", paused);
    }

    pub fn has_save(&self) -> bool {
        self.session.slot.exists()
    }

    /// Capture under the lock, write after releasing it
    pub fn save(&self) -> PersistResult<()> {
        let snapshot = Snapshot::capture(&self.session.lock());
        self.session.slot.write(&snapshot)
    }

    /// Load the save slot; the session is untouched on failure
    pub fn load(&mut self) -> PersistResult<()> {
        self.session.slot.load_into(&mut self.session.lock())?;
        self.session.handle.resume();
        self.start();
        Ok(())
    }

    /// Reset to level 1 and make sure the loop is running
    pub fn restart(&mut self) {
        self.session.lock().restart();
        self.session.handle.resume();
        self.start();
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}
