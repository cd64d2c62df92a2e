//! Brick Breaker - a Breakout-style arcade game engine
//!
//! Core modules:
//! - `sim`: Simulation (physics, collisions, block grid, bonuses, game state)
//! - `scheduler`: Four periodic game-loop tasks sharing one pause gate
//! - `game`: Threaded session wiring the simulation to the scheduler
//! - `persistence`: Binary session snapshots with versioning and backups
//! - `settings`: Data-driven configuration

pub mod game;
pub mod persistence;
pub mod scheduler;
pub mod settings;
pub mod sim;

pub use game::Game;
pub use scheduler::{GameLoop, Scheduler, SchedulerHandle};
pub use settings::{BlockSideResponse, ClockPolicy, Settings};

/// Game configuration constants
pub mod consts {
    /// Default logic/physics/render rate
    pub const DEFAULT_TICKS_PER_SECOND: u32 = 120;
    /// The time task always advances one millisecond per iteration
    pub const TIME_TICK_MS: u64 = 1;

    /// Arena dimensions
    pub const ARENA_WIDTH: f64 = 500.0;
    pub const ARENA_HEIGHT: f64 = 700.0;

    /// Paddle defaults
    pub const PADDLE_WIDTH: f64 = 130.0;
    pub const PADDLE_HEIGHT: f64 = 30.0;
    pub const PADDLE_START_X: f64 = 0.0;
    pub const PADDLE_Y: f64 = 640.0;

    /// Ball defaults
    pub const BALL_RADIUS: f64 = 10.0;
    pub const BALL_START_SPEED: f64 = 1.0;

    /// Block cell geometry
    pub const BLOCK_WIDTH: f64 = 100.0;
    pub const BLOCK_HEIGHT: f64 = 30.0;
    pub const BLOCK_PADDING_TOP: f64 = BLOCK_HEIGHT * 2.0;
    pub const BLOCK_PADDING_LEFT: f64 = 50.0;
    pub const GRID_COLUMNS: u32 = 4;

    /// Falling bonus geometry
    pub const BONUS_SIZE: f64 = 30.0;
    pub const BONUS_OFFSET: f64 = BONUS_SIZE / 2.0;

    /// Scoring
    pub const BLOCK_SCORE: u32 = 1;
    pub const BONUS_SCORE: u32 = 3;

    /// Session defaults
    pub const STARTING_LIVES: u32 = 3;
    pub const FINAL_LEVEL: u32 = 18;
    pub const INVINCIBILITY_MS: u64 = 5000;
}
