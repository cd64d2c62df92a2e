//! Session state and core simulation types
//!
//! Everything a snapshot must carry, plus the per-level reset logic.

use glam::DVec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::bonus::Bonus;
use super::collision::{CollisionFlags, Rect};
use super::grid::{BlockColor, BlockGrid, BlockKind};
use crate::consts::*;
use crate::settings::{BlockSideResponse, ClockPolicy};

/// Current phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for a new game or a load
    Menu,
    /// Active gameplay
    Playing,
    /// Game is paused
    Paused,
    /// All lives lost
    GameOver,
    /// Final level reached
    Win,
}

impl GamePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GamePhase::GameOver | GamePhase::Win)
    }
}

/// Things the presentation layer should react to (popups, sounds, shakes)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    BlockDestroyed {
        row: u32,
        column: u32,
        kind: BlockKind,
        pos: DVec2,
    },
    BonusSpawned { pos: DVec2 },
    BonusCaught { pos: DVec2 },
    LifeLost { lives: u32 },
    LifeGained { lives: u32 },
    InvincibilityStarted,
    InvincibilityEnded,
    LevelUp { level: u32 },
    GameOver { score: u32 },
    Win { score: u32 },
    MuteToggled,
}

/// Maximum undrained events kept for the presentation layer
pub const MAX_PENDING_EVENTS: usize = 256;

/// The ball
#[derive(Debug, Clone, PartialEq)]
pub struct Ball {
    pub pos: DVec2,
    pub radius: f64,
    /// Horizontal speed magnitude
    pub vx: f64,
    /// Vertical speed magnitude
    pub vy: f64,
    pub moving_right: bool,
    pub moving_down: bool,
}

impl Default for Ball {
    fn default() -> Self {
        Self {
            pos: DVec2::new(ARENA_WIDTH / 2.0, ARENA_HEIGHT / 2.0),
            radius: BALL_RADIUS,
            vx: BALL_START_SPEED,
            vy: BALL_START_SPEED,
            moving_right: true,
            moving_down: true,
        }
    }
}

impl Ball {
    /// Discrete Euler step along the current direction flags
    pub fn integrate(&mut self) {
        if self.moving_down {
            self.pos.y += self.vy;
        } else {
            self.pos.y -= self.vy;
        }
        if self.moving_right {
            self.pos.x += self.vx;
        } else {
            self.pos.x -= self.vx;
        }
    }
}

/// The player's paddle
#[derive(Debug, Clone, PartialEq)]
pub struct Paddle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Paddle {
    fn default() -> Self {
        Self {
            x: PADDLE_START_X,
            y: PADDLE_Y,
            width: PADDLE_WIDTH,
            height: PADDLE_HEIGHT,
        }
    }
}

impl Paddle {
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    /// Move by `delta`, refusing moves that start at an arena edge
    pub fn nudge(&mut self, delta: f64) {
        if (delta > 0.0 && self.x + self.width < ARENA_WIDTH) || (delta < 0.0 && self.x > 0.0) {
            self.x += delta;
        }
    }
}

/// Gameplay rules fixed for the lifetime of a session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rules {
    pub final_level: u32,
    pub starting_lives: u32,
    pub invincibility_ms: u64,
    pub block_side_response: BlockSideResponse,
    pub clock_policy: ClockPolicy,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            final_level: FINAL_LEVEL,
            starting_lives: STARTING_LIVES,
            invincibility_ms: INVINCIBILITY_MS,
            block_side_response: BlockSideResponse::default(),
            clock_policy: ClockPolicy::default(),
        }
    }
}

/// Complete session state
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Run seed for level generation
    pub seed: u64,
    rng: Pcg32,
    pub rules: Rules,
    pub phase: GamePhase,
    /// Current level (1-based once playing)
    pub level: u32,
    pub score: u32,
    pub lives: u32,
    /// Session clock, reset every level
    pub elapsed_ms: u64,
    /// Gold status: immune to life loss
    pub invincible: bool,
    pub invincible_since_ms: u64,
    /// A heart block was already generated this level
    pub heart_spawned: bool,
    pub last_paddle_hit_ms: u64,
    pub ball: Ball,
    pub paddle: Paddle,
    pub flags: CollisionFlags,
    pub grid: BlockGrid,
    pub bonuses: Vec<Bonus>,
    events: Vec<GameEvent>,
}

impl SessionState {
    pub fn new(seed: u64, rules: Rules) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            rules,
            phase: GamePhase::Menu,
            level: 0,
            score: 0,
            lives: rules.starting_lives,
            elapsed_ms: 0,
            invincible: false,
            invincible_since_ms: 0,
            heart_spawned: false,
            last_paddle_hit_ms: 0,
            ball: Ball::default(),
            paddle: Paddle::default(),
            flags: CollisionFlags::default(),
            grid: BlockGrid::default(),
            bonuses: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Reset score, lives and level, then start level 1
    pub fn restart(&mut self) {
        self.level = 0;
        self.score = 0;
        self.lives = self.rules.starting_lives;
        self.begin_next_level();
        log::info!("New game started (seed {})", self.seed);
    }

    /// Advance to the next level with a fully regenerated playfield
    pub fn begin_next_level(&mut self) {
        self.level += 1;
        self.reset_level_state();

        if self.level >= self.rules.final_level {
            self.phase = GamePhase::Win;
            self.push_event(GameEvent::Win { score: self.score });
            log::info!("Final level reached - win with score {}", self.score);
            return;
        }

        self.grid = BlockGrid::generate(self.level, &mut self.rng, &mut self.heart_spawned);
        self.phase = GamePhase::Playing;
        if self.level > 1 {
            self.push_event(GameEvent::LevelUp { level: self.level });
        }
        log::info!("Level {} started with {} blocks", self.level, self.grid.total());
    }

    /// Discard everything that belongs to a single level
    fn reset_level_state(&mut self) {
        self.ball = Ball::default();
        self.paddle = Paddle::default();
        self.flags.clear();
        self.grid = BlockGrid::default();
        self.bonuses.clear();
        self.invincible = false;
        self.invincible_since_ms = 0;
        self.heart_spawned = false;
        self.last_paddle_hit_ms = 0;
        self.elapsed_ms = 0;
    }

    /// Advance the session clock, honouring the pause policy
    pub fn advance_clock(&mut self, ms: u64) {
        let ticking = match self.phase {
            GamePhase::Playing => true,
            GamePhase::Paused => self.rules.clock_policy == ClockPolicy::Free,
            _ => false,
        };
        if ticking {
            self.elapsed_ms += ms;
        }
    }

    /// Toggle between Playing and Paused. Returns true if now paused.
    pub fn toggle_pause(&mut self) -> bool {
        match self.phase {
            GamePhase::Playing => self.phase = GamePhase::Paused,
            GamePhase::Paused => self.phase = GamePhase::Playing,
            _ => {}
        }
        self.phase == GamePhase::Paused
    }

    pub fn destroyed_count(&self) -> u32 {
        self.grid.destroyed_count()
    }

    /// Enter gold status at the current time
    pub fn start_invincibility(&mut self) {
        self.invincible = true;
        self.invincible_since_ms = self.elapsed_ms;
        self.push_event(GameEvent::InvincibilityStarted);
    }

    /// Revoke gold status once its window has run out
    pub fn update_invincibility(&mut self) {
        if self.invincible
            && self.elapsed_ms.saturating_sub(self.invincible_since_ms) >= self.rules.invincibility_ms
        {
            self.invincible = false;
            self.push_event(GameEvent::InvincibilityEnded);
        }
    }

    pub fn push_event(&mut self, event: GameEvent) {
        if self.events.len() >= MAX_PENDING_EVENTS {
            self.events.remove(0);
        }
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[GameEvent] {
        &self.events
    }
}

/// A block as seen by the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct BlockView {
    pub row: u32,
    pub column: u32,
    pub kind: BlockKind,
    pub color: BlockColor,
    pub pos: DVec2,
    pub visible: bool,
}

/// Read-only view of the session for one logic tick
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub phase: GamePhase,
    pub level: u32,
    pub score: u32,
    pub lives: u32,
    pub invincible: bool,
    pub ball: DVec2,
    pub paddle: DVec2,
    pub bonuses: Vec<DVec2>,
    pub blocks: Vec<BlockView>,
}

impl Frame {
    pub fn capture(state: &SessionState) -> Self {
        Self {
            phase: state.phase,
            level: state.level,
            score: state.score,
            lives: state.lives,
            invincible: state.invincible,
            ball: state.ball.pos,
            paddle: DVec2::new(state.paddle.x, state.paddle.y),
            bonuses: state
                .bonuses
                .iter()
                .filter(|b| b.is_active())
                .map(|b| b.pos)
                .collect(),
            blocks: state
                .grid
                .blocks()
                .iter()
                .map(|b| BlockView {
                    row: b.row,
                    column: b.column,
                    kind: b.kind,
                    color: b.color,
                    pos: DVec2::new(b.rect().x, b.rect().y),
                    visible: !b.is_destroyed(),
                })
                .collect(),
        }
    }
}
