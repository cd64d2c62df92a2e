//! Physics tick and the fixed-step game loop
//!
//! `physics_tick` is the unit shared by the threaded scheduler and the
//! fixed-step `step` loop. Sub-steps always run in this order:
//! invincibility expiry, ball integration, top wall, bottom boundary,
//! paddle, side walls, blocks, direction resolution, bonuses, level clear.

use std::time::Duration;

use super::bonus::{Bonus, advance_bonuses};
use super::collision::{paddle_rebound_speed, resolve_direction};
use super::grid::{BlockGrid, BlockHit, BlockKind};
use super::state::{GameEvent, GamePhase, SessionState};
use crate::consts::*;

/// Horizontal paddle command direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// One-unit paddle nudge
    pub fn delta(self) -> f64 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
        }
    }
}

/// Nudges performed by one held-key move command
pub const NUDGES_PER_MOVE: u32 = 30;

/// Delays between the nudges of one move command
///
/// Short 4 ms steps first, then each later step waits one millisecond more.
pub fn nudge_delays() -> impl Iterator<Item = Duration> {
    let mut sleep_ms = 4;
    (0..NUDGES_PER_MOVE).map(move |i| {
        let delay = Duration::from_millis(sleep_ms);
        if i >= 20 {
            sleep_ms = u64::from(i);
        }
        delay
    })
}

/// Autopilot paddle speed (units per tick)
const AUTOPILOT_SPEED: f64 = 3.0;

/// Input commands for a single fixed step
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Paddle nudges to apply this step
    pub nudge: Option<Direction>,
    pub nudge_count: u32,
    /// Pause toggle
    pub pause: bool,
    /// Start a new game from the menu
    pub start: bool,
    /// Reset the session and start over at level 1
    pub restart: bool,
    /// Idle/demo mode - autopilot steers the paddle
    pub idle_mode: bool,
}

/// Advance the session by one fixed step of `dt_ms` milliseconds
pub fn step(state: &mut SessionState, input: &TickInput, dt_ms: u64) {
    if input.restart || (input.start && state.phase == GamePhase::Menu) {
        state.restart();
    }

    if input.pause {
        state.toggle_pause();
    }

    state.advance_clock(dt_ms);

    if state.phase != GamePhase::Playing {
        return;
    }

    if input.idle_mode {
        autopilot(state);
    } else if let Some(direction) = input.nudge {
        for _ in 0..input.nudge_count.max(1) {
            state.paddle.nudge(direction.delta());
        }
    }

    physics_tick(state);
}

/// Steer the paddle centre toward the ball
pub fn autopilot(state: &mut SessionState) {
    let offset = state.ball.pos.x - state.paddle.center_x();
    let moves = offset.abs().min(AUTOPILOT_SPEED).floor() as u32;
    let delta = offset.signum();
    for _ in 0..moves {
        state.paddle.nudge(delta);
    }
}

/// Run one physics tick
pub fn physics_tick(state: &mut SessionState) {
    if state.phase != GamePhase::Playing {
        return;
    }

    state.update_invincibility();

    let mut spawned = Vec::new();
    move_ball(state, &mut spawned);

    if state.phase != GamePhase::Playing {
        return;
    }

    let paddle_rect = state.paddle.rect();
    for pos in advance_bonuses(&mut state.bonuses, &paddle_rect, state.elapsed_ms) {
        state.score += BONUS_SCORE;
        state.push_event(GameEvent::BonusCaught { pos });
        log::debug!("Bonus caught at ({:.0}, {:.0})", pos.x, pos.y);
    }

    // Deferred so the bonus pass never sees this tick's spawns
    for bonus in spawned {
        state.push_event(GameEvent::BonusSpawned { pos: bonus.pos });
        state.bonuses.push(bonus);
    }

    if state.grid.is_cleared() {
        log::info!("Level {} cleared (score {})", state.level, state.score);
        state.begin_next_level();
    }
}

/// Integrate the ball and resolve every collision for this tick
fn move_ball(state: &mut SessionState, spawned: &mut Vec<Bonus>) {
    state.ball.integrate();
    state.flags.clear();

    // Ceiling: bounce and skip everything else this tick
    if state.ball.pos.y <= 0.0 {
        state.ball.moving_down = true;
        return;
    }

    if state.ball.pos.y >= ARENA_HEIGHT {
        state.ball.moving_down = false;
        if !state.invincible {
            lose_life(state);
            if state.phase == GamePhase::GameOver {
                return;
            }
        }
    }

    let ball = &state.ball;
    let paddle = &state.paddle;
    if ball.pos.y >= paddle.y - ball.radius && paddle.rect().spans_x(ball.pos.x) {
        let offset = ball.pos.x - paddle.center_x();
        let relation = offset / (paddle.width / 2.0);

        state.last_paddle_hit_ms = state.elapsed_ms;
        state.flags.clear();
        state.flags.paddle = true;
        state.flags.paddle_bounce_right = offset > 0.0;
        state.ball.moving_down = false;
        state.ball.vx = paddle_rebound_speed(relation, state.level);
    }

    if state.ball.pos.x >= ARENA_WIDTH {
        state.flags.clear();
        state.flags.right_wall = true;
    }
    if state.ball.pos.x <= 0.0 {
        state.flags.clear();
        state.flags.left_wall = true;
    }

    if BlockGrid::band_contains(state.level, state.ball.pos.y) {
        if let Some(hit) = state.grid.strike(state.ball.pos, state.ball.radius) {
            on_block_destroyed(state, hit, spawned);
        }
    }

    resolve_direction(&state.flags, &mut state.ball, state.rules.block_side_response);
}

fn lose_life(state: &mut SessionState) {
    state.lives = state.lives.saturating_sub(1);
    state.push_event(GameEvent::LifeLost { lives: state.lives });
    log::debug!("Life lost, {} left", state.lives);

    if state.lives == 0 {
        state.phase = GamePhase::GameOver;
        state.push_event(GameEvent::GameOver { score: state.score });
        log::info!("Game over at level {} with score {}", state.level, state.score);
    }
}

fn on_block_destroyed(state: &mut SessionState, hit: BlockHit, spawned: &mut Vec<Bonus>) {
    state.score += BLOCK_SCORE;
    state.flags.set_block_hit(hit.side);
    state.push_event(GameEvent::BlockDestroyed {
        row: hit.row,
        column: hit.column,
        kind: hit.kind,
        pos: hit.pos,
    });

    match hit.kind {
        BlockKind::Chocolate => spawned.push(Bonus::spawn(hit.row, hit.column, state.elapsed_ms)),
        BlockKind::Star => {
            state.start_invincibility();
            log::debug!("Invincible for {} ms", state.rules.invincibility_ms);
        }
        BlockKind::Heart => {
            state.lives += 1;
            state.push_event(GameEvent::LifeGained { lives: state.lives });
        }
        BlockKind::Normal => {}
    }
}
