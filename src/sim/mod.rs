//! Simulation module
//!
//! All gameplay logic lives here. Nothing in this module touches threads,
//! files or the clock directly:
//! - Time only advances through `SessionState::advance_clock`
//! - Seeded RNG only
//! - Stable iteration order (grid creation order)

pub mod bonus;
pub mod collision;
pub mod grid;
pub mod state;
pub mod tick;

pub use bonus::{Bonus, advance_bonuses};
pub use collision::{CollisionFlags, HitSide, paddle_rebound_speed, resolve_direction};
pub use grid::{Block, BlockColor, BlockGrid, BlockKind};
pub use state::{Ball, Frame, GameEvent, GamePhase, Paddle, SessionState};
pub use tick::{Direction, TickInput, autopilot, nudge_delays, physics_tick, step};
