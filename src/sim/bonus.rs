//! Falling bonus pickups dropped by chocolate blocks

use glam::DVec2;

use super::collision::Rect;
use crate::consts::*;

/// A falling pickup
#[derive(Debug, Clone, PartialEq)]
pub struct Bonus {
    pub pos: DVec2,
    /// Elapsed session time (ms) at spawn
    pub created_ms: u64,
    pub taken: bool,
}

impl Bonus {
    /// Spawn centred on the grid cell that dropped it
    pub fn spawn(row: u32, column: u32, created_ms: u64) -> Self {
        let x = f64::from(column) * BLOCK_WIDTH + BLOCK_PADDING_LEFT + BLOCK_WIDTH / 2.0
            - BONUS_OFFSET;
        let y = f64::from(row) * BLOCK_HEIGHT + BLOCK_PADDING_TOP + BLOCK_HEIGHT / 2.0
            - BONUS_OFFSET;
        Self {
            pos: DVec2::new(x, y),
            created_ms,
            taken: false,
        }
    }

    /// Still falling and catchable
    pub fn is_active(&self) -> bool {
        !self.taken && self.pos.y <= ARENA_HEIGHT
    }

    /// Fall distance for this tick; grows with the bonus' age
    pub fn fall_step(&self, elapsed_ms: u64) -> f64 {
        elapsed_ms.saturating_sub(self.created_ms) as f64 / 1000.0 + 1.0
    }
}

/// Advance every active bonus one tick against the paddle rectangle
///
/// Returns positions of bonuses caught this tick. Taken or fallen bonuses
/// stay in the slice untouched.
pub fn advance_bonuses(bonuses: &mut [Bonus], paddle: &Rect, elapsed_ms: u64) -> Vec<DVec2> {
    let mut caught = Vec::new();

    for bonus in bonuses.iter_mut() {
        if !bonus.is_active() {
            continue;
        }

        if paddle.contains(bonus.pos) {
            bonus.taken = true;
            caught.push(bonus.pos);
            continue;
        }

        bonus.pos.y += bonus.fall_step(elapsed_ms);
    }

    caught
}
