//! Collision detection and response for axis-aligned geometry
//!
//! Detection and response are split in two phases: detection only records
//! which surface was struck in [`CollisionFlags`], then [`resolve_direction`]
//! turns the flag set into new direction flags for the ball.

use glam::DVec2;

use super::state::Ball;
use crate::settings::BlockSideResponse;

/// Axis-aligned rectangle (top-left origin, y grows downward)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Inclusive horizontal span test
    #[inline]
    pub fn spans_x(&self, x: f64) -> bool {
        x >= self.x && x <= self.right()
    }

    /// Inclusive vertical span test
    #[inline]
    pub fn spans_y(&self, y: f64) -> bool {
        y >= self.y && y <= self.bottom()
    }

    /// Inclusive point containment
    pub fn contains(&self, point: DVec2) -> bool {
        self.spans_x(point.x) && self.spans_y(point.y)
    }
}

/// Side of a block struck by the ball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitSide {
    Top,
    Bottom,
    Left,
    Right,
}

/// Which surfaces the ball struck during the current tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionFlags {
    pub paddle: bool,
    /// Ball was right of the paddle centre on the last paddle hit
    pub paddle_bounce_right: bool,
    pub right_wall: bool,
    pub left_wall: bool,
    pub block_right: bool,
    pub block_bottom: bool,
    pub block_left: bool,
    pub block_top: bool,
}

impl CollisionFlags {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }

    /// Record a block hit on the given side (after clearing)
    pub fn set_block_hit(&mut self, side: HitSide) {
        self.clear();
        match side {
            HitSide::Right => self.block_right = true,
            HitSide::Bottom => self.block_bottom = true,
            HitSide::Left => self.block_left = true,
            HitSide::Top => self.block_top = true,
        }
    }
}

/// Radius-aware band test of a ball against a block rectangle
///
/// Sides are tested bottom, top, right, left; the first match wins.
pub fn ball_rect_collision(pos: DVec2, radius: f64, rect: &Rect) -> Option<HitSide> {
    let (x, y) = (pos.x, pos.y);

    if rect.spans_x(x) && y - radius <= rect.bottom() && y + radius > rect.bottom() {
        return Some(HitSide::Bottom);
    }
    if rect.spans_x(x) && y + radius >= rect.y && y - radius < rect.y {
        return Some(HitSide::Top);
    }
    if rect.spans_y(y) && x - radius <= rect.right() && x + radius > rect.right() {
        return Some(HitSide::Right);
    }
    if rect.spans_y(y) && x + radius >= rect.x && x - radius < rect.x {
        return Some(HitSide::Left);
    }

    None
}

/// Horizontal speed after a paddle hit
///
/// `relation` is the ball offset from the paddle centre normalised by half
/// the paddle width. Three bands: near centre rebounds slowly, the middle
/// and edge bands gain speed with the level.
pub fn paddle_rebound_speed(relation: f64, level: u32) -> f64 {
    let r = relation.abs();
    let level_boost = f64::from(level) / 3.5;

    if r <= 0.3 {
        r
    } else if r <= 0.7 {
        r * 1.5 + level_boost
    } else {
        r * 2.0 + level_boost
    }
}

/// Apply the recorded collision flags to the ball's direction
///
/// Later rules override earlier ones within the same tick.
pub fn resolve_direction(flags: &CollisionFlags, ball: &mut Ball, policy: BlockSideResponse) {
    if flags.paddle {
        ball.moving_right = flags.paddle_bounce_right;
    }

    if flags.right_wall {
        ball.moving_right = false;
    }
    if flags.left_wall {
        ball.moving_right = true;
    }

    if flags.block_right {
        ball.moving_right = true;
    }
    if flags.block_left {
        ball.moving_right = match policy {
            BlockSideResponse::Historical => true,
            BlockSideResponse::Mirrored => false,
        };
    }
    if flags.block_top {
        ball.moving_down = false;
    }
    if flags.block_bottom {
        ball.moving_down = true;
    }
}
