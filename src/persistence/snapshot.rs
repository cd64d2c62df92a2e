//! Session snapshot: capture, binary layout and re-application
//!
//! Layout (big-endian): magic `BRKS`, schema version, then the scalar fields
//! in wire order, twelve boolean bytes, and the surviving block list.

use std::collections::HashSet;

use glam::DVec2;

use super::codec::{Reader, Writer};
use super::{PersistError, PersistResult};
use crate::consts::GRID_COLUMNS;
use crate::sim::collision::CollisionFlags;
use crate::sim::grid::{Block, BlockColor, BlockGrid, BlockKind};
use crate::sim::state::{Ball, GamePhase, Paddle, Rules, SessionState};

pub const MAGIC: &[u8; 4] = b"BRKS";
pub const SCHEMA_VERSION: u16 = 1;

/// A surviving block as stored in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedBlock {
    pub row: u32,
    pub column: u32,
    pub kind: BlockKind,
    pub color: BlockColor,
}

/// Everything needed to resume a session mid-level
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub level: u32,
    pub score: u32,
    pub lives: u32,
    pub destroyed: u32,
    pub ball_pos: DVec2,
    pub paddle_pos: DVec2,
    /// Stored for layout compatibility; re-derived from the paddle on apply
    pub paddle_center_x: f64,
    pub elapsed_ms: u64,
    pub invincible_since_ms: u64,
    pub ball_vx: f64,
    pub heart_spawned: bool,
    pub invincible: bool,
    pub moving_down: bool,
    pub moving_right: bool,
    pub flags: CollisionFlags,
    pub blocks: Vec<SavedBlock>,
}

impl Snapshot {
    /// Capture the current session; destroyed blocks are left out
    pub fn capture(state: &SessionState) -> Self {
        Self {
            level: state.level,
            score: state.score,
            lives: state.lives,
            destroyed: state.destroyed_count(),
            ball_pos: state.ball.pos,
            paddle_pos: DVec2::new(state.paddle.x, state.paddle.y),
            paddle_center_x: state.paddle.center_x(),
            elapsed_ms: state.elapsed_ms,
            invincible_since_ms: state.invincible_since_ms,
            ball_vx: state.ball.vx,
            heart_spawned: state.heart_spawned,
            invincible: state.invincible,
            moving_down: state.ball.moving_down,
            moving_right: state.ball.moving_right,
            flags: state.flags,
            blocks: state
                .grid
                .survivors()
                .map(|b| SavedBlock {
                    row: b.row,
                    column: b.column,
                    kind: b.kind,
                    color: b.color,
                })
                .collect(),
        }
    }

    /// Replace the session's level state with this snapshot
    ///
    /// Block rectangles are re-derived from row/column. Falling bonuses are
    /// not part of a snapshot and are discarded.
    pub fn apply(&self, state: &mut SessionState) {
        state.level = self.level;
        state.score = self.score;
        state.lives = self.lives;
        state.elapsed_ms = self.elapsed_ms;
        state.invincible = self.invincible;
        state.invincible_since_ms = self.invincible_since_ms;
        state.heart_spawned = self.heart_spawned;
        state.last_paddle_hit_ms = 0;

        state.ball = Ball {
            pos: self.ball_pos,
            vx: self.ball_vx,
            moving_right: self.moving_right,
            moving_down: self.moving_down,
            ..Ball::default()
        };
        state.paddle = Paddle {
            x: self.paddle_pos.x,
            y: self.paddle_pos.y,
            ..Paddle::default()
        };
        state.flags = self.flags;

        let blocks = self
            .blocks
            .iter()
            .map(|b| Block::new(b.row, b.column, b.kind, b.color))
            .collect();
        state.grid = BlockGrid::from_blocks(blocks, self.destroyed);
        state.bonuses.clear();
        state.phase = GamePhase::Playing;
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_bytes(MAGIC);
        w.put_u16(SCHEMA_VERSION);

        w.put_u32(self.level);
        w.put_u32(self.score);
        w.put_u32(self.lives);
        w.put_u32(self.destroyed);
        w.put_f64(self.ball_pos.x);
        w.put_f64(self.ball_pos.y);
        w.put_f64(self.paddle_pos.x);
        w.put_f64(self.paddle_pos.y);
        w.put_f64(self.paddle_center_x);
        w.put_u64(self.elapsed_ms);
        w.put_u64(self.invincible_since_ms);
        w.put_f64(self.ball_vx);

        w.put_bool(self.heart_spawned);
        w.put_bool(self.invincible);
        w.put_bool(self.moving_down);
        w.put_bool(self.moving_right);
        w.put_bool(self.flags.paddle);
        w.put_bool(self.flags.paddle_bounce_right);
        w.put_bool(self.flags.right_wall);
        w.put_bool(self.flags.left_wall);
        w.put_bool(self.flags.block_right);
        w.put_bool(self.flags.block_bottom);
        w.put_bool(self.flags.block_left);
        w.put_bool(self.flags.block_top);

        w.put_u32(self.blocks.len() as u32);
        for block in &self.blocks {
            w.put_u32(block.row);
            w.put_u32(block.column);
            w.put_u8(block.kind.to_tag());
            w.put_str(block.color.label());
        }

        w.finish()
    }

    /// Decode a full snapshot, rejecting anything malformed
    pub fn decode(bytes: &[u8]) -> PersistResult<Self> {
        let mut r = Reader::new(bytes);

        if r.take(MAGIC.len(), "magic").map_err(|_| PersistError::BadMagic)? != MAGIC {
            return Err(PersistError::BadMagic);
        }
        let version = r.u16("version")?;
        if version != SCHEMA_VERSION {
            return Err(PersistError::UnsupportedVersion(version));
        }

        let level = r.u32("level")?;
        let score = r.u32("score")?;
        let lives = r.u32("lives")?;
        let destroyed = r.u32("destroyed")?;
        let ball_pos = DVec2::new(r.f64("ball_x")?, r.f64("ball_y")?);
        let paddle_pos = DVec2::new(r.f64("paddle_x")?, r.f64("paddle_y")?);
        let paddle_center_x = r.f64("paddle_center_x")?;
        let elapsed_ms = r.u64("elapsed")?;
        let invincible_since_ms = r.u64("invincibility_start")?;
        let ball_vx = r.f64("ball_vx")?;

        let heart_spawned = r.bool("heart_spawned")?;
        let invincible = r.bool("invincible")?;
        let moving_down = r.bool("moving_down")?;
        let moving_right = r.bool("moving_right")?;
        let flags = CollisionFlags {
            paddle: r.bool("paddle_hit")?,
            paddle_bounce_right: r.bool("paddle_bounce_right")?,
            right_wall: r.bool("right_wall_hit")?,
            left_wall: r.bool("left_wall_hit")?,
            block_right: r.bool("block_right_hit")?,
            block_bottom: r.bool("block_bottom_hit")?,
            block_left: r.bool("block_left_hit")?,
            block_top: r.bool("block_top_hit")?,
        };

        let count = r.u32("block_count")?;
        // Each block needs at least 11 bytes; don't trust the count for allocation
        let mut blocks = Vec::with_capacity((count as usize).min(r.remaining() / 11));
        let mut cells = HashSet::new();
        for _ in 0..count {
            let row = r.u32("block_row")?;
            let column = r.u32("block_column")?;
            let tag = r.u8("block_type")?;
            let kind = BlockKind::from_tag(tag).ok_or(PersistError::InvalidBlockKind(tag))?;
            let label = r.string("block_color")?;
            let color = BlockColor::from_label(&label).ok_or(PersistError::InvalidColor(label))?;
            if !cells.insert((row, column)) {
                return Err(PersistError::DuplicateBlock { row, column });
            }
            blocks.push(SavedBlock {
                row,
                column,
                kind,
                color,
            });
        }

        if r.remaining() > 0 {
            return Err(PersistError::TrailingBytes(r.remaining()));
        }

        let snapshot = Self {
            level,
            score,
            lives,
            destroyed,
            ball_pos,
            paddle_pos,
            paddle_center_x,
            elapsed_ms,
            invincible_since_ms,
            ball_vx,
            heart_spawned,
            invincible,
            moving_down,
            moving_right,
            flags,
            blocks,
        };
        snapshot.check_grid()?;
        Ok(snapshot)
    }

    /// Reject level and block values that don't fit the level's grid
    fn check_grid(&self) -> PersistResult<()> {
        if self.level == 0 {
            return Err(PersistError::InvalidValue {
                field: "level",
                value: 0,
            });
        }

        let cells = u64::from(GRID_COLUMNS) * (u64::from(self.level) + 1);
        let occupied = self.blocks.len() as u64 + u64::from(self.destroyed);
        if occupied > cells {
            return Err(PersistError::InvalidValue {
                field: "destroyed",
                value: u64::from(self.destroyed),
            });
        }

        for block in &self.blocks {
            if block.row > self.level {
                return Err(PersistError::InvalidValue {
                    field: "block_row",
                    value: u64::from(block.row),
                });
            }
            if block.column >= GRID_COLUMNS {
                return Err(PersistError::InvalidValue {
                    field: "block_column",
                    value: u64::from(block.column),
                });
            }
        }
        Ok(())
    }

    /// Reject snapshots the session's rules cannot resume (already won)
    pub fn check_rules(&self, rules: &Rules) -> PersistResult<()> {
        if self.level >= rules.final_level {
            return Err(PersistError::InvalidValue {
                field: "level",
                value: u64::from(self.level),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::FINAL_LEVEL;
    use crate::sim::physics_tick;
    use proptest::prelude::*;

    fn played_state() -> SessionState {
        let mut state = SessionState::new(11, Rules::default());
        state.restart();
        for _ in 0..500 {
            physics_tick(&mut state);
            state.advance_clock(8);
        }
        state
    }

    fn block_set(state: &SessionState) -> HashSet<(u32, u32, BlockKind)> {
        state.grid.survivors().map(|b| (b.row, b.column, b.kind)).collect()
    }

    #[test]
    fn test_round_trip_restores_session() {
        let mut state = played_state();
        state.score = 7;
        state.invincible = true;
        state.invincible_since_ms = 1234;
        state.flags.block_left = true;

        let snapshot = Snapshot::capture(&state);
        let decoded = Snapshot::decode(&snapshot.encode()).unwrap();
        assert_eq!(decoded, snapshot);

        let mut restored = SessionState::new(99, Rules::default());
        decoded.apply(&mut restored);
        assert_eq!(restored.level, state.level);
        assert_eq!(restored.score, 7);
        assert_eq!(restored.lives, state.lives);
        assert_eq!(restored.elapsed_ms, state.elapsed_ms);
        assert_eq!(restored.ball.pos, state.ball.pos);
        assert_eq!(restored.ball.vx, state.ball.vx);
        assert_eq!(restored.paddle.x, state.paddle.x);
        assert!(restored.invincible);
        assert_eq!(restored.invincible_since_ms, 1234);
        assert_eq!(restored.flags, state.flags);
        assert_eq!(restored.phase, GamePhase::Playing);
        assert_eq!(block_set(&restored), block_set(&state));
    }

    #[test]
    fn test_destroyed_blocks_absent_after_load() {
        let mut state = SessionState::new(3, Rules::default());
        state.restart();
        let first = *state.grid.blocks()[0].rect();
        let hit = state
            .grid
            .strike(DVec2::new(first.x + 50.0, first.bottom() - 1.0), 10.0);
        assert!(hit.is_some());

        let snapshot = Snapshot::capture(&state);
        assert_eq!(snapshot.blocks.len(), 7);
        assert_eq!(snapshot.destroyed, 1);

        let mut restored = SessionState::new(3, Rules::default());
        Snapshot::decode(&snapshot.encode()).unwrap().apply(&mut restored);
        assert_eq!(restored.grid.blocks().len(), 7);
        assert!(restored.grid.blocks().iter().all(|b| !b.is_destroyed()));
        // Level still needs all eight blocks destroyed
        assert_eq!(restored.grid.total(), 8);
        assert_eq!(restored.grid.destroyed_count(), 1);
    }

    #[test]
    fn test_rectangles_rederived_from_cells() {
        let mut state = SessionState::new(5, Rules::default());
        state.restart();
        let mut restored = SessionState::new(5, Rules::default());
        Snapshot::capture(&state).apply(&mut restored);
        for block in restored.grid.blocks() {
            assert_eq!(block.rect(), &Block::cell_rect(block.row, block.column));
        }
    }

    #[test]
    fn test_bad_header() {
        let bytes = Snapshot::capture(&played_state()).encode();

        let mut wrong_magic = bytes.clone();
        wrong_magic[0] = b'X';
        assert!(matches!(Snapshot::decode(&wrong_magic), Err(PersistError::BadMagic)));
        assert!(matches!(Snapshot::decode(b"BR"), Err(PersistError::BadMagic)));

        let mut wrong_version = bytes;
        wrong_version[5] = 9;
        assert!(matches!(
            Snapshot::decode(&wrong_version),
            Err(PersistError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_truncated_stream_fails() {
        let bytes = Snapshot::capture(&played_state()).encode();
        for cut in [6, 20, 80, bytes.len() - 1] {
            assert!(
                matches!(Snapshot::decode(&bytes[..cut]), Err(PersistError::Truncated(_))),
                "cut at {}",
                cut
            );
        }
    }

    #[test]
    fn test_invalid_block_data_fails() {
        let mut state = SessionState::new(2, Rules::default());
        state.restart();
        let mut snapshot = Snapshot::capture(&state);
        snapshot.blocks.truncate(1);
        let bytes = snapshot.encode();
        // Block type byte sits after the block count, row and column
        let tag_at = bytes.len() - 1 - 2 - snapshot.blocks[0].color.label().len();

        let mut bad_kind = bytes.clone();
        bad_kind[tag_at] = 7;
        assert!(matches!(
            Snapshot::decode(&bad_kind),
            Err(PersistError::InvalidBlockKind(7))
        ));

        let mut trailing = bytes;
        trailing.push(0);
        assert!(matches!(Snapshot::decode(&trailing), Err(PersistError::TrailingBytes(1))));
    }

    #[test]
    fn test_duplicate_block_rejected() {
        let mut state = SessionState::new(2, Rules::default());
        state.restart();
        let mut snapshot = Snapshot::capture(&state);
        let dup = snapshot.blocks[0].clone();
        snapshot.blocks.push(dup);
        assert!(matches!(
            Snapshot::decode(&snapshot.encode()),
            Err(PersistError::DuplicateBlock { row: 0, column: 0 })
        ));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut state = SessionState::new(2, Rules::default());
        state.restart();
        let valid = Snapshot::capture(&state);

        let mut zero_level = valid.clone();
        zero_level.level = 0;
        assert!(matches!(
            Snapshot::decode(&zero_level.encode()),
            Err(PersistError::InvalidValue { field: "level", .. })
        ));

        let mut destroyed = valid.clone();
        destroyed.destroyed = u32::MAX;
        assert!(matches!(
            Snapshot::decode(&destroyed.encode()),
            Err(PersistError::InvalidValue { field: "destroyed", .. })
        ));

        let mut row = valid.clone();
        row.blocks.truncate(1);
        row.blocks[0].row = 2;
        assert!(matches!(
            Snapshot::decode(&row.encode()),
            Err(PersistError::InvalidValue { field: "block_row", value: 2 })
        ));

        let mut column = valid;
        column.blocks.truncate(1);
        column.blocks[0].column = GRID_COLUMNS;
        assert!(matches!(
            Snapshot::decode(&column.encode()),
            Err(PersistError::InvalidValue { field: "block_column", .. })
        ));
    }

    #[test]
    fn test_finished_levels_fail_rules() {
        let mut state = SessionState::new(2, Rules::default());
        state.restart();
        assert!(Snapshot::capture(&state).check_rules(&state.rules).is_ok());

        for level in [FINAL_LEVEL, u32::MAX] {
            let mut snapshot = Snapshot::capture(&state);
            snapshot.level = level;
            let decoded = Snapshot::decode(&snapshot.encode()).unwrap();
            assert!(matches!(
                decoded.check_rules(&state.rules),
                Err(PersistError::InvalidValue { field: "level", value }) if value == u64::from(level)
            ));
        }
    }

    proptest! {
        #[test]
        fn prop_scalars_round_trip(
            level in 1u32..18,
            score in any::<u32>(),
            lives in 0u32..10,
            elapsed in any::<u64>(),
            since in any::<u64>(),
            ball_x in -50.0f64..550.0,
            ball_y in -50.0f64..750.0,
            vx in 0.0f64..10.0,
            bools in any::<[bool; 12]>(),
        ) {
            let snapshot = Snapshot {
                level,
                score,
                lives,
                destroyed: 0,
                ball_pos: DVec2::new(ball_x, ball_y),
                paddle_pos: DVec2::new(10.0, 640.0),
                paddle_center_x: 75.0,
                elapsed_ms: elapsed,
                invincible_since_ms: since,
                ball_vx: vx,
                heart_spawned: bools[0],
                invincible: bools[1],
                moving_down: bools[2],
                moving_right: bools[3],
                flags: CollisionFlags {
                    paddle: bools[4],
                    paddle_bounce_right: bools[5],
                    right_wall: bools[6],
                    left_wall: bools[7],
                    block_right: bools[8],
                    block_bottom: bools[9],
                    block_left: bools[10],
                    block_top: bools[11],
                },
                blocks: vec![SavedBlock {
                    row: 0,
                    column: 3,
                    kind: BlockKind::Star,
                    color: BlockColor::Tan,
                }],
            };
            prop_assert_eq!(Snapshot::decode(&snapshot.encode()).unwrap(), snapshot);
        }
    }
}
