//! Block grid: generation, hit testing and rebuild from snapshots

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::collision::{HitSide, Rect, ball_rect_collision};
use crate::consts::*;
use glam::DVec2;

/// Block types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlockKind {
    #[default]
    Normal,
    /// Drops a falling bonus when destroyed
    Chocolate,
    /// Grants temporary invincibility
    Star,
    /// Grants an extra life
    Heart,
}

impl BlockKind {
    /// Wire tag used by session snapshots
    pub fn to_tag(self) -> u8 {
        match self {
            BlockKind::Normal => 0,
            BlockKind::Chocolate => 1,
            BlockKind::Star => 2,
            BlockKind::Heart => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(BlockKind::Normal),
            1 => Some(BlockKind::Chocolate),
            2 => Some(BlockKind::Star),
            3 => Some(BlockKind::Heart),
            _ => None,
        }
    }
}

/// Block palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockColor {
    Magenta,
    Red,
    Gold,
    Coral,
    Aqua,
    Violet,
    GreenYellow,
    Orange,
    Pink,
    SlateGrey,
    Yellow,
    Tomato,
    Tan,
}

impl BlockColor {
    pub const PALETTE: [BlockColor; 13] = [
        BlockColor::Magenta,
        BlockColor::Red,
        BlockColor::Gold,
        BlockColor::Coral,
        BlockColor::Aqua,
        BlockColor::Violet,
        BlockColor::GreenYellow,
        BlockColor::Orange,
        BlockColor::Pink,
        BlockColor::SlateGrey,
        BlockColor::Yellow,
        BlockColor::Tomato,
        BlockColor::Tan,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BlockColor::Magenta => "magenta",
            BlockColor::Red => "red",
            BlockColor::Gold => "gold",
            BlockColor::Coral => "coral",
            BlockColor::Aqua => "aqua",
            BlockColor::Violet => "violet",
            BlockColor::GreenYellow => "greenyellow",
            BlockColor::Orange => "orange",
            BlockColor::Pink => "pink",
            BlockColor::SlateGrey => "slategrey",
            BlockColor::Yellow => "yellow",
            BlockColor::Tomato => "tomato",
            BlockColor::Tan => "tan",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        let s = s.to_lowercase();
        Self::PALETTE.iter().copied().find(|c| c.label() == s)
    }
}

/// A destructible grid cell
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub row: u32,
    pub column: u32,
    pub kind: BlockKind,
    pub color: BlockColor,
    rect: Rect,
    destroyed: bool,
}

impl Block {
    pub fn new(row: u32, column: u32, kind: BlockKind, color: BlockColor) -> Self {
        Self {
            row,
            column,
            kind,
            color,
            rect: Self::cell_rect(row, column),
            destroyed: false,
        }
    }

    /// Screen rectangle of a grid cell
    pub fn cell_rect(row: u32, column: u32) -> Rect {
        Rect::new(
            f64::from(column) * BLOCK_WIDTH + BLOCK_PADDING_LEFT,
            f64::from(row) * BLOCK_HEIGHT + BLOCK_PADDING_TOP,
            BLOCK_WIDTH,
            BLOCK_HEIGHT,
        )
    }

    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Which side of this block the ball is touching, if any
    pub fn check_hit(&self, ball_pos: DVec2, ball_radius: f64) -> Option<HitSide> {
        if self.destroyed {
            return None;
        }
        ball_rect_collision(ball_pos, ball_radius, &self.rect)
    }

    /// Mark destroyed. Returns false if it already was.
    fn destroy(&mut self) -> bool {
        !std::mem::replace(&mut self.destroyed, true)
    }
}

/// A block destroyed during a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockHit {
    pub row: u32,
    pub column: u32,
    pub kind: BlockKind,
    pub side: HitSide,
    pub pos: DVec2,
}

/// All blocks of the current level, in creation order
#[derive(Debug, Clone, Default)]
pub struct BlockGrid {
    blocks: Vec<Block>,
    /// Blocks that must be destroyed to clear the level
    total: u32,
    destroyed: u32,
}

impl BlockGrid {
    /// Generate the grid for a level: 4 columns × (level + 1) rows
    ///
    /// Only the first heart roll in a level becomes a Heart block;
    /// `heart_spawned` carries that across the whole generation.
    pub fn generate<R: Rng>(level: u32, rng: &mut R, heart_spawned: &mut bool) -> Self {
        let rows = level + 1;
        let mut blocks = Vec::with_capacity((GRID_COLUMNS * rows) as usize);

        for column in 0..GRID_COLUMNS {
            for row in 0..rows {
                let roll: u32 = rng.random_range(0..500);
                let kind = kind_for_roll(roll, heart_spawned);
                let color = BlockColor::PALETTE[roll as usize % BlockColor::PALETTE.len()];
                blocks.push(Block::new(row, column, kind, color));
            }
        }

        log::debug!("Level {} grid: {} blocks", level, blocks.len());
        Self::from_blocks(blocks, 0)
    }

    /// Rebuild a grid from surviving blocks
    ///
    /// `already_destroyed` blocks of the level are gone but still count
    /// toward the completion total.
    pub fn from_blocks(blocks: Vec<Block>, already_destroyed: u32) -> Self {
        let survivors = blocks.iter().filter(|b| !b.destroyed).count() as u32;
        Self {
            total: survivors.saturating_add(already_destroyed),
            destroyed: already_destroyed,
            blocks,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn destroyed_count(&self) -> u32 {
        self.destroyed
    }

    pub fn is_cleared(&self) -> bool {
        self.destroyed == self.total
    }

    pub fn survivors(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| !b.destroyed)
    }

    /// Vertical band occupied by rows of a level
    pub fn band_contains(level: u32, y: f64) -> bool {
        y >= BLOCK_PADDING_TOP && y <= BLOCK_HEIGHT * (f64::from(level) + 1.0) + BLOCK_PADDING_TOP
    }

    /// Test the ball against every block and destroy the first one hit
    pub fn strike(&mut self, ball_pos: DVec2, ball_radius: f64) -> Option<BlockHit> {
        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.check_hit(ball_pos, ball_radius).is_some())?;
        let side = block.check_hit(ball_pos, ball_radius)?;

        if block.destroy() {
            self.destroyed += 1;
        }
        Some(BlockHit {
            row: block.row,
            column: block.column,
            kind: block.kind,
            side,
            pos: DVec2::new(block.rect.x, block.rect.y),
        })
    }
}

fn kind_for_roll(roll: u32, heart_spawned: &mut bool) -> BlockKind {
    match roll % 10 {
        1 => BlockKind::Chocolate,
        2 if !*heart_spawned => {
            *heart_spawned = true;
            BlockKind::Heart
        }
        3 => BlockKind::Star,
        _ => BlockKind::Normal,
    }
}
