//! Per-frame motion vector data as delivered by the encoder.
//!
//! The encoder reports one vector per 16x16 macroblock. A frame's vectors are
//! consumed once by the classifier and then dropped.

use anyhow::{bail, Result};

use crate::config::Resolution;

/// Edge length of one motion-estimation block, in pixels.
pub const BLOCK_SIZE: u32 = 16;

/// Displacement estimate for one 16x16 tile between consecutive frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MotionVectorBlock {
    pub dx: i8,
    pub dy: i8,
}

impl MotionVectorBlock {
    pub const fn new(dx: i8, dy: i8) -> Self {
        Self { dx, dy }
    }

    /// Rounded Euclidean length, clamped to `0..=255`.
    pub fn magnitude(&self) -> u8 {
        let dx = f64::from(self.dx);
        let dy = f64::from(self.dy);
        (dx * dx + dy * dy).sqrt().round().clamp(0.0, 255.0) as u8
    }
}

/// Block tiling for a fixed resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGeometry {
    pub columns: u32,
    pub rows: u32,
}

impl FrameGeometry {
    pub fn for_resolution(resolution: Resolution) -> Self {
        Self {
            columns: resolution.width.div_ceil(BLOCK_SIZE),
            rows: resolution.height.div_ceil(BLOCK_SIZE),
        }
    }

    pub fn block_count(&self) -> usize {
        self.columns as usize * self.rows as usize
    }
}

/// Ordered motion vectors for a single encoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameMotionVectors {
    blocks: Vec<MotionVectorBlock>,
}

impl FrameMotionVectors {
    pub fn new(blocks: Vec<MotionVectorBlock>) -> Self {
        Self { blocks }
    }

    /// Build a frame, checking it against the session geometry.
    pub fn with_geometry(geometry: FrameGeometry, blocks: Vec<MotionVectorBlock>) -> Result<Self> {
        if blocks.len() != geometry.block_count() {
            bail!(
                "frame has {} motion blocks, expected {} ({}x{})",
                blocks.len(),
                geometry.block_count(),
                geometry.columns,
                geometry.rows
            );
        }
        Ok(Self { blocks })
    }

    /// A frame with no motion at all.
    pub fn still(geometry: FrameGeometry) -> Self {
        Self {
            blocks: vec![MotionVectorBlock::default(); geometry.block_count()],
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[MotionVectorBlock] {
        &self.blocks
    }
}
