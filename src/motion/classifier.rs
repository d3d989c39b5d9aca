use crate::motion::vectors::FrameMotionVectors;

/// Thresholds for deciding whether a frame contains motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// A block counts as changed when its magnitude is strictly above this.
    pub sensitivity: u32,
    /// Share of blocks, in percent, that must change.
    pub difference_percentage: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            sensitivity: 60,
            difference_percentage: 30,
        }
    }
}

impl ClassifierConfig {
    /// Number of changed blocks a frame must exceed, for a frame of `total_blocks`.
    pub fn threshold(&self, total_blocks: usize) -> usize {
        total_blocks * self.difference_percentage as usize / 100
    }
}

/// Outcome of evaluating one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionReport {
    pub total_blocks: usize,
    pub blocks_changed: usize,
    pub threshold: usize,
}

impl MotionReport {
    pub fn motion_detected(&self) -> bool {
        self.blocks_changed > self.threshold
    }
}

/// Two-threshold motion classifier over encoder motion vectors.
#[derive(Clone, Copy, Debug, Default)]
pub struct MotionClassifier {
    config: ClassifierConfig,
}

impl MotionClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Count changed blocks without logging anything.
    pub fn evaluate(&self, frame: &FrameMotionVectors) -> MotionReport {
        let blocks_changed = frame
            .blocks()
            .iter()
            .filter(|block| u32::from(block.magnitude()) > self.config.sensitivity)
            .count();
        MotionReport {
            total_blocks: frame.len(),
            blocks_changed,
            threshold: self.config.threshold(frame.len()),
        }
    }

    /// Returns true when the frame qualifies as motion. Logs the block count on true.
    pub fn classify(&self, frame: &FrameMotionVectors) -> bool {
        let report = self.evaluate(frame);
        if report.motion_detected() {
            log::info!("motion detected ({} blocks)", report.blocks_changed);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Resolution;
    use crate::motion::vectors::{FrameGeometry, MotionVectorBlock};

    fn frame_with_moving_blocks(geometry: FrameGeometry, moving: usize, block: MotionVectorBlock) -> FrameMotionVectors {
        let mut blocks = vec![MotionVectorBlock::default(); geometry.block_count()];
        for slot in blocks.iter_mut().take(moving) {
            *slot = block;
        }
        FrameMotionVectors::with_geometry(geometry, blocks).unwrap()
    }

    #[test]
    fn threshold_truncates() {
        let config = ClassifierConfig {
            sensitivity: 60,
            difference_percentage: 30,
        };
        assert_eq!(config.threshold(1900), 570);
        assert_eq!(config.threshold(10), 3);
        assert_eq!(config.threshold(7), 2);
    }

    #[test]
    fn boundary_at_800x600() {
        let geometry = FrameGeometry::for_resolution(Resolution::new(800, 600));
        let classifier = MotionClassifier::new(ClassifierConfig {
            sensitivity: 60,
            difference_percentage: 30,
        });
        let fast = MotionVectorBlock::new(50, 50);

        let at_threshold = frame_with_moving_blocks(geometry, 570, fast);
        let report = classifier.evaluate(&at_threshold);
        assert_eq!(report.threshold, 570);
        assert_eq!(report.blocks_changed, 570);
        assert!(!classifier.classify(&at_threshold));

        let above = frame_with_moving_blocks(geometry, 571, fast);
        assert!(classifier.classify(&above));
    }

    #[test]
    fn block_at_sensitivity_does_not_count() {
        let geometry = FrameGeometry { columns: 2, rows: 2 };
        let classifier = MotionClassifier::new(ClassifierConfig {
            sensitivity: 5,
            difference_percentage: 0,
        });

        let exact = frame_with_moving_blocks(geometry, 4, MotionVectorBlock::new(3, 4));
        assert_eq!(classifier.evaluate(&exact).blocks_changed, 0);
        assert!(!classifier.classify(&exact));

        let above = frame_with_moving_blocks(geometry, 1, MotionVectorBlock::new(6, 0));
        assert_eq!(classifier.evaluate(&above).blocks_changed, 1);
        assert!(classifier.classify(&above));
    }

    #[test]
    fn full_percentage_can_never_trigger() {
        let geometry = FrameGeometry { columns: 4, rows: 4 };
        let classifier = MotionClassifier::new(ClassifierConfig {
            sensitivity: 0,
            difference_percentage: 100,
        });
        let all_moving = frame_with_moving_blocks(geometry, 16, MotionVectorBlock::new(100, 100));
        assert!(!classifier.classify(&all_moving));
    }

    #[test]
    fn evaluate_is_deterministic() {
        let geometry = FrameGeometry { columns: 8, rows: 8 };
        let classifier = MotionClassifier::default();
        let frame = frame_with_moving_blocks(geometry, 30, MotionVectorBlock::new(-70, 10));
        assert_eq!(classifier.evaluate(&frame), classifier.evaluate(&frame));
        assert_eq!(classifier.classify(&frame), classifier.classify(&frame));
    }

    #[test]
    fn empty_frame_is_not_motion() {
        let classifier = MotionClassifier::default();
        assert!(!classifier.classify(&FrameMotionVectors::new(Vec::new())));
    }
}
