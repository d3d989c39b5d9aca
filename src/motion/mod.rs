//! Motion classification from encoder motion vectors.
//!
//! - `vectors`: per-frame block data and the block tiling for a resolution
//! - `classifier`: two-threshold decision over a single frame
//! - `flag`: the single shared slot between producer and consumer
//!
//! [`MotionAnalyser`] is what the encoder calls once per frame. It runs on the
//! encoder's delivery thread and never blocks.

mod classifier;
mod flag;
mod vectors;

use std::sync::Arc;

pub use classifier::{ClassifierConfig, MotionClassifier, MotionReport};
pub use flag::MotionFlag;
pub use vectors::{FrameGeometry, FrameMotionVectors, MotionVectorBlock, BLOCK_SIZE};

/// Producer side: classifies frames and raises the shared flag.
#[derive(Clone, Debug)]
pub struct MotionAnalyser {
    classifier: MotionClassifier,
    flag: Arc<MotionFlag>,
}

impl MotionAnalyser {
    pub fn new(classifier: MotionClassifier, flag: Arc<MotionFlag>) -> Self {
        Self { classifier, flag }
    }

    /// Handle one frame. Returns whether it counted as motion.
    pub fn analyse(&self, frame: &FrameMotionVectors) -> bool {
        let motion = self.classifier.classify(frame);
        if motion {
            self.flag.raise();
        }
        motion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyser_raises_flag_only_on_motion() {
        let flag = Arc::new(MotionFlag::new());
        let analyser = MotionAnalyser::new(
            MotionClassifier::new(ClassifierConfig {
                sensitivity: 10,
                difference_percentage: 50,
            }),
            Arc::clone(&flag),
        );
        let geometry = FrameGeometry { columns: 2, rows: 2 };

        assert!(!analyser.analyse(&FrameMotionVectors::still(geometry)));
        assert!(!flag.take());

        let busy = FrameMotionVectors::with_geometry(
            geometry,
            vec![
                MotionVectorBlock::new(20, 0),
                MotionVectorBlock::new(0, 20),
                MotionVectorBlock::new(-20, 0),
                MotionVectorBlock::default(),
            ],
        )
        .unwrap();
        assert!(analyser.analyse(&busy));
        assert!(flag.take());
        assert!(!flag.take());
    }
}
