use std::sync::atomic::{AtomicBool, Ordering};

/// "Motion seen since last consumed" slot shared by the encoder callback and
/// the recording session.
///
/// Producers only ever [`raise`](Self::raise) it. The consumer reads and clears
/// it in one atomic swap via [`take`](Self::take), so a raise racing with a
/// take is either observed by that take or left set for the next one.
#[derive(Debug, Default)]
pub struct MotionFlag {
    raised: AtomicBool,
}

impl MotionFlag {
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Read and reset.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    /// Read without consuming. Diagnostics only.
    pub fn peek(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn take_consumes_exactly_once() {
        let flag = MotionFlag::new();
        assert!(!flag.take());
        flag.raise();
        flag.raise();
        assert!(flag.peek());
        assert!(flag.take());
        assert!(!flag.take());
        assert!(!flag.peek());
    }

    #[test]
    fn concurrent_raises_are_never_lost() {
        const ROUNDS: usize = 10_000;
        let flag = Arc::new(MotionFlag::new());
        let raised = Arc::new(std::sync::Barrier::new(2));
        let consumed = Arc::new(std::sync::Barrier::new(2));

        let producer = {
            let flag = Arc::clone(&flag);
            let raised = Arc::clone(&raised);
            let consumed = Arc::clone(&consumed);
            std::thread::spawn(move || {
                for _ in 0..ROUNDS {
                    flag.raise();
                    raised.wait();
                    consumed.wait();
                }
            })
        };

        let mut observed = 0;
        for _ in 0..ROUNDS {
            raised.wait();
            if flag.take() {
                observed += 1;
            }
            consumed.wait();
        }
        producer.join().unwrap();

        assert_eq!(observed, ROUNDS);
        assert!(!flag.take());
    }
}
