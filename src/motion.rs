use std::time::Duration;

use web_time::Instant;

/// Presentation-only rotation state. Not part of the synced game truth: the
/// board already holds the post-rotation marbles while this is active, it only
/// tells callers to hold input back until the animation has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Motion {
    settle: Duration,
    rotating_until: Option<Instant>,
}

impl Motion {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            rotating_until: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.rotating_until = Some(now + self.settle);
    }

    pub fn is_rotating(&self, now: Instant) -> bool {
        self.rotating_until.is_some_and(|until| now < until)
    }

    pub fn clear(&mut self) {
        self.rotating_until = None;
    }
}
