use std::sync::atomic::{AtomicU8, Ordering};

/// Receives integer percentages while a run consumes its input.
///
/// Called from the producer thread; values are non-decreasing within a run.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, percent: u8);
}

impl<F> ProgressObserver for F
where
    F: Fn(u8) + Send + Sync,
{
    fn on_progress(&self, percent: u8) {
        self(percent)
    }
}

/// Ceiling percentage of `consumed` over `total`, capped at 100.
///
/// An empty input reports 0 until the run finishes.
pub fn percent_of(consumed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }

    let consumed = consumed.min(total) as u128;
    let percent = (consumed * 100).div_ceil(total as u128);
    percent.min(100) as u8
}

/// Monotonic progress tracker for a single run.
#[derive(Debug, Default)]
pub struct Progress {
    percent: AtomicU8,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> u8 {
        self.percent.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.percent.store(0, Ordering::Release);
    }

    /// Recomputes progress and notifies `observer` if the value increased.
    pub fn update(&self, consumed: u64, total: u64, observer: Option<&dyn ProgressObserver>) {
        self.advance_to(percent_of(consumed, total), observer);
    }

    /// Forces progress to 100.
    pub fn finish(&self, observer: Option<&dyn ProgressObserver>) {
        self.advance_to(100, observer);
    }

    fn advance_to(&self, percent: u8, observer: Option<&dyn ProgressObserver>) {
        let previous = self.percent.fetch_max(percent, Ordering::AcqRel);
        if percent > previous {
            if let Some(observer) = observer {
                observer.on_progress(percent);
            }
        }
    }
}
