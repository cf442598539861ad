use std::time::Duration;

/// Filters batches of long-task reports against the configured threshold.
#[derive(Debug, Clone, Copy)]
pub struct LongTaskObserver {
    threshold_ms: f64,
}

impl LongTaskObserver {
    pub fn new(threshold_ms: f64) -> Self {
        Self { threshold_ms }
    }

    pub fn exceeds(&self, duration: Duration) -> bool {
        duration.as_secs_f64() * 1000.0 > self.threshold_ms
    }

    /// Tasks in the batch strictly longer than the threshold.
    pub fn over_threshold<'a>(
        &'a self,
        batch: &'a [Duration],
    ) -> impl Iterator<Item = Duration> + 'a {
        batch.iter().copied().filter(|d| self.exceeds(*d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_exclusive() {
        let observer = LongTaskObserver::new(50.0);
        assert!(!observer.exceeds(Duration::from_millis(50)));
        assert!(observer.exceeds(Duration::from_micros(50_001)));
    }

    #[test]
    fn filters_batch() {
        let observer = LongTaskObserver::new(50.0);
        let batch = [
            Duration::from_millis(51),
            Duration::from_millis(20),
            Duration::from_millis(80),
        ];
        let over: Vec<_> = observer.over_threshold(&batch).collect();
        assert_eq!(over, vec![Duration::from_millis(51), Duration::from_millis(80)]);
    }
}
