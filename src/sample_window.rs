/// Frame-rate readings accumulated since the last check boundary
/// or the last visibility change, whichever is more recent.
#[derive(Debug, Default)]
pub struct SampleWindow {
    samples: Vec<f64>,
}

impl SampleWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, fps: f64) {
        self.samples.push(fps);
    }

    /// Arithmetic mean, `None` when no frame was sampled.
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Mean of the window, leaving it empty for the next interval.
    pub fn drain_mean(&mut self) -> Option<f64> {
        let mean = self.mean();
        self.samples.clear();
        mean
    }
}
