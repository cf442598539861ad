/// Tracks host visibility. Sampling and long-task reports only count
/// while the host is visible.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityGate {
    visible: bool,
}

impl VisibilityGate {
    pub fn new(visible: bool) -> Self {
        Self { visible }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Returns `true` when visibility actually changed; the caller then
    /// discards everything sampled so far.
    pub fn update(&mut self, visible: bool) -> bool {
        let changed = self.visible != visible;
        self.visible = visible;
        changed
    }
}
