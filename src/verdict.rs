use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use watch::{WatchReceiver, WatchSender};

/// Creates the single-writer verdict cell, initially healthy.
pub fn channel() -> (VerdictPublisher, VerdictReader) {
    let current = Arc::new(AtomicBool::new(false));
    let (sender, receiver) = watch::channel(false);
    (
        VerdictPublisher {
            current: current.clone(),
            sender,
        },
        VerdictReader { current, receiver },
    )
}

/// Write side, owned by the detector.
pub struct VerdictPublisher {
    current: Arc<AtomicBool>,
    sender: WatchSender<bool>,
}

impl VerdictPublisher {
    /// Stores the verdict; subscribers are only woken on a change.
    pub fn publish(&self, degraded: bool) {
        if self.current.swap(degraded, Ordering::SeqCst) != degraded {
            self.sender.send(degraded);
        }
    }

    pub fn get(&self) -> bool {
        self.current.load(Ordering::SeqCst)
    }
}

/// Read side, shared by any number of consumers.
#[derive(Clone)]
pub struct VerdictReader {
    current: Arc<AtomicBool>,
    receiver: WatchReceiver<bool>,
}

impl VerdictReader {
    pub fn is_degraded(&self) -> bool {
        self.current.load(Ordering::SeqCst)
    }

    /// A receiver woken on every verdict transition made after this call.
    pub fn subscribe(&self) -> WatchReceiver<bool> {
        let mut receiver = self.receiver.clone();
        // Past transitions are not news to a new subscriber.
        receiver.get();
        receiver
    }
}
