use std::any::Any;

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Deferred destruction. Anything buried here is dropped only when the owning
/// thread calls [`Graveyard::collect`].
#[derive(Debug)]
pub struct Graveyard {
    tx: Sender<Box<dyn Any + Send>>,
    rx: Receiver<Box<dyn Any + Send>>,
}

impl Default for Graveyard {
    fn default() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }
}

impl Graveyard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bury<T: Any + Send>(&self, value: T) {
        // The receiver lives as long as self, so send cannot fail.
        let _ = self.tx.send(Box::new(value));
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Drop everything buried so far. Returns how many values were dropped.
    pub fn collect(&self) -> usize {
        let mut count = 0;
        while let Ok(value) = self.rx.try_recv() {
            drop(value);
            count += 1;
        }
        if count > 0 {
            tracing::trace!(count, "graveyard collected");
        }
        count
    }
}
