//! Clearable display queue
//!
//! A tiny bounded queue for live display. Display consumers only want the
//! freshest item, so writes may clear the queue first and a full queue drops
//! its oldest entry instead of blocking the producer.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Capacity used for pose display
pub const DISPLAY_QUEUE_CAPACITY: usize = 2;

/// Bounded, overwrite-on-full queue
#[derive(Debug)]
pub struct DisplayQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Clone for DisplayQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for DisplayQueue<T> {
    fn default() -> Self {
        Self::new(DISPLAY_QUEUE_CAPACITY)
    }
}

impl<T> DisplayQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// Push an item, optionally clearing older items first; never blocks
    pub fn write(&self, item: T, clear: bool) {
        if clear {
            self.clear();
        }
        let mut item = item;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    // Drop oldest
                    let _ = self.rx.try_recv();
                    item = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Pop an item; with `clear`, return the newest and discard the rest
    pub fn read(&self, clear: bool) -> Option<T> {
        if clear {
            let mut latest = None;
            while let Ok(item) = self.rx.try_recv() {
                latest = Some(item);
            }
            latest
        } else {
            self.rx.try_recv().ok()
        }
    }

    /// Discard all queued items
    pub fn clear(&self) {
        while self.rx.try_recv().is_ok() {}
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
