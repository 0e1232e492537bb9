// Cooperative cancellation handle.
//
// A Cancel is a shared flag plus an optional deadline. Store reads and loop
// bodies check it between statements and between items; a set flag or an
// expired deadline surfaces as MediarrError::Cancelled and any open
// transaction is rolled back by the caller's error path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{MediarrError, Result};

#[derive(Clone)]
pub struct Cancel {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancel {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// A handle that also trips once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: std::time::Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Derive a child sharing this handle's flag but with its own deadline.
    pub fn child_with_timeout(&self, timeout: std::time::Duration) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        match self.deadline {
            Some(d) => Instant::now() >= d,
            None => false,
        }
    }

    /// Err(Cancelled) once the flag is set or the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(MediarrError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Default for Cancel {
    fn default() -> Self {
        Self::new()
    }
}
