use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use thiserror::Error;

const RESET_TIMEOUT: Duration = Duration::from_millis(100);

/// Counter numbering synthesized lambda classes within one run.
///
/// Clones share the counter. A reifier draws numbers with [`next`], the
/// backporter puts the counter back to its origin once per run.
///
/// [`next`]: NameSequence::next
#[derive(Debug, Clone, Default)]
pub struct NameSequence {
    counter: Arc<Mutex<u32>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequenceResetError {
    #[error("name sequence is held by another user")]
    Busy,
}

impl NameSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next number, starting at 1 after a reset.
    pub fn next(&self) -> u32 {
        let mut counter = self.counter.lock();
        *counter += 1;
        *counter
    }

    /// Last number handed out, 0 if none since the last reset.
    pub fn current(&self) -> u32 {
        *self.counter.lock()
    }

    pub fn reset(&self) -> Result<(), SequenceResetError> {
        let mut counter = self
            .counter
            .try_lock_for(RESET_TIMEOUT)
            .ok_or(SequenceResetError::Busy)?;
        *counter = 0;
        Ok(())
    }

    /// Whether both handles share one counter.
    pub fn same_counter(&self, other: &NameSequence) -> bool {
        Arc::ptr_eq(&self.counter, &other.counter)
    }

    #[cfg(test)]
    pub(crate) fn hold(&self) -> parking_lot::MutexGuard<'_, u32> {
        self.counter.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_counter() {
        let sequence = NameSequence::new();
        let shared = sequence.clone();
        assert_eq!(sequence.next(), 1);
        assert_eq!(shared.next(), 2);
        assert_eq!(sequence.current(), 2);
        assert!(sequence.same_counter(&shared));
        assert!(!sequence.same_counter(&NameSequence::new()));
    }

    #[test]
    fn reset_restarts_numbering() {
        let sequence = NameSequence::new();
        sequence.next();
        sequence.next();
        sequence.reset().unwrap();
        assert_eq!(sequence.next(), 1);
    }

    #[test]
    fn reset_fails_while_held() {
        let sequence = NameSequence::new();
        sequence.next();
        let guard = sequence.hold();
        assert_eq!(sequence.reset(), Err(SequenceResetError::Busy));
        drop(guard);
        assert_eq!(sequence.current(), 1);
    }
}
