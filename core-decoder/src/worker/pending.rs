//! Correlation ids and the table of requests awaiting a response.

use super::protocol::{Reply, Response};
use crate::error::{DecoderError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Monotonic request id source, private to one worker proxy.
#[derive(Debug, Default)]
pub struct CorrelationIds {
    next: AtomicU64,
}

impl CorrelationIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

type Continuation = oneshot::Sender<Result<Reply>>;

/// Outstanding requests keyed by correlation id.
///
/// Each entry is removed exactly once: when its response arrives, when the
/// request could not be sent, or when the table is cleared.
#[derive(Debug, Clone, Default)]
pub struct PendingTable {
    inner: Arc<Mutex<HashMap<u64, Continuation>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a continuation for `id` and return its receiving end.
    pub fn register(&self, id: u64) -> Result<oneshot::Receiver<Result<Reply>>> {
        let mut inner = self.inner.lock();
        if inner.contains_key(&id) {
            return Err(DecoderError::ProtocolViolation(format!(
                "request id {} is already pending",
                id
            )));
        }

        let (tx, rx) = oneshot::channel();
        inner.insert(id, tx);
        Ok(rx)
    }

    /// Complete the request a response belongs to.
    pub fn resolve(&self, response: Response) -> Result<()> {
        let continuation = self.inner.lock().remove(&response.id).ok_or_else(|| {
            DecoderError::ProtocolViolation(format!(
                "response for unknown request id {}",
                response.id
            ))
        })?;

        // The caller may have dropped its future; that is not an error
        let _ = continuation.send(response.result);
        Ok(())
    }

    /// Drop the entry for a request that never reached the worker.
    pub fn remove(&self, id: u64) -> bool {
        self.inner.lock().remove(&id).is_some()
    }

    /// Drop every outstanding continuation; their callers observe the
    /// worker as unavailable.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.len();
        inner.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_cross_32_bit_boundary() {
        let ids = CorrelationIds::starting_at(u32::MAX as u64);
        let a = ids.next_id();
        let b = ids.next_id();
        assert_eq!(a, u32::MAX as u64);
        assert_eq!(b, u32::MAX as u64 + 1);
        // A 32-bit counter would have wrapped here
        assert_eq!(b as u32, 0);
    }

    #[test]
    fn test_ids_start_at_zero() {
        let ids = CorrelationIds::new();
        assert_eq!(ids.next_id(), 0);
        assert_eq!(ids.next_id(), 1);
    }

    #[tokio::test]
    async fn test_resolve_completes_receiver() {
        let table = PendingTable::new();
        let rx = table.register(7).unwrap();
        assert_eq!(table.len(), 1);

        table
            .resolve(Response {
                id: 7,
                result: Ok(Reply::Done),
            })
            .unwrap();
        assert!(table.is_empty());
        assert!(matches!(rx.await.unwrap(), Ok(Reply::Done)));
    }

    #[test]
    fn test_unknown_and_duplicate_ids_are_violations() {
        let table = PendingTable::new();
        let _rx = table.register(1).unwrap();
        assert!(matches!(
            table.register(1),
            Err(DecoderError::ProtocolViolation(_))
        ));

        let unknown = Response {
            id: 2,
            result: Ok(Reply::Done),
        };
        assert!(matches!(
            table.resolve(unknown),
            Err(DecoderError::ProtocolViolation(_))
        ));

        // Second response for the same id
        table.resolve(Response { id: 1, result: Ok(Reply::Done) }).unwrap();
        assert!(table.resolve(Response { id: 1, result: Ok(Reply::Done) }).is_err());
    }

    #[tokio::test]
    async fn test_clear_drops_continuations() {
        let table = PendingTable::new();
        let rx = table.register(3).unwrap();
        assert_eq!(table.clear(), 1);
        assert!(rx.await.is_err());
    }
}
