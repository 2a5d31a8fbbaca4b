use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Keeps the response of the most recently *issued* request.
///
/// Requests take a sequence number when they are sent; a response is applied
/// only if no later request's response has been applied already. A slow
/// response that arrives after a newer one is dropped.
pub struct LatestResponse<T> {
    next_seq: AtomicU64,
    applied: Mutex<Applied<T>>,
}

struct Applied<T> {
    seq: u64,
    value: Option<T>,
}

impl<T: Clone> LatestResponse<T> {
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(1),
            applied: Mutex::new(Applied {
                seq: 0,
                value: None,
            }),
        }
    }

    /// Sequence number for a request about to be sent.
    pub fn issue(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Applies `value` if `seq` is newer than the last applied response.
    pub async fn offer(&self, seq: u64, value: T) -> bool {
        let mut applied = self.applied.lock().await;
        if seq <= applied.seq {
            return false;
        }
        applied.seq = seq;
        applied.value = Some(value);
        true
    }

    pub async fn current(&self) -> Option<(u64, T)> {
        let applied = self.applied.lock().await;
        applied.value.clone().map(|value| (applied.seq, value))
    }
}

impl<T: Clone> Default for LatestResponse<T> {
    fn default() -> Self {
        Self::new()
    }
}
