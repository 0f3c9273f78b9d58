use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::error::CheckError;

/// What the poller reports back for one probe: handshake done, or a typed
/// failure.
pub(crate) type ProbeOutcome = Result<(), CheckError>;

/// Reusable single-slot result channel.
///
/// One clone sits in the registry for the poller loop to deliver into; the
/// probing caller keeps the other and awaits it. Delivery is synchronous so
/// the loop never suspends on a slow consumer; a probe that has already
/// timed out just leaves the value to be drained when the pipe returns to
/// the pool.
#[derive(Clone)]
pub(crate) struct ResultPipe {
    inner: Arc<Slot>,
}

struct Slot {
    value: Mutex<Option<ProbeOutcome>>,
    notify: Notify,
}

impl ResultPipe {
    fn new() -> Self {
        ResultPipe {
            inner: Arc::new(Slot {
                value: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Stores the outcome and wakes the waiting caller, if any.
    pub(crate) fn deliver(&self, outcome: ProbeOutcome) {
        *self.inner.value.lock().unwrap() = Some(outcome);
        self.inner.notify.notify_one();
    }

    /// Waits for an outcome. Cancel-safe: dropping the future between
    /// wakeups leaves any delivered value in the slot.
    pub(crate) async fn recv(&self) -> ProbeOutcome {
        loop {
            if let Some(outcome) = self.inner.value.lock().unwrap().take() {
                return outcome;
            }
            self.inner.notify.notified().await;
        }
    }

    /// Discards any undelivered value.
    pub(crate) fn drain(&self) {
        self.inner.value.lock().unwrap().take();
    }
}

/// Free-list of result pipes, one drawn per probe.
///
/// Pipes are drained both on `put` and on `get`, so a `get` always yields an
/// empty slot even when the poller delivered into a pipe after its probe
/// already gave up. Callers must not assume identity across gets.
pub(crate) struct PipePool {
    free: Mutex<Vec<ResultPipe>>,
}

impl PipePool {
    pub(crate) fn new() -> Self {
        PipePool {
            free: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn get(&self) -> ResultPipe {
        let pipe = self
            .free
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(ResultPipe::new);
        pipe.drain();
        pipe
    }

    pub(crate) fn put(&self, pipe: ResultPipe) {
        pipe.drain();
        self.free.lock().unwrap().push(pipe);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn delivers_once() {
        let pipe = ResultPipe::new();
        pipe.deliver(Ok(()));
        assert_eq!(pipe.recv().await, Ok(()));
        // The slot is single-use until the next delivery.
        assert!(pipe.inner.value.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn wakes_a_waiting_receiver() {
        let pipe = ResultPipe::new();
        let producer = pipe.clone();
        let handle = tokio::spawn(async move { pipe.recv().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        producer.deliver(Err(CheckError::Timeout));
        assert_eq!(handle.await.unwrap(), Err(CheckError::Timeout));
    }

    #[test]
    fn pool_get_is_always_empty() {
        let pool = PipePool::new();
        let pipe = pool.get();
        let producer = pipe.clone();
        pool.put(pipe);
        // Late delivery into a pipe that already went back to the pool.
        producer.deliver(Ok(()));
        let reused = pool.get();
        assert!(reused.inner.value.lock().unwrap().is_none());
    }

    #[test]
    fn put_drains_residual_value() {
        let pool = PipePool::new();
        let pipe = pool.get();
        pipe.deliver(Err(CheckError::Timeout));
        pool.put(pipe);
        let reused = pool.get();
        assert!(reused.inner.value.lock().unwrap().is_none());
    }
}
