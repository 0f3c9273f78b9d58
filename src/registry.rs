use std::os::unix::io::RawFd;

use dashmap::DashMap;

use crate::pipe::ResultPipe;

/// Concurrent fd → result-pipe map shared between probing callers and the
/// poller loop.
///
/// For any registered fd there is exactly one pipe at a time: a probe owns
/// its fd for the whole call, registers before handing the fd to the poller
/// and deregisters before closing it.
pub(crate) struct ResultPipes {
    map: DashMap<RawFd, ResultPipe>,
}

impl ResultPipes {
    pub(crate) fn new() -> Self {
        ResultPipes {
            map: DashMap::new(),
        }
    }

    pub(crate) fn register(&self, fd: RawFd, pipe: ResultPipe) {
        self.map.insert(fd, pipe);
    }

    /// Atomically removes and returns the pipe for `fd`. The poller calls
    /// this on readiness; `None` means the probe already gave up.
    pub(crate) fn pop(&self, fd: RawFd) -> Option<ResultPipe> {
        self.map.remove(&fd).map(|(_, pipe)| pipe)
    }

    /// Removes the entry for `fd` if present. Idempotent.
    pub(crate) fn deregister(&self, fd: RawFd) {
        self.map.remove(&fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::PipePool;

    #[test]
    fn pop_yields_registered_pipe_exactly_once() {
        let pipes = ResultPipes::new();
        let pool = PipePool::new();

        pipes.register(7, pool.get());
        assert!(pipes.pop(7).is_some());
        assert!(pipes.pop(7).is_none());
    }

    #[test]
    fn deregister_is_idempotent() {
        let pipes = ResultPipes::new();
        let pool = PipePool::new();

        pipes.register(3, pool.get());
        pipes.deregister(3);
        pipes.deregister(3);
        assert!(pipes.pop(3).is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_register_and_pop() {
        use std::sync::Arc;

        let pipes = Arc::new(ResultPipes::new());
        let mut handles = Vec::new();
        for fd in 0..64 {
            let pipes = pipes.clone();
            handles.push(tokio::spawn(async move {
                let pool = PipePool::new();
                pipes.register(fd, pool.get());
                assert!(pipes.pop(fd).is_some());
                pipes.deregister(fd);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }
}
