use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// The per-question timeout. At most one timer is armed per session at any
/// instant: arming aborts the previous handle, and dropping the timer (the
/// session was replaced, stopped or finished) disarms it too.
#[derive(Debug, Default)]
pub struct QuestionTimer {
    handle: Option<JoinHandle<()>>,
}

impl QuestionTimer {
    pub fn arm<F>(&mut self, delay: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.disarm();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire.await;
        }));
    }

    /// Idempotent; disarming a fired or never-armed timer does nothing.
    pub fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Drops the handle without cancelling the task. For the timer's own
    /// firing path, which would otherwise abort itself mid-run.
    pub fn forget(&mut self) {
        self.handle.take();
    }
}

impl Drop for QuestionTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
