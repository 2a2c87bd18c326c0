//! Owned background tasks
//!
//! Sync loops, notifiers and the reset timer each run under a [`TaskHandle`].
//! Dropping the handle cancels the task; remounting a component therefore
//! never leaves a second handler behind.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct TaskHandle {
    name: &'static str,
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    /// Spawn `body` with a fresh cancellation token
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let join = tokio::spawn(body(token.clone()));
        debug!("Started {} task", name);
        Self {
            name,
            token,
            join: Some(join),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                debug!("{} task ended abnormally: {}", self.name, e);
            }
        }
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        if !self.token.is_cancelled() {
            debug!("Stopping {} task", self.name);
            self.token.cancel();
        }
    }
}
