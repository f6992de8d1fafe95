// Worker Shutdown Token

use crate::domain::ShutdownPolicy;
use tokio::sync::watch;

/// Shutdown signal for cooperative termination, carrying the policy to apply
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<Option<ShutdownPolicy>>,
}

impl ShutdownToken {
    /// Policy of a pending shutdown, if one was requested
    pub fn requested(&self) -> Option<ShutdownPolicy> {
        *self.rx.borrow()
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.requested().is_some()
    }

    /// Wait for shutdown signal.
    ///
    /// A dropped sender counts as a drain request.
    pub async fn wait(&mut self) -> ShutdownPolicy {
        match self.rx.wait_for(Option::is_some).await {
            Ok(policy) => (*policy).unwrap_or_default(),
            Err(_) => ShutdownPolicy::Drain,
        }
    }

    /// Resolve only when an `Abort` shutdown is requested
    pub async fn aborted(&mut self) {
        // The borrowed value must not live across the pending await
        let closed = self
            .rx
            .wait_for(|p| *p == Some(ShutdownPolicy::Abort))
            .await
            .is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<Option<ShutdownPolicy>>,
}

impl ShutdownSender {
    /// Signal shutdown to all workers. The first request wins.
    pub fn shutdown(&self, policy: ShutdownPolicy) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(policy);
            true
        })
    }

    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(None);
    (ShutdownSender { tx }, ShutdownToken { rx })
}
