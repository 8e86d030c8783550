//! Shutdown coordination.

use std::future::Future;

use tokio::sync::broadcast;

/// Broadcasts a single shutdown notice to every subscribed task.
#[derive(Debug)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Trigger once `signal` resolves.
    pub async fn trigger_on<F: Future<Output = ()>>(&self, signal: F) {
        signal.await;
        self.trigger();
    }

    /// Tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger_on(async {}).await;
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }
}
