use crate::services::session::SessionStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Evicts sessions nobody has touched for `ttl`, releasing their videos.
pub struct SessionSweeper {
    sessions: Arc<SessionStore>,
    ttl: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl SessionSweeper {
    pub fn new(sessions: Arc<SessionStore>, ttl: Duration, shutdown: watch::Receiver<bool>) -> Self {
        // Sweep a few times per TTL, but not more than once a second
        let interval = (ttl / 4).max(Duration::from_secs(1));
        Self {
            sessions,
            ttl,
            interval,
            shutdown,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn run(mut self) {
        tracing::info!("🚀 Session sweeper started (ttl {:?})", self.ttl);

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Session sweeper shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep();
                }
            }
        }
    }

    fn sweep(&self) {
        let removed = self.sessions.sweep_expired(self.ttl);
        if removed > 0 {
            tracing::info!(
                "🧹 Evicted {} idle session(s), {} remaining",
                removed,
                self.sessions.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sweeper_evicts_and_stops_on_shutdown() {
        let sessions = Arc::new(SessionStore::new());
        let (id, _) = sessions.create();
        let (tx, rx) = watch::channel(false);

        let sweeper = SessionSweeper::new(sessions.clone(), Duration::ZERO, rx)
            .with_interval(Duration::from_millis(10));
        let handle = tokio::spawn(sweeper.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sessions.get(&id).is_err());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
