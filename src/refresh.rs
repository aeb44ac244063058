//! Background data refresh system
//!
//! Provides periodic refresh ticks in the background using tokio channels to
//! communicate with the main application loop. The loop reacts to a tick by
//! force-refreshing the market snapshot and coin list through the store.

use std::time::Duration;
use tokio::sync::mpsc;

/// Messages sent from background refresh to the main app
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshMessage {
    /// Time to refresh the market snapshot and coin list
    Tick,
}

/// Configuration for the refresh interval
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Interval between refresh ticks
    pub interval: Duration,
    /// Whether auto-refresh is enabled
    pub enabled: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300), // 5 minutes
            enabled: true,
        }
    }
}

/// Handle for controlling the background refresh task
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
    /// Flag to signal shutdown
    shutdown_tx: mpsc::Sender<()>,
}

impl RefreshHandle {
    /// Creates a new RefreshHandle and spawns the background tick task
    ///
    /// # Arguments
    /// * `config` - Configuration for the refresh interval
    ///
    /// # Returns
    /// A RefreshHandle that receives ticks via the `receiver` channel
    pub fn spawn(config: RefreshConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(4);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            let tick_interval = config.interval;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tick_interval);
                // Skip the first tick (immediate)
                interval.tick().await;

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if msg_tx.send(RefreshMessage::Tick).await.is_err() {
                                break;
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Shuts down the background refresh task
    #[allow(dead_code)]
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Checks for a pending refresh message without blocking
pub fn try_recv(handle: &mut RefreshHandle) -> Option<RefreshMessage> {
    handle.receiver.try_recv().ok()
}
