//! Fire-and-forget status channel from the live loop to whoever presents it.

use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Log(String),
    Status {
        score: i32,
        mark_price: f64,
        unrealized_pnl: f64,
    },
}

/// Sending half of the status channel.
///
/// Events are dropped when the channel is full or the receiver is gone;
/// the trading loop never waits on presentation.
#[derive(Debug, Clone)]
pub struct StatusNotifier {
    tx: Option<mpsc::Sender<StatusEvent>>,
}

impl StatusNotifier {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<StatusEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// Notifier that discards everything (tests, headless runs)
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn log(&self, message: impl Into<String>) {
        self.send(StatusEvent::Log(message.into()));
    }

    pub fn status(&self, score: i32, mark_price: f64, unrealized_pnl: f64) {
        self.send(StatusEvent::Status {
            score,
            mark_price,
            unrealized_pnl,
        });
    }

    fn send(&self, event: StatusEvent) {
        if let Some(tx) = &self.tx {
            if let Err(e) = tx.try_send(event) {
                tracing::trace!("Status event dropped: {}", e);
            }
        }
    }
}
