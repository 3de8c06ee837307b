//! Session event receiver with polling.

use crate::client::WaClient;
use crate::types::SessionEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error};

/// Receiver that polls the gateway for session events.
///
/// Events for one session are yielded in emission order; the stream never
/// reorders across polls.
pub struct EventReceiver {
    client: WaClient,
    poll_interval: Duration,
}

impl EventReceiver {
    /// Create a new event receiver.
    pub fn new(client: WaClient, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }

    /// Start receiving session events as an async stream.
    pub fn stream(self) -> impl Stream<Item = SessionEvent> {
        async_stream::stream! {
            loop {
                match self.client.fetch_events().await {
                    Ok(events) => {
                        for event in events {
                            yield SessionEvent::from(event);
                        }
                    }
                    Err(e) => {
                        error!("Event poll error: {}", e);
                        // Back off on error
                        sleep(Duration::from_secs(5)).await;
                        continue;
                    }
                }

                sleep(self.poll_interval).await;
            }
        }
    }

    /// Forward events into a bounded channel from a spawned task.
    ///
    /// Polling stops as soon as the receiving half is dropped, so a finished
    /// controller tears the poll loop down with it.
    pub fn channel(self, buffer: usize) -> mpsc::Receiver<SessionEvent> {
        let (tx, rx) = mpsc::channel(buffer);
        tokio::spawn(async move {
            let mut stream = Box::pin(self.stream());
            while let Some(event) = stream.next().await {
                if tx.send(event).await.is_err() {
                    debug!("Event consumer gone, stopping poll loop");
                    break;
                }
            }
        });
        rx
    }
}
