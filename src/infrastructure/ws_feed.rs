// WebSocket live feeds with bounded reconnect
use crate::application::live_feed::{
    FeedEvent, FeedHandle, FeedSink, FeedTarget, LiveFeed, ReconnectPolicy,
};
use futures::{Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

#[derive(Debug, Clone)]
pub struct WsFeed {
    base_url: String,
    policy: ReconnectPolicy,
}

impl WsFeed {
    pub fn new(base_url: String, policy: ReconnectPolicy) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    pub fn endpoint(&self, target: &FeedTarget) -> String {
        match target {
            FeedTarget::Telemetry { machine_id, plant_id } => format!(
                "{}/ws/data-stream?machineId={}&plantId={}",
                self.base_url,
                urlencoding::encode(machine_id.as_str()),
                urlencoding::encode(plant_id.as_str())
            ),
            FeedTarget::MachineStatus { plant_id } => format!(
                "{}/ws/machine-status?plantId={}",
                self.base_url,
                urlencoding::encode(plant_id.as_str())
            ),
            FeedTarget::Notifications => format!("{}/ws/notification-stream", self.base_url),
        }
    }
}

impl LiveFeed for WsFeed {
    fn open(&self, target: FeedTarget, sink: FeedSink) -> FeedHandle {
        let url = self.endpoint(&target);
        let task = tokio::spawn(pump(url, sink, self.policy));
        FeedHandle::new(move || {
            tracing::debug!("Closing {}", target);
            task.abort();
        })
    }
}

/// Text payloads of one connection. Ends with `Err(reason)` when the transport drops.
fn text_frames<S>(mut messages: S) -> impl Stream<Item = Result<String, String>>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    async_stream::stream! {
        while let Some(message) = messages.next().await {
            match message {
                Ok(Message::Text(text)) => yield Ok(text.to_string()),
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|f| format!("closed by server: {} {}", f.code, f.reason))
                        .unwrap_or_else(|| "closed by server".to_string());
                    yield Err(reason);
                    return;
                }
                // Control and binary frames carry no telemetry
                Ok(_) => {}
                Err(e) => {
                    yield Err(e.to_string());
                    return;
                }
            }
        }
        yield Err("connection ended".to_string());
    }
}

/// Runs one feed until the policy gives up or nobody is listening.
///
/// The attempt counter resets only once a connection has delivered a frame,
/// so a server that accepts and immediately drops still exhausts the policy.
async fn pump(url: String, sink: FeedSink, policy: ReconnectPolicy) {
    let mut attempt = 0u32;

    loop {
        let reason = match connect_async(url.as_str()).await {
            Ok((socket, _)) => {
                tracing::info!("Connected to {}", url);

                let frames = text_frames(socket);
                futures::pin_mut!(frames);
                let mut reason = String::from("connection ended");
                while let Some(frame) = frames.next().await {
                    match frame {
                        Ok(text) => {
                            if !sink.deliver(FeedEvent::Frame(text)) {
                                return;
                            }
                            attempt = 0;
                        }
                        Err(e) => {
                            reason = e;
                            break;
                        }
                    }
                }
                reason
            }
            Err(e) => e.to_string(),
        };

        attempt += 1;
        match policy.delay_for(attempt) {
            Some(delay) => {
                tracing::warn!("{} dropped ({}), reconnecting in {:?}", url, reason, delay);
                let listening = sink.deliver(FeedEvent::Reconnecting {
                    attempt,
                    reason,
                });
                if !listening {
                    return;
                }
                tokio::time::sleep(delay).await;
            }
            None => {
                tracing::warn!(
                    "{} dropped ({}), giving up after {} attempts",
                    url,
                    reason,
                    attempt - 1
                );
                sink.deliver(FeedEvent::Closed { reason });
                return;
            }
        }
    }
}
