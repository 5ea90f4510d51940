//! Change subscriptions over the realtime websocket.
//!
//! Each subscription joins one Phoenix channel on its own socket. A task per
//! channel keeps the heartbeat going and forwards decoded row changes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{ChangeSink, Delivery, Subscription};
use crate::auth::TokenSource;
use crate::config::BackendConfig;
use crate::constants::{HEARTBEAT_INTERVAL_SECS, JOIN_TIMEOUT_SECS};
use crate::error::BackendError;
use crate::models::{ChangeEvent, Operation, OperationFilter, Table};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Writer = SplitSink<Socket, Message>;
type Reader = SplitStream<Socket>;

const JOIN_REF: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join_ref: Option<String>,
}

impl PhoenixMessage {
    fn new(topic: &str, event: &str, payload: Value, reference: String) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: Some(reference),
            join_ref: None,
        }
    }

    fn to_frame(&self) -> Result<Message, BackendError> {
        Ok(Message::Text(serde_json::to_string(self)?))
    }
}

/// Row change carried by a `postgres_changes` payload.
pub(crate) fn decode_change(payload: &Value) -> Option<ChangeEvent> {
    let data = payload.get("data")?;
    let table = Table::from_name(data.get("table")?.as_str()?)?;
    let operation = Operation::from_wire(data.get("type")?.as_str()?)?;
    let non_empty = |key: &str| {
        data.get(key)
            .filter(|v| v.as_object().is_some_and(|o| !o.is_empty()))
            .cloned()
    };
    Some(ChangeEvent {
        table,
        operation,
        new_row: non_empty("record"),
        old_row: non_empty("old_record"),
    })
}

fn subscription_error(err: impl std::fmt::Display) -> BackendError {
    BackendError::Subscription(err.to_string())
}

struct ChannelHandle {
    leave: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct RealtimeClient {
    url: String,
    schema: String,
    tokens: TokenSource,
    next_id: AtomicU64,
    channels: Mutex<HashMap<u64, ChannelHandle>>,
}

impl RealtimeClient {
    pub fn new(config: &BackendConfig, tokens: TokenSource) -> Self {
        Self {
            url: config.realtime_url(),
            schema: config.schema.clone(),
            tokens,
            next_id: AtomicU64::new(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub async fn subscribe(
        &self,
        table: Table,
        filter: OperationFilter,
        sink: ChangeSink,
    ) -> Result<Subscription, BackendError> {
        let (socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(subscription_error)?;
        let (mut writer, mut reader) = socket.split();

        let topic = format!("realtime:{}:{}", self.schema, table);
        let mut join = PhoenixMessage::new(
            &topic,
            "phx_join",
            json!({
                "config": {
                    "broadcast": { "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": [{
                        "event": filter.as_wire(),
                        "schema": self.schema,
                        "table": table.as_str(),
                    }],
                },
                "access_token": self.tokens.bearer(),
            }),
            JOIN_REF.to_string(),
        );
        join.join_ref = Some(JOIN_REF.to_string());
        writer
            .send(join.to_frame()?)
            .await
            .map_err(subscription_error)?;

        timeout(
            Duration::from_secs(JOIN_TIMEOUT_SECS),
            wait_for_join(&mut reader),
        )
        .await
        .map_err(|_| BackendError::Subscription(format!("timed out joining {}", topic)))??;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (leave_tx, leave_rx) = oneshot::channel();
        let task = tokio::spawn(run_channel(
            writer,
            reader,
            Channel {
                id,
                topic: topic.clone(),
                table,
                filter,
            },
            sink,
            leave_rx,
        ));
        self.channels.lock().insert(
            id,
            ChannelHandle {
                leave: leave_tx,
                task,
            },
        );
        info!(%topic, filter = filter.as_wire(), "Realtime channel joined");
        Ok(Subscription::new(id, table, filter))
    }

    pub async fn unsubscribe(&self, subscription: Subscription) -> Result<(), BackendError> {
        let Some(handle) = self.channels.lock().remove(&subscription.id) else {
            return Ok(());
        };
        // the task may already have ended on its own
        let _ = handle.leave.send(());
        if timeout(Duration::from_secs(JOIN_TIMEOUT_SECS), handle.task)
            .await
            .is_err()
        {
            warn!(table = %subscription.table, "Realtime channel did not close in time");
        }
        Ok(())
    }
}

impl Drop for RealtimeClient {
    fn drop(&mut self) {
        for (_, handle) in self.channels.lock().drain() {
            handle.task.abort();
        }
    }
}

async fn wait_for_join(reader: &mut Reader) -> Result<(), BackendError> {
    while let Some(frame) = reader.next().await {
        let Message::Text(text) = frame.map_err(subscription_error)? else {
            continue;
        };
        let message: PhoenixMessage = serde_json::from_str(&text)?;
        if message.event != "phx_reply" || message.reference.as_deref() != Some(JOIN_REF) {
            continue;
        }
        return match message.payload.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(()),
            _ => Err(BackendError::Subscription(format!(
                "join rejected: {}",
                message.payload.get("response").unwrap_or(&Value::Null)
            ))),
        };
    }
    Err(BackendError::Subscription(
        "socket closed before join reply".to_string(),
    ))
}

struct Channel {
    id: u64,
    topic: String,
    table: Table,
    filter: OperationFilter,
}

/// Forward changes until asked to leave. A channel that dies any other way
/// sends a final `Delivery::Closed` so the session can fall back to polling.
async fn run_channel(
    writer: Writer,
    reader: Reader,
    channel: Channel,
    sink: ChangeSink,
    leave: oneshot::Receiver<()>,
) {
    let Some(reason) = pump(writer, reader, &channel, &sink, leave).await else {
        return;
    };
    warn!(topic = %channel.topic, "Realtime channel lost: {}", reason);
    let _ = sink.send(Delivery::Closed {
        subscription: channel.id,
        table: channel.table,
        reason,
    });
}

/// `None` when the channel was left on purpose or nobody is listening,
/// otherwise why it died.
async fn pump(
    mut writer: Writer,
    mut reader: Reader,
    channel: &Channel,
    sink: &ChangeSink,
    mut leave: oneshot::Receiver<()>,
) -> Option<String> {
    let topic = channel.topic.as_str();
    let period = Duration::from_secs(HEARTBEAT_INTERVAL_SECS);
    let mut heartbeat = interval_at(Instant::now() + period, period);
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let beat = PhoenixMessage::new("phoenix", "heartbeat", json!({}), next_ref.to_string());
                next_ref += 1;
                let sent = match beat.to_frame() {
                    Ok(frame) => writer.send(frame).await.map_err(subscription_error),
                    Err(err) => Err(err),
                };
                if let Err(err) = sent {
                    return Some(format!("heartbeat failed: {}", err));
                }
            }
            _ = &mut leave => {
                let bye = PhoenixMessage::new(topic, "phx_leave", json!({}), next_ref.to_string());
                if let Ok(frame) = bye.to_frame() {
                    let _ = writer.send(frame).await;
                }
                let _ = writer.close().await;
                debug!(%topic, "Realtime channel left");
                return None;
            }
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let message: PhoenixMessage = match serde_json::from_str(&text) {
                        Ok(message) => message,
                        Err(err) => {
                            debug!(%topic, "Ignoring malformed frame: {}", err);
                            continue;
                        }
                    };
                    match message.event.as_str() {
                        "postgres_changes" => {
                            let Some(change) = decode_change(&message.payload) else {
                                debug!(%topic, "Ignoring undecodable change");
                                continue;
                            };
                            if change.table != channel.table || !channel.filter.matches(change.operation) {
                                continue;
                            }
                            if sink.send(Delivery::Change(change)).is_err() {
                                debug!(%topic, "Change receiver gone, closing channel");
                                return None;
                            }
                        }
                        "phx_error" | "phx_close" => {
                            return Some(format!("server sent {}", message.event));
                        }
                        _ => {}
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Some("socket closed".to_string()),
                Some(Ok(_)) => {}
                Some(Err(err)) => return Some(format!("socket error: {}", err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_insert_and_delete() {
        let payload = json!({
            "data": {
                "columns": [],
                "commit_timestamp": "2024-03-01T10:15:00Z",
                "errors": null,
                "old_record": {},
                "record": {"id": "c9", "name": "Jane Doe"},
                "schema": "public",
                "table": "contact_submissions",
                "type": "INSERT"
            },
            "ids": [1]
        });
        let change = decode_change(&payload).unwrap();
        assert_eq!(change.table, Table::ContactSubmissions);
        assert_eq!(change.operation, Operation::Insert);
        assert_eq!(change.field("name"), Some("Jane Doe"));
        assert!(change.old_row.is_none());

        let payload = json!({
            "data": {"old_record": {"id": 4}, "record": null, "table": "skills", "type": "DELETE"}
        });
        let change = decode_change(&payload).unwrap();
        assert_eq!(change.row_id(), Some("4".to_string()));
        assert!(change.new_row.is_none());

        assert!(decode_change(&json!({"data": {"table": "experience", "type": "INSERT"}})).is_none());
    }

    #[test]
    fn test_phoenix_frame_shape() {
        let mut join = PhoenixMessage::new("realtime:public:projects", "phx_join", json!({}), "1".to_string());
        join.join_ref = Some("1".to_string());
        let value: Value = serde_json::to_value(&join).unwrap();
        assert_eq!(value["ref"], "1");
        assert_eq!(value["join_ref"], "1");

        let reply: PhoenixMessage = serde_json::from_str(
            r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok"},"ref":null}"#,
        )
        .unwrap();
        assert!(reply.reference.is_none());
    }
}
