//! Pub/sub plumbing over Postgres `LISTEN`/`NOTIFY`.
//!
//! One durable connection per direction: the publisher owns a dedicated
//! outbound connection fed through a bounded queue, and each subscriber owns
//! a `PgListener`. Both sides survive connection loss by logging and
//! re-establishing after a short delay; messages in flight during an outage
//! are dropped (the poller is the recovery path).

use crate::events::types::BusMessage;
use sqlx::postgres::{PgListener, PgNotification};
use sqlx::{Connection, PgConnection, PgPool};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Bound on queued outbound messages; publishing backpressures past this.
pub const PUBLISH_BUFFER: usize = 256;

/// Delay before re-establishing a failed bus connection.
const RECONNECT_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

struct Outbound {
    channel: String,
    payload: String,
}

/// Cloneable handle for publishing bus messages.
///
/// Sends go through a bounded queue to a single writer task, so handler
/// code never blocks on the outbound connection and every delivery failure
/// is observed and logged in one place.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<Outbound>,
}

impl EventPublisher {
    /// Spawn the writer task and return the publishing handle.
    pub fn spawn(
        database_url: String,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (EventPublisher, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(PUBLISH_BUFFER);
        let handle = tokio::spawn(publisher_loop(database_url, rx, shutdown_rx));
        (EventPublisher { tx }, handle)
    }

    /// Publish a message on its own channel.
    pub async fn publish<M: BusMessage>(&self, message: &M) {
        self.publish_on(message.channel(), message).await;
    }

    /// Publish a message on an explicit channel (per-league variants).
    pub async fn publish_on<M: BusMessage>(&self, channel: &str, message: &M) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!(channel, error = %e, "Failed to serialize bus message");
                return;
            }
        };
        let outbound = Outbound {
            channel: channel.to_string(),
            payload,
        };
        if self.tx.send(outbound).await.is_err() {
            warn!(channel, "Publisher task is gone, dropping message");
        }
    }
}

async fn publisher_loop(
    database_url: String,
    mut rx: mpsc::Receiver<Outbound>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!("Event publisher started");
    let mut conn: Option<PgConnection> = None;

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Event publisher received shutdown signal");
                    break;
                }
            }

            Some(outbound) = rx.recv() => {
                let connection = match ensure_connected(&mut conn, &database_url).await {
                    Some(connection) => connection,
                    None => {
                        warn!(
                            channel = %outbound.channel,
                            "No outbound connection, dropping message"
                        );
                        tokio::time::sleep(RECONNECT_DELAY).await;
                        continue;
                    }
                };

                let result = sqlx::query("SELECT pg_notify($1, $2)")
                    .bind(&outbound.channel)
                    .bind(&outbound.payload)
                    .execute(connection)
                    .await;

                match result {
                    Ok(_) => {
                        debug!(channel = %outbound.channel, "Published bus message");
                    }
                    Err(e) => {
                        error!(
                            channel = %outbound.channel,
                            error = %e,
                            "Failed to publish bus message, resetting connection"
                        );
                        conn = None;
                    }
                }
            }

            else => {
                info!("All publisher handles dropped");
                break;
            }
        }
    }

    info!("Event publisher shutdown complete");
}

async fn ensure_connected<'a>(
    conn: &'a mut Option<PgConnection>,
    database_url: &str,
) -> Option<&'a mut PgConnection> {
    if conn.is_none() {
        match PgConnection::connect(database_url).await {
            Ok(new_conn) => {
                info!("Outbound bus connection established");
                *conn = Some(new_conn);
            }
            Err(e) => {
                error!(error = %e, "Failed to open outbound bus connection");
                return None;
            }
        }
    }
    conn.as_mut()
}

/// An inbound notification, channel plus raw JSON body.
#[derive(Debug, Clone)]
pub struct Notice {
    pub channel: String,
    pub payload: String,
}

impl Notice {
    /// Decode the JSON body into a payload type.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

impl From<PgNotification> for Notice {
    fn from(notification: PgNotification) -> Self {
        Notice {
            channel: notification.channel().to_string(),
            payload: notification.payload().to_string(),
        }
    }
}

/// Subscriber over a fixed set of channels.
pub struct EventSubscriber {
    listener: PgListener,
}

impl EventSubscriber {
    /// Open a listener subscribed to the given channels.
    pub async fn connect<'c>(
        pool: &PgPool,
        channels: impl IntoIterator<Item = &'c str>,
    ) -> Result<Self, sqlx::Error> {
        let mut listener = PgListener::connect_with(pool).await?;
        let channels: Vec<&str> = channels.into_iter().collect();
        listener.listen_all(channels).await?;
        Ok(EventSubscriber { listener })
    }

    /// Receive the next notification.
    ///
    /// Transport errors are logged and retried after a delay, so this only
    /// resolves with a message; the caller's select loop stays alive across
    /// outages.
    pub async fn recv(&mut self) -> Notice {
        loop {
            match self.listener.recv().await {
                Ok(notification) => return notification.into(),
                Err(e) => {
                    error!(error = %e, "Bus listener error, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
}
