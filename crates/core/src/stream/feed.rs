use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::errors::CoreError;
use crate::models::symbol::Symbol;

use super::messages::{parse_frame, subscribe_message, unsubscribe_message, StreamEvent};
use super::transport::{FeedConnection, FeedTransport};

/// Which wire protocol a feed speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedProtocol {
    /// Third-party market data: per-symbol subscribe, trade pushes.
    Market,
    /// Internal prices socket: no subscriptions, full `{prices}` frames.
    Prices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Handle to a running feed task. The socket is closed by [`shutdown`](Self::shutdown),
/// or when the handle is dropped.
pub struct FeedHandle {
    protocol: FeedProtocol,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub fn protocol(&self) -> FeedProtocol {
        self.protocol
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task, close its socket, and wait for it to exit.
    pub async fn shutdown(self) {
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            warn!("{:?} feed task ended abnormally: {e}", self.protocol);
        }
    }
}

/// Spawn a feed that keeps itself connected until shut down.
///
/// - On every (re)connect it subscribes to the symbol set held by `symbols`
///   *at that moment*.
/// - While connected it follows registry changes with unsubscribe/subscribe
///   messages (market protocol only).
/// - Parsed frames are forwarded on `events`; malformed frames are dropped.
/// - A dropped connection is retried after a fixed `reconnect_delay`.
pub fn spawn_feed(
    transport: Arc<dyn FeedTransport>,
    protocol: FeedProtocol,
    reconnect_delay: Duration,
    symbols: watch::Receiver<Vec<Symbol>>,
    events: mpsc::UnboundedSender<StreamEvent>,
) -> FeedHandle {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let feed = Feed {
        transport,
        protocol,
        reconnect_delay,
        symbols,
        events,
        shutdown: shutdown_rx,
    };
    let task = tokio::spawn(feed.run());
    FeedHandle {
        protocol,
        shutdown,
        task,
    }
}

enum SessionEnd {
    Shutdown,
    Closed,
    Failed(CoreError),
}

struct Feed {
    transport: Arc<dyn FeedTransport>,
    protocol: FeedProtocol,
    reconnect_delay: Duration,
    symbols: watch::Receiver<Vec<Symbol>>,
    events: mpsc::UnboundedSender<StreamEvent>,
    shutdown: watch::Receiver<bool>,
}

impl Feed {
    async fn run(mut self) {
        loop {
            if self.protocol == FeedProtocol::Market && !self.wait_for_symbols().await {
                break;
            }
            if !self.emit_status(ConnectionStatus::Connecting) {
                break;
            }

            let connected = tokio::select! {
                _ = self.shutdown.changed() => break,
                result = self.transport.connect() => result,
            };

            match connected {
                Ok(mut conn) => {
                    let end = self.run_session(conn.as_mut()).await;
                    if let Err(e) = conn.close().await {
                        info!("{:?} feed close: {e}", self.protocol);
                    }
                    match end {
                        SessionEnd::Shutdown => {
                            let _ = self.emit_status(ConnectionStatus::Disconnected);
                            break;
                        }
                        SessionEnd::Closed => warn!(
                            "{:?} feed closed by peer, reconnecting in {:?}",
                            self.protocol, self.reconnect_delay
                        ),
                        SessionEnd::Failed(e) => warn!(
                            "{:?} feed error: {e}. Reconnecting in {:?}",
                            self.protocol, self.reconnect_delay
                        ),
                    }
                }
                Err(e) => warn!(
                    "{:?} feed connection failed: {e}. Retrying in {:?}",
                    self.protocol, self.reconnect_delay
                ),
            }

            if !self.emit_status(ConnectionStatus::Disconnected) {
                break;
            }
            tokio::select! {
                _ = self.shutdown.changed() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
        info!("{:?} feed stopped", self.protocol);
    }

    /// Block until the symbol set is non-empty. `false` means shut down.
    async fn wait_for_symbols(&mut self) -> bool {
        loop {
            if *self.shutdown.borrow() {
                return false;
            }
            if !self.symbols.borrow().is_empty() {
                return true;
            }
            tokio::select! {
                _ = self.shutdown.changed() => return false,
                changed = self.symbols.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    async fn run_session(&mut self, conn: &mut dyn FeedConnection) -> SessionEnd {
        // Read the set now, not at spawn time: it may have changed while we
        // were disconnected.
        let mut subscribed: Vec<Symbol> = self.symbols.borrow_and_update().clone();
        if self.protocol == FeedProtocol::Market {
            info!("Market feed connected, subscribing {} symbols", subscribed.len());
            for symbol in &subscribed {
                if let Err(e) = conn.send_text(subscribe_message(symbol)).await {
                    return SessionEnd::Failed(e);
                }
            }
        }
        if !self.emit_status(ConnectionStatus::Connected) {
            return SessionEnd::Shutdown;
        }

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => return SessionEnd::Shutdown,
                changed = self.symbols.changed() => {
                    if changed.is_err() {
                        return SessionEnd::Shutdown;
                    }
                    let current = self.symbols.borrow_and_update().clone();
                    if self.protocol == FeedProtocol::Market {
                        if let Err(e) = resubscribe(conn, &subscribed, &current).await {
                            return SessionEnd::Failed(e);
                        }
                    }
                    subscribed = current;
                }
                frame = conn.next_text() => match frame {
                    Some(Ok(text)) => {
                        if let Some(event) = parse_frame(&text) {
                            if self.events.send(event).is_err() {
                                return SessionEnd::Shutdown;
                            }
                        }
                    }
                    Some(Err(e)) => return SessionEnd::Failed(e),
                    None => return SessionEnd::Closed,
                },
            }
        }
    }

    /// `false` when nobody is listening any more.
    fn emit_status(&self, status: ConnectionStatus) -> bool {
        self.events
            .send(StreamEvent::Status {
                protocol: self.protocol,
                status,
            })
            .is_ok()
    }
}

/// Send unsubscribe for dropped symbols, subscribe for new ones.
async fn resubscribe(
    conn: &mut dyn FeedConnection,
    old: &[Symbol],
    new: &[Symbol],
) -> Result<(), CoreError> {
    for symbol in old.iter().filter(|s| !new.contains(s)) {
        conn.send_text(unsubscribe_message(symbol)).await?;
    }
    for symbol in new.iter().filter(|s| !old.contains(s)) {
        conn.send_text(subscribe_message(symbol)).await?;
    }
    Ok(())
}
