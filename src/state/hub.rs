use axum::extract::ws::{Message, Utf8Bytes};
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifier assigned to each viewer WebSocket.
pub type ConnectionId = Uuid;

#[derive(Clone)]
/// Handle used to push messages to a connected viewer.
pub struct ViewerConnection {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Writer queue of the socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Outcome of a fan-out. Failed connections stay registered until their
/// socket task notices the closure and unregisters them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections that accepted the message.
    pub delivered: usize,
    /// Connections whose writer is gone.
    pub failed: Vec<ConnectionId>,
}

impl BroadcastReport {
    /// Whether every target received the message.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registry of live viewer connections.
#[derive(Default)]
pub struct ViewerHub {
    connections: DashMap<ConnectionId, ViewerConnection>,
}

impl ViewerHub {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection and immediately hand it `greeting`.
    ///
    /// Returns `false` when the connection's writer is already gone.
    pub fn register(&self, connection: ViewerConnection, greeting: impl Into<Utf8Bytes>) -> bool {
        let delivered = connection.tx.send(Message::Text(greeting.into())).is_ok();
        self.connections.insert(connection.id, connection);
        delivered
    }

    /// Forget a connection. No-op when it is unknown.
    pub fn unregister(&self, id: &ConnectionId) {
        self.connections.remove(id);
    }

    /// Send a message to a single connection.
    pub fn send_to(&self, id: &ConnectionId, text: impl Into<Utf8Bytes>) -> bool {
        let Some(connection) = self.connections.get(id) else {
            return false;
        };
        let tx = connection.tx.clone();
        drop(connection);
        tx.send(Message::Text(text.into())).is_ok()
    }

    /// Send `text` to every registered connection except `excluding`.
    pub fn broadcast(
        &self,
        text: impl Into<Utf8Bytes>,
        excluding: Option<ConnectionId>,
    ) -> BroadcastReport {
        let payload: Utf8Bytes = text.into();
        let targets: Vec<ViewerConnection> = self
            .connections
            .iter()
            .filter(|entry| Some(*entry.key()) != excluding)
            .map(|entry| entry.value().clone())
            .collect();

        let mut report = BroadcastReport::default();
        for connection in targets {
            if connection.tx.send(Message::Text(payload.clone())).is_ok() {
                report.delivered += 1;
            } else {
                report.failed.push(connection.id);
            }
        }
        report
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no viewer is connected.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (ViewerConnection, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ViewerConnection {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    fn text(message: Message) -> String {
        match message {
            Message::Text(text) => text.as_str().to_owned(),
            other => panic!("expected text message, got {other:?}"),
        }
    }

    #[test]
    fn register_sends_greeting_first() {
        let hub = ViewerHub::new();
        let (conn, mut rx) = connection();
        assert!(hub.register(conn, "hello"));
        assert_eq!(text(rx.try_recv().unwrap()), "hello");
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn broadcast_skips_excluded_connection() {
        let hub = ViewerHub::new();
        let (a, mut rx_a) = connection();
        let (b, mut rx_b) = connection();
        let a_id = a.id;
        hub.register(a, "hi");
        hub.register(b, "hi");
        rx_a.try_recv().unwrap();
        rx_b.try_recv().unwrap();

        let report = hub.broadcast("state", Some(a_id));
        assert_eq!(report.delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(text(rx_b.try_recv().unwrap()), "state");
    }

    #[test]
    fn broadcast_reports_failures_without_deregistering() {
        let hub = ViewerHub::new();
        let (alive, mut rx_alive) = connection();
        let (dead, rx_dead) = connection();
        let dead_id = dead.id;
        hub.register(alive, "hi");
        hub.register(dead, "hi");
        drop(rx_dead);
        rx_alive.try_recv().unwrap();

        let report = hub.broadcast("state", None);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, vec![dead_id]);
        assert!(!report.is_clean());
        assert_eq!(hub.len(), 2);
        assert_eq!(text(rx_alive.try_recv().unwrap()), "state");

        hub.unregister(&dead_id);
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn send_to_unknown_connection_is_false() {
        let hub = ViewerHub::new();
        assert!(!hub.send_to(&Uuid::new_v4(), "state"));
    }
}
