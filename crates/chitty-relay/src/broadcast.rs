//! Fan-out of one frame to every registered client.

use chitty_protocol::ServerFrame;
use chitty_registry::ClientRegistry;

/// What happened during one [`deliver`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Number of push attempts, one per registered identity.
    pub attempted: usize,
    /// Identities whose stream was already gone.
    pub failed: Vec<String>,
}

impl DeliveryReport {
    /// Number of pushes that landed in a live queue.
    pub fn delivered(&self) -> usize {
        self.attempted - self.failed.len()
    }
}

/// Pushes `frame` to every session in `registry`, sender included.
///
/// Fire-and-forget per recipient: a dead stream is logged and skipped,
/// and delivery carries on to everyone else. The dead session stays
/// registered until its own handler notices the closed stream.
pub fn deliver(registry: &ClientRegistry, frame: &ServerFrame) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    registry.for_each_other(None, |session| {
        report.attempted += 1;
        if let Err(e) = session.deliver(frame.clone()) {
            tracing::warn!(error = %e, "delivery failed, skipping recipient");
            report.failed.push(session.identity.clone());
        }
    });

    tracing::debug!(
        attempted = report.attempted,
        failed = report.failed.len(),
        "broadcast delivered"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chitty_protocol::ChatMessage;
    use chitty_registry::OutboundHandle;
    use chitty_transport::ConnectionId;

    fn hello() -> ServerFrame {
        ServerFrame::Chat(ChatMessage::new("alice", "hello"))
    }

    #[test]
    fn test_deliver_empty_registry_attempts_nothing() {
        let reg = ClientRegistry::new();
        assert_eq!(deliver(&reg, &hello()), DeliveryReport::default());
    }

    #[test]
    fn test_deliver_reaches_every_session_exactly_once() {
        let mut reg = ClientRegistry::new();
        let mut receivers = Vec::new();
        for (i, name) in ["alice", "bob", "carol"].into_iter().enumerate() {
            let (outbound, rx) = OutboundHandle::channel();
            reg.register(name, ConnectionId::new(i as u64), outbound).unwrap();
            receivers.push(rx);
        }

        let report = deliver(&reg, &hello());

        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered(), 3);
        for rx in &mut receivers {
            assert_eq!(rx.try_recv().ok(), Some(hello()));
            assert!(rx.try_recv().is_err(), "exactly one copy per recipient");
        }
    }

    #[test]
    fn test_deliver_skips_dead_recipient_and_continues() {
        let mut reg = ClientRegistry::new();
        let (alive, mut alive_rx) = OutboundHandle::channel();
        let (dead, dead_rx) = OutboundHandle::channel();
        reg.register("alive", ConnectionId::new(1), alive).unwrap();
        reg.register("dead", ConnectionId::new(2), dead).unwrap();
        drop(dead_rx);

        let report = deliver(&reg, &hello());

        assert_eq!(report.attempted, 2);
        assert_eq!(report.failed, vec!["dead".to_string()]);
        assert_eq!(alive_rx.try_recv().ok(), Some(hello()));
        // Delivery failure does not unregister anyone.
        assert_eq!(reg.len(), 2);
    }
}
