//! Engine event types and the publish/subscribe dispatcher
//!
//! The engine decouples "detect/decide" from "notify": detection results and
//! action recommendations leave the engine only as events published through
//! the [`EventDispatcher`]. Delivery is at-least-once, in-process, and
//! fire-and-forget — there is no durability or replay.

use crate::model::{ActionItem, SignalKind, Urgency};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Events published to downstream collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    /// One resistance signal crossed its detection threshold.
    /// Consumed by the audit/provenance sink.
    SignalDetected {
        run_id: Uuid,
        signal: SignalKind,
        probability: f64,
        confidence: f64,
        rationale: String,
        provenance: HashMap<String, String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The run produced an urgency classification and action list.
    /// Consumed by the downstream recommendation service; emitted exactly
    /// once per completed run.
    ActionRequired {
        run_id: Uuid,
        urgency: Urgency,
        actions: Vec<ActionItem>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl EngineEvent {
    /// Discriminant used for handler registration
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::SignalDetected { .. } => EventKind::SignalDetected,
            EngineEvent::ActionRequired { .. } => EventKind::ActionRequired,
        }
    }
}

/// Event type discriminant, the registry key for handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SignalDetected,
    ActionRequired,
}

/// Downstream consumer of engine events
///
/// Handlers may do arbitrary async work (forwarding to an audit sink,
/// posting to a recommendation service). A handler error is the handler's
/// problem: the dispatcher logs it and moves on.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handler name for logging
    fn name(&self) -> &'static str;

    /// Process one published event
    async fn handle(&self, event: &EngineEvent) -> anyhow::Result<()>;
}

/// Publish/subscribe dispatcher for engine events
///
/// Registration happens at process-startup wiring time via `&mut self`;
/// once the dispatcher is shared behind an `Arc`, the registry is immutable
/// and `publish` can run concurrently from any number of in-flight runs.
///
/// # Delivery contract
/// - Each handler registered for an event's kind is invoked once per
///   published event instance, in registration order for that kind.
/// - No ordering is promised across handlers beyond that.
/// - A handler that returns an error (or a kind with no handlers at all)
///   never fails the publish.
///
/// # Examples
///
/// ```rust,ignore
/// let mut dispatcher = EventDispatcher::new();
/// dispatcher.register(EventKind::ActionRequired, Arc::new(PlaybookForwarder::new(url)));
/// let dispatcher = Arc::new(dispatcher);
/// ```
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
}

impl EventDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for one event kind
    pub fn register(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        debug!(kind = ?kind, handler = handler.name(), "Registering event handler");
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Number of handlers registered for a kind
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map(|h| h.len()).unwrap_or(0)
    }

    /// Publish an event to every handler registered for its kind
    ///
    /// Returns the number of handlers that accepted the event. Handler
    /// errors are logged and swallowed; publishing never fails.
    pub async fn publish(&self, event: &EngineEvent) -> usize {
        let kind = event.kind();
        let Some(handlers) = self.handlers.get(&kind) else {
            debug!(kind = ?kind, "No handlers registered for event");
            return 0;
        };

        let mut delivered = 0;
        for handler in handlers {
            match handler.handle(event).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        handler = handler.name(),
                        kind = ?kind,
                        error = %e,
                        "Event handler failed; continuing with remaining handlers"
                    );
                }
            }
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn handle(&self, _event: &EngineEvent) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl EventHandler for FailingHandler {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _event: &EngineEvent) -> anyhow::Result<()> {
            anyhow::bail!("downstream sink unavailable")
        }
    }

    fn action_event() -> EngineEvent {
        EngineEvent::ActionRequired {
            run_id: Uuid::new_v4(),
            urgency: Urgency::Elevated,
            actions: vec![],
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_publish_without_handlers_is_noop() {
        let dispatcher = EventDispatcher::new();
        let delivered = dispatcher.publish(&action_event()).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_each_registered_handler_invoked_once() {
        let calls_a = Arc::new(AtomicUsize::new(0));
        let calls_b = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(
            EventKind::ActionRequired,
            Arc::new(CountingHandler { calls: Arc::clone(&calls_a) }),
        );
        dispatcher.register(
            EventKind::ActionRequired,
            Arc::new(CountingHandler { calls: Arc::clone(&calls_b) }),
        );

        let delivered = dispatcher.publish(&action_event()).await;
        assert_eq!(delivered, 2);
        assert_eq!(calls_a.load(Ordering::SeqCst), 1);
        assert_eq!(calls_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_later_handlers() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(EventKind::ActionRequired, Arc::new(FailingHandler));
        dispatcher.register(
            EventKind::ActionRequired,
            Arc::new(CountingHandler { calls: Arc::clone(&calls) }),
        );

        let delivered = dispatcher.publish(&action_event()).await;
        assert_eq!(delivered, 1, "only the succeeding handler counts");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handlers_are_routed_by_kind() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(
            EventKind::SignalDetected,
            Arc::new(CountingHandler { calls: Arc::clone(&calls) }),
        );

        // ActionRequired event must not reach a SignalDetected handler
        dispatcher.publish(&action_event()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_string(&action_event()).unwrap();
        assert!(json.contains("\"type\":\"ActionRequired\""));
    }
}
