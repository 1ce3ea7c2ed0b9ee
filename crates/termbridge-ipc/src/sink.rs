//! Outbound event delivery.
//!
//! The desktop shell runtime supplies the sink; the bridge only knows
//! "emit this kind with this payload". Delivery order is the call order.

/// Failure to hand an event to the UI layer.
#[derive(Debug, thiserror::Error)]
#[error("event sink error: {0}")]
pub struct SinkError(pub String);

/// Where UI-directed events go.
///
/// Implementations must preserve emission order for events they accept;
/// the bridge relies on that for the per-session output ordering
/// guarantee.
pub trait EventSink: Send + Sync {
    fn emit(&self, kind: &str, payload: &serde_json::Value) -> Result<(), SinkError>;
}
