//! Metrics and observability.
//!
//! - `events`: internal event types and the `InternalEvent` trait
//! - `exporter`: Prometheus text file written at the end of a run, and an
//!   optional HTTP endpoint

pub mod events;
pub mod exporter;

pub use exporter::MetricsExporter;

/// Emit an internal event.
///
/// Calls `InternalEvent::emit()` on the given event, which records the
/// corresponding metric. Without an installed recorder this is a no-op.
///
/// ```ignore
/// use auction_snapshot::metrics::events::ListingsFetched;
///
/// emit!(ListingsFetched { count: 100 });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
