//! Real-time sensor aggregation for the biodigester dashboard.
//!
//! Merges a push channel (socket.io) and a pull channel (periodic polling
//! plus range fetches) into one bounded, time-ordered view of temperature,
//! humidity, pH and methane readings, derives threshold alerts over it, and
//! exposes the result as plain snapshots.
//!
//! Module boundaries follow the Explicit Module Boundary Pattern (EMBP):
//! each module exposes a narrow surface and `main.rs` wires them together.

pub mod aggregator;
pub mod alerts;
pub mod channels;
pub mod config;
pub mod display;
pub mod models;
pub mod normalize;
pub mod routes;
pub mod session;

pub use aggregator::{AggregateState, Source, Update, HISTORY_CAPACITY};
pub use alerts::{AlertFeed, ALERT_CAPACITY};
pub use channels::{HttpPullChannel, PullChannel, PushChannel};
pub use config::Config;
pub use display::{HistoryStats, MethaneStatus, Snapshot};
pub use models::{Alert, CanonicalReading, RawReading, Severity, TimeRange};
pub use normalize::{normalize, FULL_SCALE_PPM};
pub use session::{SessionClient, SessionHandle, SessionOptions};
