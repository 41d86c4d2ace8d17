//! Broadcast stream and per-tap pipelines.
//!
//! ```text
//!  publish ──► Subject ──┬─► tap 1: filter ─► map ─► filter ─► sink
//!                        ├─► tap 2: filter ─► sink
//!                        └─► tap 3: (no stages) ─► sink
//! ```
//!
//! Everything runs synchronously on the publisher's stack.

mod pipeline;
mod subject;

pub use pipeline::Pipeline;
pub use subject::{Subject, Subscription};
