//! Message Bus - type-driven publish/subscribe routing
//!
//! This module holds the router itself plus its configuration, diagnostics
//! hooks and recursion guard.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        MessageBus                            │
//! │  - publish_event() / publish_command()                       │
//! │  - subscribe() / unsubscribe() / add_rule()                  │
//! └─────────────────────────────────────────────────────────────┘
//!          │                     │                      │
//!          ▼                     ▼                      ▼
//! ┌─────────────────┐  ┌───────────────────┐  ┌─────────────────────┐
//! │ValidatorResolver│  │ RouteRule list    │  │SubscriptionRegistry │
//! │ (commands only) │  │ (insertion order) │  │  active / pending   │
//! └─────────────────┘  └───────────────────┘  └─────────────────────┘
//!          │                                            │
//!          ▼                                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │   Subject: one tap per (rule, handler) binding               │
//! │   type filter ─► pre-condition ─► transform ─► post ─► exec  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let bus = MessageBus::builder()
//!     .validators(TypeValidators::new().with::<Withdraw>(non_negative))
//!     .build();
//!
//! bus.add_rule(RouteRule::create::<Withdraw, Ledger>("ledger", false, false))?;
//! bus.subscribe_handler::<_, Withdraw>(&ledger)?;
//!
//! bus.publish_command(Withdraw { amount: 10 });
//! ```

mod config;
mod diagnostics;
mod dispatch;
mod message_bus;

pub use config::{BusConfig, DEFAULT_MAX_DISPATCH_DEPTH};
pub use diagnostics::{Diagnostics, Operation, SilentDiagnostics};
pub use message_bus::{Binding, MessageBus, MessageBusBuilder};
