//! Outbound hook queueing and delivery.
//!
//! The dispatcher turns "what happened" into durable hook rows; the
//! transport turns a claimed row into one delivery attempt. Neither knows
//! about the other: they meet only at the `notification_hooks` table.

pub mod dispatch;
pub mod transport;

pub use dispatch::{HookDispatcher, HookPlan};
pub use transport::{DeliveryVerdict, HookEndpoint, HookTransport, HttpHookTransport};
