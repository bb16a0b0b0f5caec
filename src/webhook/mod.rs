//! Webhook push path
//!
//! Authenticated deliveries are reconciled against the API and written to
//! the same store the bulk sync fills.

pub mod reconciler;
mod server;
pub mod signature;

pub use reconciler::{
    apply, DeliveryOutcome, Reconciler, ResolvedDelivery, WebhookEvent,
};
pub use server::{WebhookError, WebhookServer};
pub use signature::{signature_header, verify_signature};
