//! Panaderia Core - Shared domain library for the order engine.
//!
//! This crate provides the types and pure logic used by the `orders` service:
//! - Type-safe IDs, contact identities, and status enums
//! - Cart line items and the pricing calculator
//! - The metadata codec for the free-text `special_requests` field
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Pricing in particular runs both before and after an
//! order is persisted, so it must stay deterministic given its inputs.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, emails, phones, statuses, and line items
//! - [`pricing`] - Subtotal / tax / total computation over cart line items
//! - [`codec`] - Encode/decode structured metadata embedded in free text

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod codec;
pub mod pricing;
pub mod types;

pub use codec::{DecodedMetadata, Section};
pub use pricing::{PaymentPath, PricingCalculator, Totals};
pub use types::*;
