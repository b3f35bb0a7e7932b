//! Core types for the order engine.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod line_item;
pub mod phone;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use line_item::{CartLineItem, LineItemError, MAX_QUANTITY, MAX_UNIT_PRICE};
pub use phone::{Phone, PhoneError};
pub use status::*;
