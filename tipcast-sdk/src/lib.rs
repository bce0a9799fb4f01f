//! Shared wire types for the tipcast payments backend.
//!
//! This crate defines the JSON payloads exchanged with the outside world —
//! the token-economy provider's transaction webhooks on the way in, and
//! notification/webhook hook payloads on the way out — plus the
//! HMAC-SHA256 signature scheme both directions use.

pub mod objects;
pub mod signature;
