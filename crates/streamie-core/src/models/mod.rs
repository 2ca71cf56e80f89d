//! Data models for stream destination configuration.
//!
//! - `Platform`: the closed set of streaming destinations
//! - `DestinationConfig`: stream key plus on/off toggle for one platform
//! - `StreamConfig`: the full per-platform configuration, compared structurally
//! - `StreamConfigPayload`: the flat wire shape used by `/getconf` and `/update`

pub mod destination;

pub use destination::{DestinationConfig, FieldEdit, Platform, StreamConfig, StreamConfigPayload};
