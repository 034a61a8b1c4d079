//! Quoted-chain removal for message bodies.
//!
//! Both strippers are heuristics: when nothing matches they hand back the
//! input (trimmed or sanitized) instead of failing.

pub mod markup;
pub mod plain;

pub use markup::{markup_to_text, sanitize, strip_markup};
pub use plain::strip;
