//! Terminal inbox triage with optimistic actions.
//!
//! The processing core (quote stripping, reply recipients, similar-item
//! grouping and the optimistic mutation store) lives here; `main.rs` wires it
//! to a terminal front-end and a remote [`bridge::Bridge`].

pub mod address;
pub mod app;
pub mod bridge;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod model;
pub mod quote;
pub mod recipients;
pub mod similar;
pub mod store;
pub mod ui;
