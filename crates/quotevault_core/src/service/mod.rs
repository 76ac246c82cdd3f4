//! Use-case service layer.
//!
//! # Responsibility
//! - Bundle store, filter and session state behind one service object with
//!   an explicit lifecycle.
//! - Keep embedding layers (UI, probes) decoupled from component wiring.

pub mod quote_service;
