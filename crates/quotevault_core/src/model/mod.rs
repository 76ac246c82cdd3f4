//! Domain model for quote records.
//!
//! # Responsibility
//! - Define the canonical quote shape shared by store, filter and sync.
//! - Keep provenance and remote-observation metadata optional with explicit
//!   defaults instead of implicitly-extended records.
//!
//! # Invariants
//! - A constructed `Quote` always has non-empty `text` and `category`.
//! - `category` is held lowercase everywhere in core.

pub mod quote;
