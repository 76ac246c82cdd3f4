//! Quote collection persistence and change publication.
//!
//! # Responsibility
//! - Own the ordered in-memory quote collection mirrored to storage.
//! - Publish category-set/count digests so downstream consumers never go
//!   stale relative to the collection.
//!
//! # Invariants
//! - Every mutation persists immediately; a persistence failure leaves the
//!   in-memory state authoritative for the rest of the session.
//! - Insertion order is preserved; duplicates are allowed outside merge.

pub mod quote_store;
