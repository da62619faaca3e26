//! Foundation types for the overlay proxy.
//!
//! Every other overlay crate depends on `ovl-types`.
//!
//! # Key Types
//!
//! - [`StoreKey`] -- Content-addressed location of an entry (BLAKE3 of the request path)
//! - [`HeaderSet`] -- Ordered, case-insensitive, multi-valued header map

pub mod header;
pub mod key;

pub use header::HeaderSet;
pub use key::StoreKey;
