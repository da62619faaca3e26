//! HTTP overlay proxy.
//!
//! Serves locally stored entries in front of a remote origin. `PUT` and
//! `DELETE` manage entries; a `GET` is answered from the store when an entry
//! exists and reverse-proxied to the origin when it does not.
//!
//! The request path flows through three layers:
//!
//! - [`overlay`] -- middleware that shadows the local answer and decides hit
//!   or miss
//! - [`adapter`] -- maps HTTP methods onto [`ovl_store::EntryStore`] calls
//! - [`origin`] -- forwards misses to the configured origin

pub mod adapter;
pub mod config;
pub mod error;
pub mod log;
pub mod origin;
pub mod overlay;
pub mod router;
pub mod server;
pub mod shadow;

pub use adapter::StoreAdapter;
pub use config::{OriginConfig, Scheme, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use log::{MemoryLog, NullLog, Outcome, RequestLog, Source, TracingLog};
pub use origin::{HttpOrigin, OriginTransport};
pub use overlay::Overlay;
pub use server::OverlayServer;
pub use shadow::ShadowResponse;
