//! HTTP access used by the catalog loader and the installer.
//!
//! Everything that touches the network goes through [`HttpFetcher`] so that the loader,
//! the watcher and the installer can run against an in-memory [`StaticFetcher`] in tests.

mod executor;
mod reqwest;
mod memory;

pub use self::executor::{HttpFetcher, HttpResponse};
pub use self::reqwest::ReqwestFetcher;
pub use self::memory::StaticFetcher;
