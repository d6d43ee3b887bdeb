//! Traits and helpers shared across the fwdproxy library
//!
//! [`OriginConnector`] is the seam between the relay pipeline and the
//! network; `test_utils` holds the in-memory reader and loopback helpers used
//! by the test suites.

pub mod test_utils;
pub mod traits;

pub use test_utils::{ChunkedReader, FixedOriginConnector, spawn_origin, spawn_test_proxy};
pub use traits::OriginConnector;
