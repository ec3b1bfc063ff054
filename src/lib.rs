//! gisync library crate
//!
//! Directory-snapshot engine for GIS project synchronization: scans a project
//! root into a filtered, checksummed inventory suitable for diffing against a
//! remote copy. The network layer and diff policy live elsewhere.

pub mod cache;
pub mod checksum;
pub mod error;
pub mod filter;
pub mod hash;
pub mod scan;

pub use cache::ChecksumCache;
pub use checksum::{ChecksumEngine, ChecksumStrategy};
pub use error::{ScanAborted, ScanError};
pub use filter::PathFilter;
pub use scan::{FileRecord, ScanInventory, Scanner};
