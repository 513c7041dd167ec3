//! Read, write and verify BPK firmware containers.
//!
//! A BPK file bundles a sequence of typed, hardware-tagged binary
//! partitions (bootloader, kernel, root filesystem, version strings)
//! behind a file-level checksum, so device firmware ships as a single
//! verifiable file. See [`container::Bpk`] for the package handle.

mod logging;

pub mod container;
pub mod crc;
pub mod error;
pub mod types;
pub mod zio;

pub use container::Bpk;
pub use error::Error;
