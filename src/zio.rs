//! Streaming gzip adapter used by the packager for compressed partitions.
//!
//! The container core knows nothing about compression: the write side
//! wraps the input file in an encoder that satisfies the writer's
//! pull-source contract, and the read side consumes the selected
//! partition through the handle's [`Read`](std::io::Read) implementation
//! and emits plain bytes into a sink.

use std::fs::File;
use std::io;
use std::path::Path;

use flate2::read::{GzDecoder, GzEncoder};
use flate2::Compression;

use crate::container::Bpk;
use crate::error::Error;

/// Appends the file at `path` as a gzip-compressed partition.
///
/// The payload stored in the container is the gzip stream; its size and
/// checksum are accumulated by the writer as the encoder produces bytes.
///
/// # Errors
/// [`Error::SourceError`] when `path` cannot be opened or compression
/// fails; [`Error::IOError`] on a container failure.
pub fn write_gz_file<P: AsRef<Path>>(
    bpk: &mut Bpk,
    part_type: u32,
    hw_id: u32,
    path: P,
) -> Result<(), Error> {
    let input = File::open(path).map_err(Error::SourceError)?;
    let mut encoder = GzEncoder::new(input, Compression::best());
    bpk.write_from(part_type, hw_id, &mut encoder)
}

/// Decompresses the selected partition into a new file at `path`.
///
/// The partition's payload is expected to be a gzip stream as written by
/// [`write_gz_file`]; a corrupt stream surfaces as an I/O error from the
/// decoder. On success any payload bytes past the gzip trailer are
/// skipped and the cursor is cleared, so a following
/// [`next`](Bpk::next) moves to the record after this partition.
pub fn read_gz_file<P: AsRef<Path>>(bpk: &mut Bpk, path: P) -> Result<(), Error> {
    let mut out = File::create(path)?;
    let mut decoder = GzDecoder::new(&mut *bpk);
    io::copy(&mut decoder, &mut out)?;
    drop(decoder);
    bpk.skip_rest()
}
