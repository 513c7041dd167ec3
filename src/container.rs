//! The container handle: owns the backing file and the read cursor, and
//! carries every public operation on a BPK package.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::crc::{crc32, CRC_INVALID, CRC_SEED};
use crate::error::Error;
use crate::types::header::{HDR_CRC_OFFSET, HDR_SIZE_OFFSET};
use crate::types::part::PART_SIZE_OFFSET;
use crate::types::{BpkHeader, BpkPart};
use crate::{debug, trace};

/// Working buffer size for streaming writes, reads and checksums.
const CHUNK_SIZE: usize = 2048;

/// Refresh the header's size and checksum when the handle goes away.
const FLAG_CRC: u8 = 0x01;

/// An open BPK container.
///
/// A handle is obtained from [`Bpk::create`] or [`Bpk::open`] and owns the
/// backing file exclusively. Partitions are appended with
/// [`write_file`](Bpk::write_file) / [`write_from`](Bpk::write_from) and
/// discovered sequentially with [`next`](Bpk::next) or
/// [`find`](Bpk::find); there is no central index. The handle tracks a
/// single cursor into the currently selected partition, and the
/// [`Read`](io::Read) implementation consumes that partition's payload
/// without ever crossing into the next record.
///
/// Writable handles refresh the header's total size and whole-file
/// checksum on [`close`](Bpk::close) (or, best effort, on drop).
///
/// # Example
/// ```no_run
/// use bpk::Bpk;
/// use bpk::types::BPK_TYPE_KER;
///
/// let mut pkg = Bpk::create("firmware.bpk").unwrap();
/// pkg.write_file(BPK_TYPE_KER, 0, "zImage").unwrap();
/// pkg.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Bpk {
    file: File,
    /// Total logical size of the container. Trailing bytes beyond it are
    /// ignored by iteration and verification.
    size: u64,
    /// Read offset within the selected partition's payload.
    ppos: u64,
    /// Payload size of the selected partition; zero when none is selected.
    psize: u64,
    flags: u8,
}

impl Bpk {
    /// Creates a new, empty container at `path`, truncating any existing
    /// file.
    ///
    /// The file starts as a bare header (`size` = 28, checksum cleared);
    /// the final values are patched in when the handle is closed.
    ///
    /// # Errors
    /// [`Error::IOError`] when the file cannot be created or the header
    /// cannot be written.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Bpk, Error> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        BpkHeader::default().write_to(&mut file)?;
        debug!("created container: {}", path.as_ref().display());

        Ok(Bpk {
            file,
            size: BpkHeader::SIZE as u64,
            ppos: 0,
            psize: 0,
            flags: FLAG_CRC,
        })
    }

    /// Opens an existing container.
    ///
    /// With `writable` set the file is opened read-write (created if
    /// absent, and initialized with a fresh header when shorter than one)
    /// and partitions may be appended; the header is refreshed on close.
    /// Otherwise the file is opened read-only and left untouched.
    ///
    /// # Errors
    /// - [`Error::Malformed`] on a wrong magic, a major version newer than
    ///   [`BPK_VERSION`](crate::types::BPK_VERSION), or a file too short
    ///   for a header.
    /// - [`Error::IOError`] when the file cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, writable: bool) -> Result<Bpk, Error> {
        let mut flags = 0;
        let mut file = if writable {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(&path)?;
            if file.metadata()?.len() < BpkHeader::SIZE as u64 {
                file.seek(SeekFrom::Start(0))?;
                BpkHeader::default().write_to(&mut file)?;
            }
            file.seek(SeekFrom::Start(0))?;
            flags = FLAG_CRC;
            file
        } else {
            File::open(&path)?
        };

        let header = match BpkHeader::read_from(&mut file) {
            Ok(header) => header,
            Err(Error::IOError(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(Error::Malformed(format!(
                    "{}: file too short for a container header",
                    path.as_ref().display()
                )))
            }
            Err(err) => return Err(err),
        };
        if !header.is_compatible() {
            return Err(Error::Malformed(format!(
                "{}: bad magic or unsupported version (magic: 0x{:08x}, version: 0x{:08x})",
                path.as_ref().display(),
                header.magic,
                header.version
            )));
        }
        debug!(
            "opened container: {} (size: {}, writable: {})",
            path.as_ref().display(),
            header.size,
            writable
        );

        Ok(Bpk {
            file,
            size: header.size,
            ppos: 0,
            psize: 0,
            flags,
        })
    }

    /// Closes the container.
    ///
    /// On a writable handle this patches the header's `size` and `crc`
    /// fields and flushes the file. Dropping a writable handle performs
    /// the same finalization best effort; use `close` to observe errors.
    pub fn close(mut self) -> Result<(), Error> {
        self.finalize()?;
        self.flags &= !FLAG_CRC;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), Error> {
        if self.flags & FLAG_CRC != 0 {
            self.file.seek(SeekFrom::Start(HDR_SIZE_OFFSET))?;
            self.file.write_u64::<BigEndian>(self.size)?;

            let (crc, _) = self.compute_file_crc()?;
            self.file.seek(SeekFrom::Start(HDR_CRC_OFFSET))?;
            self.file.write_u32::<BigEndian>(crc)?;
            self.file.flush()?;
            debug!("finalized container (size: {}, crc: 0x{:08x})", self.size, crc);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------------------
    // writer
    // ------------------------------------------------------------------------------------

    /// Appends the contents of the file at `path` as a new partition.
    ///
    /// # Errors
    /// [`Error::SourceError`] when `path` cannot be opened or read;
    /// [`Error::IOError`] when the container itself fails.
    pub fn write_file<P: AsRef<Path>>(
        &mut self,
        part_type: u32,
        hw_id: u32,
        path: P,
    ) -> Result<(), Error> {
        let mut source = File::open(path).map_err(Error::SourceError)?;
        self.write_from(part_type, hw_id, &mut source)
    }

    /// Appends a new partition, streaming its payload from `source`.
    ///
    /// The payload length need not be known up front: a placeholder record
    /// is reserved at the end of the container, the source is drained
    /// through a small working buffer while the size and checksum
    /// accumulate, and the record is patched once the source reports EOF.
    /// The selected-partition cursor is cleared.
    ///
    /// On failure the container keeps the placeholder with whatever bytes
    /// made it to disk; there is no rollback, and the caller is expected
    /// to discard the file.
    ///
    /// # Errors
    /// [`Error::SourceError`] when `source` fails; [`Error::IOError`] on a
    /// container write or seek failure.
    pub fn write_from<R: Read>(
        &mut self,
        part_type: u32,
        hw_id: u32,
        source: &mut R,
    ) -> Result<(), Error> {
        let record_start = self.size;
        self.file.seek(SeekFrom::Start(record_start))?;

        let placeholder = BpkPart {
            part_type,
            size: 0,
            crc: CRC_SEED,
            hw_id,
        };
        placeholder.write_to(&mut self.file)?;
        self.size += BpkPart::SIZE as u64;

        let mut buf = [0u8; CHUNK_SIZE];
        let mut crc = CRC_SEED;
        let mut written: u64 = 0;
        loop {
            let len = source.read(&mut buf).map_err(Error::SourceError)?;
            if len == 0 {
                break;
            }
            crc = crc32(crc, &buf[..len]);
            self.file.write_all(&buf[..len])?;
            written += len as u64;
            self.size += len as u64;
        }

        // patch the reserved record now that the payload is known
        self.file
            .seek(SeekFrom::Start(record_start + PART_SIZE_OFFSET))?;
        self.file.write_u64::<BigEndian>(written)?;
        self.file.write_u32::<BigEndian>(crc)?;
        self.file.seek(SeekFrom::Start(self.size))?;

        self.ppos = 0;
        self.psize = 0;
        debug!(
            "wrote partition (type: 0x{:08x}, hw_id: {}, size: {}, crc: 0x{:08x})",
            part_type, hw_id, written, crc
        );
        Ok(())
    }

    // ------------------------------------------------------------------------------------
    // reader
    // ------------------------------------------------------------------------------------

    /// Moves back to the first partition and clears the cursor.
    pub fn rewind(&mut self) -> Result<(), Error> {
        self.file.seek(SeekFrom::Start(BpkHeader::SIZE as u64))?;
        self.ppos = 0;
        self.psize = 0;
        Ok(())
    }

    /// Skips past whatever is left of the selected partition and deselects
    /// it, leaving the stream at the next record boundary.
    pub(crate) fn skip_rest(&mut self) -> Result<(), Error> {
        let rest = self.psize - self.ppos;
        self.ppos = 0;
        self.psize = 0;
        if rest != 0 {
            self.file.seek(SeekFrom::Current(rest as i64))?;
        }
        Ok(())
    }

    /// Advances to the next partition and selects it.
    ///
    /// Any unread payload of the currently selected partition is skipped.
    /// Returns `None` once the next record would start at or past the
    /// container's logical end; I/O trouble mid-iteration conservatively
    /// reads as the end as well. After `Some`, the stream position is at
    /// the start of the returned partition's payload.
    pub fn next(&mut self) -> Option<BpkPart> {
        self.skip_rest().ok()?;
        let part = self.read_part()?;
        self.psize = part.size;
        Some(part)
    }

    /// Selects the first partition matching `part_type` and `hw_id`.
    ///
    /// Scans from the beginning; on success the stream position is at the
    /// start of the matching payload. On [`Error::NotFound`] the cursor is
    /// unspecified and callers should [`rewind`](Bpk::rewind).
    pub fn find(&mut self, part_type: u32, hw_id: u32) -> Result<BpkPart, Error> {
        self.rewind()?;

        while let Some(part) = self.read_part() {
            if part.part_type == part_type && part.hw_id == hw_id {
                trace!("found partition (type: 0x{:08x}, hw_id: {})", part_type, hw_id);
                self.ppos = 0;
                self.psize = part.size;
                return Ok(part);
            }
            if self.file.seek(SeekFrom::Current(part.size as i64)).is_err() {
                break;
            }
        }
        Err(Error::NotFound)
    }

    /// Reads the record header at the current position, bounded by the
    /// container's logical size.
    fn read_part(&mut self) -> Option<BpkPart> {
        let pos = self.file.stream_position().ok()?;
        if pos >= self.size {
            return None;
        }
        BpkPart::read_from(&mut self.file).ok()
    }

    /// Extracts the unread remainder of the selected partition into a new
    /// file at `path`, then clears the cursor so the following
    /// [`next`](Bpk::next) moves to the next record.
    pub fn read_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
        let mut out = File::create(path)?;
        io::copy(self, &mut out)?;
        self.skip_rest()
    }

    // ------------------------------------------------------------------------------------
    // integrity
    // ------------------------------------------------------------------------------------

    /// Computes the whole-file checksum and returns it along with the one
    /// stored in the header.
    ///
    /// The checksum covers the header (its `crc` field taken as zero) and
    /// every partition record header; payload bytes are skipped, their
    /// integrity being covered by the per-partition checksums. The walk is
    /// bounded by the header's `size` field, so trailing garbage does not
    /// participate. A truncated or inconsistent container yields
    /// [`CRC_INVALID`] as the computed value. The stream position is
    /// preserved.
    pub fn compute_file_crc(&mut self) -> Result<(u32, u32), Error> {
        let pos = self.file.stream_position()?;
        let result = self.compute_file_crc_inner();
        self.file.seek(SeekFrom::Start(pos))?;
        result
    }

    fn compute_file_crc_inner(&mut self) -> Result<(u32, u32), Error> {
        self.file.seek(SeekFrom::Start(0))?;

        let mut hdr = [0u8; BpkHeader::SIZE];
        if self.file.read_exact(&mut hdr).is_err() {
            return Ok((CRC_INVALID, 0));
        }
        let stored = (&hdr[HDR_CRC_OFFSET as usize..]).read_u32::<BigEndian>()?;
        hdr[HDR_CRC_OFFSET as usize..HDR_CRC_OFFSET as usize + 4].fill(0);

        let mut crc = crc32(CRC_SEED, &hdr);
        let total = (&hdr[HDR_SIZE_OFFSET as usize..]).read_u64::<BigEndian>()?;
        let mut remaining = match total.checked_sub(BpkHeader::SIZE as u64) {
            Some(remaining) => remaining,
            None => return Ok((CRC_INVALID, stored)),
        };

        let mut rec = [0u8; BpkPart::SIZE];
        while remaining != 0 {
            if remaining < BpkPart::SIZE as u64 || self.file.read_exact(&mut rec).is_err() {
                return Ok((CRC_INVALID, stored));
            }
            remaining -= BpkPart::SIZE as u64;
            crc = crc32(crc, &rec);

            let psize = (&rec[PART_SIZE_OFFSET as usize..]).read_u64::<BigEndian>()?;
            if psize > remaining || self.file.seek(SeekFrom::Current(psize as i64)).is_err() {
                return Ok((CRC_INVALID, stored));
            }
            remaining -= psize;
        }
        Ok((crc, stored))
    }

    /// Verifies the container against the checksum stored in its header.
    ///
    /// Never mutates the file. Returns `false` on any mismatch or when the
    /// checksum could not be computed.
    pub fn check_crc(&mut self) -> Result<bool, Error> {
        let (computed, stored) = self.compute_file_crc()?;
        Ok(computed != CRC_INVALID && computed == stored)
    }

    /// Computes the checksum over the full payload of the selected
    /// partition, from its first byte regardless of how much has been read
    /// so far. The stream position and cursor are preserved; a short read
    /// yields [`CRC_INVALID`].
    pub fn compute_part_crc(&mut self) -> Result<u32, Error> {
        let pos = self.file.stream_position()?;
        // back to the start of the selected payload
        self.file.seek(SeekFrom::Current(-(self.ppos as i64)))?;

        let mut buf = [0u8; CHUNK_SIZE];
        let mut remaining = self.psize;
        let mut crc = CRC_SEED;
        while remaining != 0 {
            let len = remaining.min(CHUNK_SIZE as u64) as usize;
            let n = self.file.read(&mut buf[..len])?;
            if n == 0 {
                break;
            }
            remaining -= n as u64;
            crc = crc32(crc, &buf[..n]);
        }
        self.file.seek(SeekFrom::Start(pos))?;

        Ok(if remaining == 0 { crc } else { CRC_INVALID })
    }
}

impl Read for Bpk {
    /// Reads from the selected partition's payload, clamped so that a read
    /// never crosses into the following record. Returns `Ok(0)` at the
    /// partition's end (or when no partition is selected).
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = (self.psize - self.ppos).min(buf.len() as u64) as usize;
        if len == 0 {
            return Ok(0);
        }
        let n = self.file.read(&mut buf[..len])?;
        self.ppos += n as u64;
        Ok(n)
    }
}

impl Drop for Bpk {
    fn drop(&mut self) {
        if self.flags & FLAG_CRC != 0 {
            let _ = self.finalize();
        }
    }
}
