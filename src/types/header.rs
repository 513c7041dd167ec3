use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Error;

/// Container magic, the four characters `SOFY`.
pub const BPK_MAGIC: u32 = 0x534F4659;

/// Format version written and understood by this library (1.0). The major
/// number lives in the high 16 bits.
pub const BPK_VERSION: u32 = 0x0001_0000;

/// Byte offset of the `size` field within the header.
pub(crate) const HDR_SIZE_OFFSET: u64 = 8;

/// Byte offset of the `crc` field within the header.
pub(crate) const HDR_CRC_OFFSET: u64 = 16;

fn major(version: u32) -> u32 {
    version & 0xFFFF_0000
}

/// The 28-byte container header.
///
/// ## Layout
/// ```text
/// +--------+-------------+---------------+-----------------------+
/// | 0x00   | magic: u32  | version: u32  |      size: u64        |
/// +--------+-------------+---------------+-----------------------+
/// | 0x10   | crc: u32    |           spare: u64          |
/// +--------+-------------+-------------------------------+
/// ```
/// All fields big-endian. `size` is the total file length in bytes and
/// bounds partition iteration; bytes beyond it are ignored. `crc` is the
/// whole-file checksum, computed with this field taken as zero.
#[derive(Debug, Clone)]
pub struct BpkHeader {
    pub magic: u32,
    pub version: u32,
    /// Total file size in bytes, header included.
    pub size: u64,
    /// Whole-file checksum; zero until the container is finalized.
    pub crc: u32,
    spare: u64,
}

impl Default for BpkHeader {
    /// Returns the header of an empty container: current magic and version,
    /// `size` covering the header alone, checksum cleared.
    fn default() -> Self {
        BpkHeader {
            magic: BPK_MAGIC,
            version: BPK_VERSION,
            size: Self::SIZE as u64,
            crc: 0,
            spare: 0,
        }
    }
}

impl BpkHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 28;

    /// Whether this header belongs to a container this library can read.
    ///
    /// The magic must match and the major version must not exceed
    /// [`BPK_VERSION`]'s; a newer minor version is acceptable.
    pub fn is_compatible(&self) -> bool {
        self.magic == BPK_MAGIC && major(self.version) <= major(BPK_VERSION)
    }

    /// Decodes a header from the reader's current position.
    pub fn read_from<R>(reader: &mut R) -> Result<BpkHeader, Error>
    where
        R: io::Read,
    {
        Ok(BpkHeader {
            magic: reader.read_u32::<BigEndian>()?,
            version: reader.read_u32::<BigEndian>()?,
            size: reader.read_u64::<BigEndian>()?,
            crc: reader.read_u32::<BigEndian>()?,
            spare: reader.read_u64::<BigEndian>()?,
        })
    }

    /// Encodes the header at the writer's current position.
    pub fn write_to<W>(&self, writer: &mut W) -> Result<(), Error>
    where
        W: io::Write,
    {
        writer.write_u32::<BigEndian>(self.magic)?;
        writer.write_u32::<BigEndian>(self.version)?;
        writer.write_u64::<BigEndian>(self.size)?;
        writer.write_u32::<BigEndian>(self.crc)?;
        writer.write_u64::<BigEndian>(self.spare)?;
        Ok(())
    }
}
