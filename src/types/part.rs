use std::io;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Error;

/// Firmware version string.
pub const BPK_TYPE_FWV: u32 = 0x46575600;
/// Primary bootloader image.
pub const BPK_TYPE_PBL: u32 = 0x50424C00;
/// Bootloader version string.
pub const BPK_TYPE_PBLV: u32 = 0x50424C56;
/// Kernel image.
pub const BPK_TYPE_KER: u32 = 0x504B4552;
/// Root filesystem image.
pub const BPK_TYPE_RFS: u32 = 0x50524653;
/// Package description.
pub const BPK_TYPE_DEZC: u32 = 0x44455A43;

/// Sentinel tag; never stored in a container.
pub const BPK_TYPE_INVALID: u32 = 0xDEADBEEF;

/// Byte offset of the `size` field within a partition record. `size` and
/// `crc` are adjacent, so the writer patches both with one 12-byte write.
pub(crate) const PART_SIZE_OFFSET: u64 = 4;

/// One partition record header, 24 bytes on disk.
///
/// ## Layout
/// ```text
/// +--------+------------+----------------------+----------+
/// | 0x00   | type: u32  |      size: u64       | crc: u32 |
/// +--------+------------+----------+-----------+----------+
/// | 0x10   | hw_id: u32 | spare: u32 |
/// +--------+------------+------------+
/// ```
/// All fields big-endian. `size` counts payload bytes only; the payload
/// follows the record immediately. `crc` covers exactly those payload
/// bytes. The reserved trailing word is written as zero and ignored on
/// read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BpkPart {
    /// Partition type tag, one of the `BPK_TYPE_*` constants or any
    /// caller-supplied value.
    pub part_type: u32,
    /// Payload length in bytes.
    pub size: u64,
    /// Checksum over the payload, seed 0.
    pub crc: u32,
    /// Caller-supplied hardware discriminator, allowing several partitions
    /// of the same type for different device variants.
    pub hw_id: u32,
}

impl BpkPart {
    /// Encoded size in bytes.
    pub const SIZE: usize = 24;

    /// Decodes a record header from the reader's current position.
    pub fn read_from<R>(reader: &mut R) -> Result<BpkPart, Error>
    where
        R: io::Read,
    {
        let part = BpkPart {
            part_type: reader.read_u32::<BigEndian>()?,
            size: reader.read_u64::<BigEndian>()?,
            crc: reader.read_u32::<BigEndian>()?,
            hw_id: reader.read_u32::<BigEndian>()?,
        };
        reader.read_u32::<BigEndian>()?; // spare
        Ok(part)
    }

    /// Encodes the record header at the writer's current position.
    pub fn write_to<W>(&self, writer: &mut W) -> Result<(), Error>
    where
        W: io::Write,
    {
        writer.write_u32::<BigEndian>(self.part_type)?;
        writer.write_u64::<BigEndian>(self.size)?;
        writer.write_u32::<BigEndian>(self.crc)?;
        writer.write_u32::<BigEndian>(self.hw_id)?;
        writer.write_u32::<BigEndian>(0)?; // spare
        Ok(())
    }
}
