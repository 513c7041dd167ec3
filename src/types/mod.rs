//! Binary framing: the fixed-width big-endian header and partition record
//! of the container format. Both types decode from and encode to plain
//! byte streams; this is a wire format, so encoders produce byte-exact
//! output.

pub mod header;
pub mod part;

pub use header::{BpkHeader, BPK_MAGIC, BPK_VERSION};
pub use part::{
    BpkPart, BPK_TYPE_DEZC, BPK_TYPE_FWV, BPK_TYPE_INVALID, BPK_TYPE_KER, BPK_TYPE_PBL,
    BPK_TYPE_PBLV, BPK_TYPE_RFS,
};
