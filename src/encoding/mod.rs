//! Run-length-encoded line numbers for a `Chunk` (§3, §6).

mod rle;

pub use rle::LineTable;
