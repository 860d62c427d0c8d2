//! Transport compression

mod decompressor;

pub use decompressor::{BufferOverflow, Decompressor, DEFAULT_MAX_BUFFERED, SYNC_FLUSH_MARKER};

#[cfg(test)]
pub(crate) use decompressor::tests::StreamCompressor;
