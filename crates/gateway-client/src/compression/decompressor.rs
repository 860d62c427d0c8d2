//! Streaming zlib decompressor
//!
//! The gateway compresses the whole connection as one zlib stream and
//! sync-flushes after every payload. Each flush ends with `00 00 FF FF`, so
//! bytes are buffered until that marker shows up and then inflated against
//! the connection-lifetime context.

use flate2::{Decompress, FlushDecompress, Status};

/// Trailer emitted by a deflate sync flush
pub const SYNC_FLUSH_MARKER: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Compressed bytes fed to the inflater per call
const INPUT_CHUNK_SIZE: usize = 16 * 1024;

/// Scratch output space per inflate call
const OUTPUT_CHUNK_SIZE: usize = 32 * 1024;

/// Compressed bytes allowed to pile up while waiting for a flush marker
pub const DEFAULT_MAX_BUFFERED: usize = 16 * 1024 * 1024;

/// The peer kept sending without ever completing a unit
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{buffered} compressed bytes without a flush marker (limit {limit})")]
pub struct BufferOverflow {
    pub buffered: usize,
    pub limit: usize,
}

/// Inflate state bound to one physical connection
///
/// Never reuse across connections: the server starts a fresh compressor for
/// every socket.
pub struct Decompressor {
    inflater: Decompress,
    buffer: Vec<u8>,
    max_buffered: usize,
    header_checked: bool,
}

impl Decompressor {
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_BUFFERED)
    }

    #[must_use]
    pub fn with_limit(max_buffered: usize) -> Self {
        Self {
            inflater: Decompress::new(false),
            buffer: Vec::new(),
            max_buffered,
            header_checked: false,
        }
    }

    /// Feed raw bytes; returns the decoded text once a complete unit is buffered
    ///
    /// # Errors
    /// `BufferOverflow` once more than the limit is waiting for a marker. The
    /// buffer is discarded and the stream cannot be continued.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<String>, BufferOverflow> {
        self.buffer.extend_from_slice(chunk);

        if !self.buffer.ends_with(&SYNC_FLUSH_MARKER) {
            let buffered = self.buffer.len();
            if buffered > self.max_buffered {
                self.buffer = Vec::new();
                return Err(BufferOverflow {
                    buffered,
                    limit: self.max_buffered,
                });
            }
            tracing::trace!(buffered, "Waiting for flush marker");
            return Ok(None);
        }

        let unit = std::mem::take(&mut self.buffer);
        let body = self.strip_zlib_header(&unit);
        let decoded = self.inflate(body);

        if decoded.is_empty() {
            return Ok(None);
        }

        Ok(Some(match String::from_utf8(decoded) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e.utf8_error(), "Inflated payload is not valid UTF-8");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        }))
    }

    /// Bytes waiting for a flush marker
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop the 2-byte zlib header at the very start of the stream, if present
    fn strip_zlib_header<'a>(&mut self, unit: &'a [u8]) -> &'a [u8] {
        if self.header_checked {
            return unit;
        }
        self.header_checked = true;

        match unit {
            [cmf, flg, rest @ ..] if is_zlib_header(*cmf, *flg) => rest,
            _ => unit,
        }
    }

    /// Inflate a complete unit, keeping whatever decoded before an error
    fn inflate(&mut self, mut input: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(input.len().saturating_mul(4));
        let mut scratch = vec![0u8; OUTPUT_CHUNK_SIZE];

        loop {
            let take = input.len().min(INPUT_CHUNK_SIZE);
            let in_before = self.inflater.total_in();
            let out_before = self.inflater.total_out();

            let result = self
                .inflater
                .decompress(&input[..take], &mut scratch, FlushDecompress::Sync);

            let consumed = usize::try_from(self.inflater.total_in() - in_before).unwrap_or(take);
            let produced = usize::try_from(self.inflater.total_out() - out_before).unwrap_or(0);
            output.extend_from_slice(&scratch[..produced]);
            input = &input[consumed.min(input.len())..];

            match result {
                Ok(Status::StreamEnd) => break,
                Ok(_) => {
                    // Done once the input is gone and the inflater had room to spare
                    if input.is_empty() && produced < scratch.len() {
                        break;
                    }
                    if consumed == 0 && produced == 0 {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        recovered = output.len(),
                        "Corrupt compressed data, keeping partial output"
                    );
                    break;
                }
            }
        }

        output
    }
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Decompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decompressor")
            .field("buffered", &self.buffer.len())
            .field("total_in", &self.inflater.total_in())
            .field("total_out", &self.inflater.total_out())
            .finish()
    }
}

fn is_zlib_header(cmf: u8, flg: u8) -> bool {
    cmf & 0x0F == 8 && (u16::from(cmf) * 256 + u16::from(flg)) % 31 == 0
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flate2::{Compress, Compression, FlushCompress};

    /// Server-side compressor producing sync-flushed zlib units
    pub(crate) struct StreamCompressor(Compress);

    impl StreamCompressor {
        pub(crate) fn new() -> Self {
            Self(Compress::new(Compression::default(), true))
        }

        pub(crate) fn unit(&mut self, text: &str) -> Vec<u8> {
            let mut out = Vec::with_capacity(text.len() + 1024);
            self.0
                .compress_vec(text.as_bytes(), &mut out, FlushCompress::Sync)
                .unwrap();
            assert!(out.ends_with(&SYNC_FLUSH_MARKER));
            out
        }
    }

    fn feed(inflater: &mut Decompressor, bytes: &[u8]) -> Option<String> {
        inflater.push(bytes).unwrap()
    }

    const HELLO: &str = r#"{"op":10,"d":{"heartbeat_interval":41250},"s":null,"t":null}"#;
    const READY: &str = r#"{"op":0,"d":{"session_id":"abc","resume_gateway_url":"wss://resume.example"},"s":1,"t":"READY"}"#;

    #[test]
    fn test_single_unit() {
        let mut server = StreamCompressor::new();
        let mut inflater = Decompressor::new();

        assert_eq!(feed(&mut inflater, &server.unit(HELLO)).as_deref(), Some(HELLO));
        assert_eq!(inflater.buffered(), 0);
    }

    #[test]
    fn test_shared_context_across_units() {
        let mut server = StreamCompressor::new();
        let mut inflater = Decompressor::new();

        // Later units refer back to the dictionary built by earlier ones
        for text in [HELLO, READY, READY, HELLO] {
            assert_eq!(feed(&mut inflater, &server.unit(text)).as_deref(), Some(text));
        }
    }

    #[test]
    fn test_chunking_invariance() {
        let mut server = StreamCompressor::new();
        let first = server.unit(HELLO);
        let second = server.unit(READY);

        for split in 1..second.len() {
            let mut inflater = Decompressor::new();
            assert_eq!(feed(&mut inflater, &first).as_deref(), Some(HELLO));

            let (head, tail) = second.split_at(split);
            assert_eq!(feed(&mut inflater, head), None, "split at {split}");
            assert_eq!(feed(&mut inflater, tail).as_deref(), Some(READY), "split at {split}");
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut server = StreamCompressor::new();
        let unit = server.unit(READY);
        let mut inflater = Decompressor::new();

        let (last, rest) = unit.split_last().unwrap();
        for byte in rest {
            assert_eq!(feed(&mut inflater, std::slice::from_ref(byte)), None);
        }
        assert_eq!(feed(&mut inflater, &[*last]).as_deref(), Some(READY));
    }

    #[test]
    fn test_three_chunks_only_last_has_marker() {
        let mut server = StreamCompressor::new();
        let unit = server.unit(READY);
        let third = unit.len() / 3;
        let (a, rest) = unit.split_at(third);
        let (b, c) = rest.split_at(third);

        let mut inflater = Decompressor::new();
        assert_eq!(feed(&mut inflater, a), None);
        assert_eq!(feed(&mut inflater, b), None);
        assert_eq!(feed(&mut inflater, c).as_deref(), Some(READY));
    }

    #[test]
    fn test_large_payload_spans_many_chunks() {
        let body = "x".repeat(200_000);
        let text = format!(r#"{{"op":0,"d":{{"blob":"{body}"}},"s":2,"t":"BLOB"}}"#);
        let mut server = StreamCompressor::new();
        let mut inflater = Decompressor::new();

        let mut unit = Vec::with_capacity(text.len() + 1024);
        server
            .0
            .compress_vec(text.as_bytes(), &mut unit, FlushCompress::Sync)
            .unwrap();

        assert_eq!(feed(&mut inflater, &unit).as_deref(), Some(text.as_str()));
    }

    #[test]
    fn test_corrupt_data_does_not_panic() {
        let mut inflater = Decompressor::new();
        // BTYPE=11 is reserved, so inflate fails on the first block header
        let garbage = [0xFF, 0xFF, 0xFF, 0x00, 0x00, 0xFF, 0xFF];
        assert!(feed(&mut inflater, &garbage).unwrap_or_default().is_empty());
    }

    #[test]
    fn test_corrupt_block_keeps_decoded_prefix() {
        let mut server = StreamCompressor::new();
        let mut unit = server.unit(HELLO);

        // Replace the empty stored block with one whose lengths do not match
        unit.truncate(unit.len() - SYNC_FLUSH_MARKER.len());
        unit.extend_from_slice(&[0x07, 0x00, 0x00, 0x00, 0xFF, 0xFF]);

        let mut inflater = Decompressor::new();
        assert_eq!(feed(&mut inflater, &unit).as_deref(), Some(HELLO));
        assert_eq!(inflater.buffered(), 0);
    }

    #[test]
    fn test_unterminated_stream_hits_limit() {
        let mut inflater = Decompressor::with_limit(64);

        assert_eq!(inflater.push(&[0x78, 0x9C, 0x01, 0x02]), Ok(None));
        assert_eq!(
            inflater.push(&[0xAB; 64]),
            Err(BufferOverflow {
                buffered: 68,
                limit: 64
            })
        );
        assert_eq!(inflater.buffered(), 0);
    }

    #[test]
    fn test_complete_unit_above_limit_is_accepted() {
        let mut server = StreamCompressor::new();
        let unit = server.unit(READY);
        let mut inflater = Decompressor::with_limit(unit.len() - 1);

        // The limit only applies while waiting for a marker
        assert_eq!(feed(&mut inflater, &unit).as_deref(), Some(READY));
    }

    #[test]
    fn test_zlib_header_detection() {
        assert!(is_zlib_header(0x78, 0x9C));
        assert!(is_zlib_header(0x78, 0x01));
        assert!(is_zlib_header(0x78, 0xDA));
        assert!(!is_zlib_header(0x00, 0x01));
        assert!(!is_zlib_header(0xFF, 0xFF));
    }
}
