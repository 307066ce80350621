//! Compression, as an optional pre-action ahead of encryption (spec §3
//! usage table). Uses raw deflate (no zlib/gzip header) via `flate2`'s
//! low-level `Compress`/`Decompress`, which is fed incrementally and so
//! fits the engine's segment-at-a-time push/pop loop without needing a
//! full in-memory payload up front.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::error::{Error, Result};

/// An incremental compressor. One instance per envelope for its lifetime.
pub struct Compressor {
    inner: Compress,
}

impl Compressor {
    pub fn new() -> Self {
        Compressor {
            inner: Compress::new(Compression::default(), false),
        }
    }

    /// Compresses as much of `input` as fits in `output`, appending to
    /// `output`. Returns the number of input bytes consumed.
    pub fn compress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<usize> {
        let in_before = self.inner.total_in();
        let out_before = self.inner.total_out();
        let tail_start = output.len();
        output.resize(tail_start + input.len() + 64, 0);
        let status = self
            .inner
            .compress(input, &mut output[tail_start..], FlushCompress::None)
            .map_err(|e| Error::BadData(e.to_string()))?;
        let produced = (self.inner.total_out() - out_before) as usize;
        output.truncate(tail_start + produced);
        if matches!(status, Status::BufError) {
            return Err(Error::Overflow);
        }
        Ok((self.inner.total_in() - in_before) as usize)
    }

    /// Drains any buffered output, finishing the deflate stream.
    pub fn finish(&mut self, output: &mut Vec<u8>) -> Result<()> {
        loop {
            let out_before = self.inner.total_out();
            let tail_start = output.len();
            output.resize(tail_start + 4096, 0);
            let status = self
                .inner
                .compress(&[], &mut output[tail_start..], FlushCompress::Finish)
                .map_err(|e| Error::BadData(e.to_string()))?;
            let produced = (self.inner.total_out() - out_before) as usize;
            output.truncate(tail_start + produced);
            if status == Status::StreamEnd {
                return Ok(());
            }
        }
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

/// An incremental decompressor.
pub struct Decompressor {
    inner: Decompress,
}

impl Decompressor {
    pub fn new() -> Self {
        Decompressor {
            inner: Decompress::new(false),
        }
    }

    /// Decompresses as much of `input` as fits in `output`, appending to
    /// `output`. Returns `(bytes_consumed, stream_finished)`.
    pub fn decompress(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<(usize, bool)> {
        let in_before = self.inner.total_in();
        let out_before = self.inner.total_out();
        let tail_start = output.len();
        output.resize(tail_start + input.len().max(64) + 64, 0);
        let status = self
            .inner
            .decompress(input, &mut output[tail_start..], FlushDecompress::None)
            .map_err(|e| Error::BadData(e.to_string()))?;
        let produced = (self.inner.total_out() - out_before) as usize;
        output.truncate(tail_start + produced);
        Ok(((self.inner.total_in() - in_before) as usize, status == Status::StreamEnd))
    }
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_decompress_round_trips() {
        let mut compressor = Compressor::new();
        let mut compressed = Vec::new();
        let input = b"the quick brown fox jumps over the lazy dog, repeatedly, to give deflate something to chew on: the quick brown fox jumps over the lazy dog";
        let mut offset = 0;
        while offset < input.len() {
            offset += compressor.compress(&input[offset..], &mut compressed).unwrap();
        }
        compressor.finish(&mut compressed).unwrap();

        let mut decompressor = Decompressor::new();
        let mut output = Vec::new();
        let mut offset = 0;
        loop {
            let (consumed, finished) = decompressor
                .decompress(&compressed[offset..], &mut output)
                .unwrap();
            offset += consumed;
            if finished || (consumed == 0 && offset >= compressed.len()) {
                break;
            }
        }
        assert_eq!(output, input);
    }
}
