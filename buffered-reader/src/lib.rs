//! A `BufferedReader` is a super-powered `Read`er.
//!
//! Like the [`BufRead`] trait, the `BufferedReader` trait has an internal
//! buffer that is directly exposed to the user. This design enables two
//! performance optimizations. First, the use of an internal buffer
//! amortizes system calls. Second, exposing the internal buffer allows the
//! user to work with data in place, which avoids another copy.
//!
//! Unlike [`BufRead`], a `BufferedReader` lets the caller grow the internal
//! buffer to an arbitrary size at read time (`data(amount)`), which makes it
//! practical to build resumable, stackable parsers: a framing layer (e.g. a
//! length-prefixed chunk format) can be stacked on top of a decompression
//! layer, which is stacked on top of the raw byte source, and each layer
//! only pulls as much as it needs from the one below it.
//!
//! This crate is deliberately small: it keeps the parts of the original
//! `BufferedReader` design that the rest of the workspace actually reuses
//! (in particular, as the byte source that the envelope engine's
//! decompression filters read from on the decode path) and drops the
//! backends (file, URL, dup, EOF-fencing) that nothing here needs.
//!
//! [`BufRead`]: std::io::BufRead

#![warn(missing_docs)]

use std::cmp;
use std::fmt;
use std::io;

mod generic;
mod memory;
mod limitor;
#[cfg(feature = "compression-deflate")]
mod deflate;
#[cfg(feature = "compression-bzip2")]
mod bzip;

pub use generic::Generic;
pub use memory::Memory;
pub use limitor::Limitor;
#[cfg(feature = "compression-deflate")]
pub use deflate::Zlib;
#[cfg(feature = "compression-bzip2")]
pub use bzip::Bzip;

/// The default size of a fresh internal buffer.
const DEFAULT_BUF_SIZE: usize = 8 * 1024;

/// The generic `BufferedReader` interface.
///
/// `C` is a "cookie": arbitrary state that a caller can stash alongside a
/// reader in a stack of readers, and recover later via [`cookie_ref`] without
/// knowing the concrete type of the reader holding it.
///
/// [`cookie_ref`]: BufferedReader::cookie_ref
pub trait BufferedReader<C = ()>: io::Read + fmt::Debug {
    /// Returns a reference to the internal buffer.
    ///
    /// This returns the same data as `self.data(0)`, but without requiring
    /// a mutable borrow of `self`.
    fn buffer(&self) -> &[u8];

    /// Ensures that the internal buffer has at least `amount` bytes of
    /// data, and returns it.
    ///
    /// If the internal buffer contains less than `amount` bytes, it is
    /// refilled first. The returned slice may be longer than `amount`
    /// (everything currently buffered is always returned), but is shorter
    /// only at EOF. This does not advance the read cursor; use
    /// [`consume`](Self::consume) for that.
    fn data(&mut self, amount: usize) -> io::Result<&[u8]>;

    /// Like [`data`](Self::data), but returns
    /// [`UnexpectedEof`](io::ErrorKind::UnexpectedEof) if fewer than
    /// `amount` bytes are available.
    fn data_hard(&mut self, amount: usize) -> io::Result<&[u8]> {
        let len = self.data(amount)?.len();
        if len < amount {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, got {}", amount, len),
            ));
        }
        Ok(&self.buffer()[..len.max(amount)])
    }

    /// Marks `amount` bytes of the internal buffer as read.
    ///
    /// `amount` must not exceed the length of the slice returned by the
    /// most recent call to `data`/`data_hard`.
    fn consume(&mut self, amount: usize) -> &[u8];

    /// Reads and consumes `amount` bytes, returning owned data when the
    /// underlying storage can't hand back a borrow of that length.
    fn data_consume(&mut self, amount: usize) -> io::Result<Vec<u8>> {
        let len = self.data(amount)?.len().min(amount);
        Ok(self.consume(len).to_vec())
    }

    /// Like [`data_consume`](Self::data_consume), but requires exactly
    /// `amount` bytes to be available.
    fn data_consume_hard(&mut self, amount: usize) -> io::Result<Vec<u8>> {
        self.data_hard(amount)?;
        Ok(self.consume(amount).to_vec())
    }

    /// Reads a single byte, advancing the cursor.
    fn eof(&mut self) -> io::Result<bool> {
        Ok(self.data(1)?.is_empty())
    }

    /// Discards the rest of the stream without copying it anywhere.
    ///
    /// Useful after a parse error, to skip to the end of a bounded
    /// sub-reader (e.g. a [`Limitor`]) before recovering the underlying
    /// reader with [`into_inner`](Self::into_inner).
    fn drop_eof(&mut self) -> io::Result<()> {
        let mut buf = [0u8; 4096];
        loop {
            let n = self.read(&mut buf)?;
            if n == 0 {
                return Ok(());
            }
        }
    }

    /// Recovers the reader that this one wraps, if any.
    ///
    /// Consumes `self`. Implementations that don't wrap another reader
    /// return `None`.
    fn into_inner<'a>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'a>>
    where
        Self: 'a;

    /// Returns a reference to this reader's cookie.
    fn cookie_ref(&self) -> &C;

    /// Returns a mutable reference to this reader's cookie.
    fn cookie_mut(&mut self) -> &mut C;

    /// Replaces this reader's cookie, returning the old one.
    fn cookie_set(&mut self, cookie: C) -> C;
}

/// Reads the remainder of `r` into a freshly allocated buffer.
///
/// Convenience used by tests and by small, one-shot callers; real parsers
/// should prefer `data`/`consume` to avoid the extra copy.
pub fn read_to_end<C>(r: &mut dyn BufferedReader<C>) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = r.read(&mut chunk)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&chunk[..n]);
    }
}

/// Grows `buf` to contain at least `amount` bytes by reading from `source`,
/// shared by the [`Generic`] and [`Memory`] backends.
fn fill<R: io::Read>(
    source: &mut R,
    buf: &mut Vec<u8>,
    cursor: usize,
    amount: usize,
    eof: &mut bool,
) -> io::Result<()> {
    while !*eof && buf.len() - cursor < amount {
        let start = buf.len();
        let want = cmp::max(amount - (buf.len() - cursor), DEFAULT_BUF_SIZE);
        buf.resize(start + want, 0);
        loop {
            match source.read(&mut buf[start..]) {
                Ok(0) => {
                    *eof = true;
                    buf.truncate(start);
                    break;
                }
                Ok(n) => {
                    buf.truncate(start + n);
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}
