use std::fmt;
use std::io;

use flate2::read::ZlibDecoder;

use crate::{BufferedReader, Generic};

/// Adapts a boxed `BufferedReader` trait object to plain `io::Read`, since
/// `ZlibDecoder` only needs `Read`.
struct ReadAdapter<'a>(Box<dyn BufferedReader<()> + 'a>);

impl<'a> io::Read for ReadAdapter<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

/// Decompresses a zlib (RFC 1950) stream read from an inner
/// `BufferedReader`.
///
/// Used by the envelope engine's decoder to unwrap CMS/PGP
/// compressed-data content: the segment framer hands the compressed
/// segments to this reader, and the rest of the decode pipeline reads
/// plaintext from it, unaware that compression is involved.
pub struct Zlib<'a> {
    inner: Generic<ZlibDecoder<ReadAdapter<'a>>, ()>,
}

impl<'a> fmt::Debug for Zlib<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Zlib").finish()
    }
}

impl<'a> Zlib<'a> {
    /// Wraps `inner`, decompressing what it yields.
    pub fn new(inner: Box<dyn BufferedReader<()> + 'a>) -> Self {
        Zlib {
            inner: Generic::new(ZlibDecoder::new(ReadAdapter(inner))),
        }
    }
}

impl<'a> io::Read for Zlib<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<'a> BufferedReader<()> for Zlib<'a> {
    fn buffer(&self) -> &[u8] {
        self.inner.buffer()
    }

    fn data(&mut self, amount: usize) -> io::Result<&[u8]> {
        self.inner.data(amount)
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        self.inner.consume(amount)
    }

    fn into_inner<'b>(self: Box<Self>) -> Option<Box<dyn BufferedReader<()> + 'b>>
    where
        Self: 'b,
    {
        None
    }

    fn cookie_ref(&self) -> &() {
        self.inner.cookie_ref()
    }

    fn cookie_mut(&mut self) -> &mut () {
        self.inner.cookie_mut()
    }

    fn cookie_set(&mut self, cookie: ()) -> () {
        self.inner.cookie_set(cookie)
    }
}
