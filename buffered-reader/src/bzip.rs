use std::fmt;
use std::io;

use bzip2::read::BzDecoder;

use crate::{BufferedReader, Generic};

struct ReadAdapter<'a>(Box<dyn BufferedReader<()> + 'a>);

impl<'a> io::Read for ReadAdapter<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

/// Decompresses a bzip2 stream read from an inner `BufferedReader`.
///
/// PGP's `CompressionAlgorithm::BZip2` is the only BZip2 use in this
/// workspace; CMS compressed-data doesn't name a fixed algorithm table the
/// way PGP does.
pub struct Bzip<'a> {
    inner: Generic<BzDecoder<ReadAdapter<'a>>, ()>,
}

impl<'a> fmt::Debug for Bzip<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Bzip").finish()
    }
}

impl<'a> Bzip<'a> {
    /// Wraps `inner`, decompressing what it yields.
    pub fn new(inner: Box<dyn BufferedReader<()> + 'a>) -> Self {
        Bzip {
            inner: Generic::new(BzDecoder::new(ReadAdapter(inner))),
        }
    }
}

impl<'a> io::Read for Bzip<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl<'a> BufferedReader<()> for Bzip<'a> {
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
