use std::fmt;
use std::io;

use crate::BufferedReader;

/// Restricts an underlying `BufferedReader` to at most `limit` more bytes.
///
/// Used to bound a sub-parser to the declared length of a segment or packet
/// body without requiring the sub-parser to track the boundary itself: once
/// `limit` bytes have been read, this reader reports EOF, regardless of how
/// much data the underlying reader actually has left.
pub struct Limitor<'a, C> {
    inner: Box<dyn BufferedReader<C> + 'a>,
    limit: u64,
}

impl<'a, C> fmt::Debug for Limitor<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Limitor")
            .field("limit", &self.limit)
            .field("inner", &self.inner)
            .finish()
    }
}

impl<'a, C> Limitor<'a, C> {
    /// Creates a new limiting reader that will yield at most `limit` bytes
    /// from `inner`.
    pub fn new(inner: Box<dyn BufferedReader<C> + 'a>, limit: u64) -> Self {
        Limitor { inner, limit }
    }

    /// Returns the number of bytes still permitted to be read.
    pub fn remaining(&self) -> u64 {
        self.limit
    }
}

impl<'a, C> io::Read for Limitor<'a, C> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let max = std::cmp::min(out.len() as u64, self.limit) as usize;
        let n = self.inner.read(&mut out[..max])?;
        self.limit -= n as u64;
        Ok(n)
    }
}

impl<'a, C> BufferedReader<C> for Limitor<'a, C> {
    fn buffer(&self) -> &[u8] {
        let max = std::cmp::min(self.inner.buffer().len() as u64, self.limit) as usize;
        &self.inner.buffer()[..max]
    }

    fn data(&mut self, amount: usize) -> io::Result<&[u8]> {
        let capped = std::cmp::min(amount as u64, self.limit) as usize;
        let got = self.inner.data(capped)?.len();
        let max = std::cmp::min(got as u64, self.limit) as usize;
        Ok(&self.inner.buffer()[..max])
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        assert!((amount as u64) <= self.limit);
        self.limit -= amount as u64;
        self.inner.consume(amount)
    }

    fn into_inner<'b>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'b>>
    where
        Self: 'b,
    {
        Some(self.inner)
    }

    fn cookie_ref(&self) -> &C {
        self.inner.cookie_ref()
    }

    fn cookie_mut(&mut self) -> &mut C {
        self.inner.cookie_mut()
    }

    fn cookie_set(&mut self, cookie: C) -> C {
        self.inner.cookie_set(cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Memory;

    #[test]
    fn caps_at_limit() {
        let inner: Box<dyn BufferedReader<()>> = Box::new(Memory::new(b"0123456789"));
        let mut lim = Limitor::new(inner, 4);
        assert_eq!(lim.data(10).unwrap(), b"0123");
        lim.consume(4);
        assert!(lim.data(1).unwrap().is_empty());
    }
}
