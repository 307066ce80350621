use std::fmt;
use std::io;

use crate::{fill, BufferedReader};

/// Wraps an arbitrary [`io::Read`]er as a `BufferedReader`.
///
/// This is the bottom of most reader stacks: a file, a socket, or a `&[u8]`
/// wrapped in [`Memory`](crate::Memory) for the common in-memory case.
pub struct Generic<T, C> {
    reader: T,
    buf: Vec<u8>,
    cursor: usize,
    eof: bool,
    cookie: C,
}

impl<T: fmt::Debug, C> fmt::Debug for Generic<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Generic")
            .field("reader", &self.reader)
            .field("buffered", &(self.buf.len() - self.cursor))
            .field("eof", &self.eof)
            .finish()
    }
}

impl<T: io::Read> Generic<T, ()> {
    /// Creates a new reader with no cookie.
    pub fn new(reader: T) -> Self {
        Self::with_cookie(reader, ())
    }
}

impl<T: io::Read, C> Generic<T, C> {
    /// Creates a new reader, attaching `cookie`.
    pub fn with_cookie(reader: T, cookie: C) -> Self {
        Generic {
            reader,
            buf: Vec::new(),
            cursor: 0,
            eof: false,
            cookie,
        }
    }
}

impl<T: io::Read, C> io::Read for Generic<T, C> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.cursor == self.buf.len() {
            // Buffer is drained; read directly into the caller's slice to
            // avoid an extra copy for the common large-read case.
            self.buf.clear();
            self.cursor = 0;
            return self.reader.read(out);
        }
        let n = std::cmp::min(out.len(), self.buf.len() - self.cursor);
        out[..n].copy_from_slice(&self.buf[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }
}

impl<T: io::Read, C> BufferedReader<C> for Generic<T, C> {
    fn buffer(&self) -> &[u8] {
        &self.buf[self.cursor..]
    }

    fn data(&mut self, amount: usize) -> io::Result<&[u8]> {
        fill(&mut self.reader, &mut self.buf, self.cursor, amount, &mut self.eof)?;
        Ok(&self.buf[self.cursor..])
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        assert!(self.cursor + amount <= self.buf.len());
        let start = self.cursor;
        self.cursor += amount;
        if self.cursor == self.buf.len() {
            self.buf.clear();
            self.cursor = 0;
            return &[];
        }
        &self.buf[start..start + amount]
    }

    fn into_inner<'a>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'a>>
    where
        Self: 'a,
    {
        None
    }

    fn cookie_ref(&self) -> &C {
        &self.cookie
    }

    fn cookie_mut(&mut self) -> &mut C {
        &mut self.cookie
    }

    fn cookie_set(&mut self, cookie: C) -> C {
        std::mem::replace(&mut self.cookie, cookie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_fill_and_consume() {
        let mut r = Generic::new(&b"0123456789"[..]);
        assert_eq!(r.data(4).unwrap(), b"0123");
        // Repeated calls for the same amount return the same slice.
        assert_eq!(r.data(4).unwrap(), b"0123");
        r.consume(2);
        assert_eq!(r.buffer(), b"23456789");
        assert!(r.data_hard(20).is_err());
    }
}
