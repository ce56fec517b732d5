//! Adapters over an opaque byte source.
//!
//! Neither adapter interprets the bytes flowing through it. [`LimitReader`]
//! bounds how much of the source a chunk body may consume, and
//! [`ContextReader`] remembers enough about the stream to decorate errors
//! with a useful diagnostic.

use std::io::{self, Read};

use crate::error::{Error, ReadContext};

/// How many trailing bytes the context reader keeps for diagnostics.
const CONTEXT_TAIL_BYTES: usize = 64;

/// A reader that yields at most a fixed number of bytes from its source,
/// reporting end-of-stream once the window is exhausted.
///
/// Chunk bodies are parsed through one of these so that a malformed body can
/// never read past its declared length into the next chunk.
#[derive(Debug)]
pub struct LimitReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> LimitReader<R> {
    /// Create a window over `inner` that ends after `limit` bytes.
    pub fn new(inner: R, limit: u64) -> LimitReader<R> {
        LimitReader {
            inner,
            remaining: limit,
        }
    }

    /// How many bytes of the window are left.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Read and discard the rest of the window, returning how many bytes
    /// were actually consumed (fewer than `remaining` if the source ended).
    pub fn skip_remaining(&mut self) -> io::Result<u64> {
        io::copy(self, &mut io::sink())
    }
}

impl<R: Read> Read for LimitReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let cap = buf.len().min(self.remaining as usize);
        let n = self.inner.read(&mut buf[..cap])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// A reader that counts every byte it hands out and keeps a rolling tail of
/// the last [`CONTEXT_TAIL_BYTES`] of them.
///
/// [`wrap`](ContextReader::wrap) decorates an error with that context,
/// producing diagnostics of the form `after K bytes (last: ...): <err>`.
#[derive(Debug)]
pub struct ContextReader<R> {
    inner: R,
    total: u64,
    tail: Vec<u8>,
}

impl<R: Read> ContextReader<R> {
    pub fn new(inner: R) -> ContextReader<R> {
        ContextReader {
            inner,
            total: 0,
            tail: Vec::with_capacity(CONTEXT_TAIL_BYTES),
        }
    }

    /// Total number of bytes read through this adapter so far.
    pub fn bytes_read(&self) -> u64 {
        self.total
    }

    /// Attach the current position and byte tail to `err`.
    pub fn wrap(&self, err: Error) -> Error {
        err.with_context(ReadContext {
            offset: self.total,
            tail: self.tail.clone(),
        })
    }
}

impl<R: Read> Read for ContextReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.total += n as u64;
        if n > 0 {
            self.tail.extend_from_slice(&buf[..n]);
            if self.tail.len() > CONTEXT_TAIL_BYTES {
                let excess = self.tail.len() - CONTEXT_TAIL_BYTES;
                self.tail.drain(..excess);
            }
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_reader_stops_at_window_end() {
        let mut source: &[u8] = b"helloworld";
        let mut limited = LimitReader::new(&mut source, 5);

        let mut buf = [0u8; 1000];
        let n = limited.read(&mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf[..n], b"hello");

        assert_eq!(limited.read(&mut buf).unwrap(), 0);
        assert_eq!(limited.remaining(), 0);
    }

    #[test]
    fn limit_reader_skips_rest_of_window() {
        let mut source: &[u8] = b"0123456789";
        let mut limited = LimitReader::new(&mut source, 6);

        let mut buf = [0u8; 2];
        limited.read(&mut buf).unwrap();
        assert_eq!(limited.skip_remaining().unwrap(), 4);
        assert_eq!(source, b"6789");
    }

    #[test]
    fn context_reader_keeps_rolling_tail() {
        let data: Vec<u8> = (0u8..=199).collect();
        let mut reader = ContextReader::new(&data[..]);
        let mut buf = [0u8; 7];
        while reader.read(&mut buf).unwrap() > 0 {}

        assert_eq!(reader.bytes_read(), 200);
        let err = reader.wrap(crate::ErrorKind::TruncatedVarint.into());
        let msg = err.to_string();
        assert!(msg.starts_with("after 200 bytes (last:"), "{msg}");
        // The tail holds bytes 136..=199.
        assert!(msg.contains(" 88 89 "), "{msg}");
        assert!(msg.ends_with("c7): stream ended in the middle of a varint"), "{msg}");
    }
}
