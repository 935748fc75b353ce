//! Per-worker stream buffering
//!
//! Each worker owns one [`ReadBuffer`], allocated once and attached to every
//! object it opens. Attaching discards whatever the previous object left in
//! the buffer, so no bytes ever leak from one object into the next.

use std::io::{self, BufRead, Read};
use std::sync::atomic::{AtomicU64, Ordering};

/// Reusable read buffer
#[derive(Debug)]
pub struct ReadBuffer {
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
}

impl ReadBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity.max(1)].into_boxed_slice(),
            pos: 0,
            filled: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes read ahead from the attached stream but not yet consumed
    pub fn buffered(&self) -> usize {
        self.filled - self.pos
    }

    /// Reset to empty and start buffering `inner`
    pub fn attach<R: Read>(&mut self, inner: R) -> BufferedStream<'_, R> {
        self.pos = 0;
        self.filled = 0;
        BufferedStream {
            buffer: self,
            inner,
        }
    }
}

/// A stream read through a borrowed [`ReadBuffer`]
pub struct BufferedStream<'a, R> {
    buffer: &'a mut ReadBuffer,
    inner: R,
}

impl<R: Read> Read for BufferedStream<'_, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        // Large reads skip the copy when nothing is buffered
        if self.buffer.pos == self.buffer.filled && out.len() >= self.buffer.capacity() {
            return self.inner.read(out);
        }

        let available = self.fill_buf()?;
        let n = available.len().min(out.len());
        out[..n].copy_from_slice(&available[..n]);
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for BufferedStream<'_, R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        let buffer = &mut *self.buffer;
        if buffer.pos >= buffer.filled {
            buffer.filled = self.inner.read(&mut buffer.buf)?;
            buffer.pos = 0;
        }
        Ok(&buffer.buf[buffer.pos..buffer.filled])
    }

    fn consume(&mut self, amt: usize) {
        self.buffer.pos = (self.buffer.pos + amt).min(self.buffer.filled);
    }
}

/// Counts bytes pulled from the inner stream into a shared counter
pub struct CountingReader<'a, R> {
    inner: R,
    bytes: &'a AtomicU64,
}

impl<'a, R> CountingReader<'a, R> {
    #[inline]
    pub fn new(inner: R, bytes: &'a AtomicU64) -> Self {
        Self { inner, bytes }
    }
}

impl<R: Read> Read for CountingReader<'_, R> {
    #[inline]
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(out)?;
        self.bytes.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_read_all() {
        let data: Vec<u8> = (0..=255).cycle().take(10_000).collect();
        let mut buffer = ReadBuffer::new(64);
        let mut out = Vec::new();
        buffer.attach(data.as_slice()).read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_large_read_bypasses_buffer() {
        let data = vec![7u8; 256];
        let mut buffer = ReadBuffer::new(16);
        let mut stream = buffer.attach(data.as_slice());
        let mut out = vec![0u8; 128];
        assert_eq!(stream.read(&mut out).unwrap(), 128);
        drop(stream);
        assert_eq!(buffer.buffered(), 0);
    }

    #[test]
    fn test_attach_discards_previous_object() {
        let first = b"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
        let second = b"BBBBBBBB";
        let mut buffer = ReadBuffer::new(16);

        // Leave read-ahead bytes from the first object behind
        let mut stream = buffer.attach(&first[..]);
        let mut head = [0u8; 3];
        stream.read_exact(&mut head).unwrap();
        drop(stream);
        assert_eq!(buffer.buffered(), 13);

        let mut out = Vec::new();
        buffer.attach(&second[..]).read_to_end(&mut out).unwrap();
        assert_eq!(out, second);
    }

    #[test]
    fn test_counting_reader() {
        let counter = AtomicU64::new(5);
        let mut reader = CountingReader::new(&b"hello world"[..], &counter);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn test_bufread_lines() {
        let mut buffer = ReadBuffer::new(4);
        let lines: Vec<String> = buffer
            .attach(&b"one\ntwo\nthree"[..])
            .lines()
            .map(|l| l.unwrap())
            .collect();
        assert_eq!(lines, vec!["one", "two", "three"]);
    }
}
