//! Streaming container reader
//!
//! The reader pulls one block at a time from the underlying stream and yields
//! its records one by one. A block is read in full and its trailing sync
//! marker verified before any of its records is handed out, so a corrupt
//! block never produces partial output.

use super::encoding;
use super::{Codec, Header, SYNC_SIZE};
use crate::error::{FormatError, FormatResult};
use apache_avro::types::Value;
use apache_avro::{from_avro_datum, Schema};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::iter::FusedIterator;

/// Lazy, forward-only decoder over one container stream
///
/// Yields `Ok(record)` in block order, then in-block order. The first error
/// ends the sequence; records already yielded stay valid. Re-reading an
/// object means opening a new stream and constructing a new reader.
pub struct ContainerReader<R> {
    /// Source stream
    reader: R,

    /// Parsed header
    header: Header,

    /// Decompressed payload of the current block
    block: Cursor<Vec<u8>>,

    /// Compressed payload scratch, reused across blocks
    compressed: Vec<u8>,

    /// Records left in the current block
    remaining: u64,

    /// Blocks fully read and verified
    blocks_read: u64,

    /// Records yielded so far
    records_read: u64,

    /// Set after end of stream or the first error
    done: bool,
}

impl<R: Read> ContainerReader<R> {
    /// Read the header and prepare to decode blocks
    pub fn new(mut reader: R) -> FormatResult<Self> {
        let header = Header::read(&mut reader)?;

        Ok(Self {
            reader,
            header,
            block: Cursor::new(Vec::new()),
            compressed: Vec::new(),
            remaining: 0,
            blocks_read: 0,
            records_read: 0,
            done: false,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn schema(&self) -> &Schema {
        &self.header.schema
    }

    pub fn codec(&self) -> Codec {
        self.header.codec
    }

    pub fn sync_marker(&self) -> &[u8; SYNC_SIZE] {
        &self.header.sync
    }

    pub fn metadata(&self) -> &HashMap<String, Vec<u8>> {
        &self.header.metadata
    }

    /// Number of blocks read and verified so far
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Number of records yielded so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Load the next block
    ///
    /// Returns `Ok(false)` on a clean end of stream at a block boundary.
    fn next_block(&mut self) -> FormatResult<bool> {
        let leftover = self.block.get_ref().len() as u64 - self.block.position();
        if leftover > 0 {
            return Err(FormatError::TrailingBytes {
                block: self.blocks_read.saturating_sub(1),
                remaining: leftover,
            });
        }

        let block = self.blocks_read;

        let count = match encoding::read_long_or_eof(&mut self.reader, "block record count")? {
            Some(count) => count,
            None => return Ok(false),
        };
        let count = u64::try_from(count).map_err(|_| FormatError::InvalidLength {
            context: "block record count",
            value: count,
        })?;

        let size = encoding::read_long(&mut self.reader, "block size")?;
        let size = u64::try_from(size).map_err(|_| FormatError::InvalidLength {
            context: "block size",
            value: size,
        })?;

        let codec = self.header.codec;
        let target = match codec {
            Codec::Null => self.block.get_mut(),
            _ => &mut self.compressed,
        };
        encoding::read_exact_into(&mut self.reader, size, "block data", target)?;

        let mut sync = [0u8; SYNC_SIZE];
        self.reader
            .read_exact(&mut sync)
            .map_err(|e| FormatError::from_read(e, "block sync marker"))?;
        if sync != self.header.sync {
            return Err(FormatError::SyncMismatch { block });
        }

        if codec != Codec::Null {
            let payload = self.block.get_mut();
            payload.clear();
            codec
                .decompress(&self.compressed, payload)
                .map_err(|e| FormatError::Decompress {
                    block,
                    reason: e.to_string(),
                })?;
        }

        self.block.set_position(0);
        self.remaining = count;
        self.blocks_read += 1;
        Ok(true)
    }
}

impl<R: Read> Iterator for ContainerReader<R> {
    type Item = FormatResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while self.remaining == 0 {
            match self.next_block() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        match from_avro_datum(&self.header.schema, &mut self.block, None) {
            Ok(value) => {
                self.remaining -= 1;
                self.records_read += 1;
                Some(Ok(value))
            }
            Err(e) => {
                self.done = true;
                Some(Err(FormatError::Datum {
                    block: self.blocks_read - 1,
                    record: self.records_read,
                    reason: e.to_string(),
                }))
            }
        }
    }
}

impl<R: Read> FusedIterator for ContainerReader<R> {}
