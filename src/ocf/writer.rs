//! Container encoder
//!
//! Produces the same block layout the reader consumes. Used to build test
//! corpora and benchmark fixtures.

use super::encoding::{write_bytes, write_long};
use super::{Codec, CODEC_KEY, MAGIC, SCHEMA_KEY, SYNC_SIZE};
use crate::error::{FormatError, FormatResult};
use apache_avro::types::Value;
use apache_avro::{to_avro_datum, Schema};
use std::io::Write;

/// Records per block unless overridden
pub const DEFAULT_BLOCK_RECORDS: usize = 1000;

/// Buffers encoded records and writes them out in sync-marked blocks
pub struct ContainerWriter<W: Write> {
    sink: W,
    schema: Schema,
    codec: Codec,
    sync: [u8; SYNC_SIZE],
    metadata: Vec<(String, Vec<u8>)>,
    block_size: usize,

    /// Encoded records of the open block
    pending: Vec<u8>,
    pending_records: u64,

    /// Compressed payload scratch
    scratch: Vec<u8>,
    header_written: bool,
}

impl<W: Write> ContainerWriter<W> {
    /// Create a writer with a random sync marker and the null codec
    pub fn new(schema: &Schema, sink: W) -> Self {
        Self {
            sink,
            schema: schema.clone(),
            codec: Codec::Null,
            sync: rand::random(),
            metadata: Vec::new(),
            block_size: DEFAULT_BLOCK_RECORDS,
            pending: Vec::new(),
            pending_records: 0,
            scratch: Vec::new(),
            header_written: false,
        }
    }

    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Records per block (minimum 1)
    pub fn block_size(mut self, records: usize) -> Self {
        self.block_size = records.max(1);
        self
    }

    pub fn sync_marker(mut self, sync: [u8; SYNC_SIZE]) -> Self {
        self.sync = sync;
        self
    }

    /// Add a user metadata entry to the header
    pub fn metadata(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.metadata.push((key.into(), value));
        self
    }

    /// Encode one record, flushing a block once `block_size` records are pending
    pub fn append(&mut self, record: Value) -> FormatResult<()> {
        let encoded =
            to_avro_datum(&self.schema, record).map_err(|e| FormatError::Encode(e.to_string()))?;
        self.pending.extend_from_slice(&encoded);
        self.pending_records += 1;

        if self.pending_records >= self.block_size as u64 {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Write any pending records as a block
    pub fn flush_block(&mut self) -> FormatResult<()> {
        self.write_header()?;
        if self.pending_records == 0 {
            return Ok(());
        }

        let payload: &[u8] = match self.codec {
            Codec::Null => &self.pending,
            codec => {
                self.scratch.clear();
                codec.compress(&self.pending, &mut self.scratch)?;
                &self.scratch
            }
        };

        write_long(&mut self.sink, self.pending_records as i64)?;
        write_long(&mut self.sink, payload.len() as i64)?;
        self.sink.write_all(payload)?;
        self.sink.write_all(&self.sync)?;

        self.pending.clear();
        self.pending_records = 0;
        Ok(())
    }

    /// Flush the last block and return the sink
    pub fn finish(mut self) -> FormatResult<W> {
        self.flush_block()?;
        self.sink.flush()?;
        Ok(self.sink)
    }

    fn write_header(&mut self) -> FormatResult<()> {
        if self.header_written {
            return Ok(());
        }

        let schema_json =
            serde_json::to_string(&self.schema).map_err(|e| FormatError::Encode(e.to_string()))?;

        self.sink.write_all(&MAGIC)?;
        write_long(&mut self.sink, 2 + self.metadata.len() as i64)?;
        write_bytes(&mut self.sink, SCHEMA_KEY.as_bytes())?;
        write_bytes(&mut self.sink, schema_json.as_bytes())?;
        write_bytes(&mut self.sink, CODEC_KEY.as_bytes())?;
        write_bytes(&mut self.sink, self.codec.name().as_bytes())?;
        for (key, value) in &self.metadata {
            write_bytes(&mut self.sink, key.as_bytes())?;
            write_bytes(&mut self.sink, value)?;
        }
        write_long(&mut self.sink, 0)?;
        self.sink.write_all(&self.sync)?;

        self.header_written = true;
        Ok(())
    }
}
