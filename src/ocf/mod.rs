//! Avro object container decoding and encoding
//!
//! An object container is a self-describing file: a header carrying the
//! writer schema and codec, followed by blocks of serialized records. Every
//! block is framed by the same 16-byte sync marker that the header declares.
//!
//! # Layout
//!
//! ```text
//! ┌──────────┬──────────────────────────┬──────────────┐
//! │ Obj\x01  │ metadata map<bytes>      │ sync (16 B)  │   header
//! └──────────┴──────────────────────────┴──────────────┘
//! ┌──────────┬──────────┬─────────────────┬────────────┐
//! │ count    │ size     │ payload (codec) │ sync (16 B)│   block 0
//! └──────────┴──────────┴─────────────────┴────────────┘
//!                          ...                            block N
//! ```
//!
//! `count` and `size` are zigzag varints. The payload is `count` records
//! back to back, compressed as a unit when the codec is not `null`.
//!
//! # Example
//!
//! ```no_run
//! use avro_bandwidth::ocf::ContainerReader;
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! let file = BufReader::new(File::open("part-0000.avro").unwrap());
//! let reader = ContainerReader::new(file).unwrap();
//! for record in reader {
//!     println!("{:?}", record.unwrap());
//! }
//! ```

mod codec;
mod encoding;
mod reader;
pub mod writer;

#[cfg(test)]
pub(crate) mod fixtures;

use crate::error::{FormatError, FormatResult};
use apache_avro::Schema;
use std::collections::HashMap;
use std::io::Read;

pub use codec::{Codec, MAX_BLOCK_BYTES};
pub use reader::ContainerReader;
pub use writer::ContainerWriter;

/// Leading bytes of every container
pub const MAGIC: [u8; 4] = [b'O', b'b', b'j', 1];

/// Length of the sync marker
pub const SYNC_SIZE: usize = 16;

/// Metadata key holding the writer schema JSON
pub const SCHEMA_KEY: &str = "avro.schema";

/// Metadata key holding the codec name
pub const CODEC_KEY: &str = "avro.codec";

/// The header as read from a container
#[derive(Debug, Clone)]
pub struct Header {
    /// Schema the records were written with
    pub schema: Schema,

    /// Block compression codec
    pub codec: Codec,

    /// Marker repeated after every block
    pub sync: [u8; SYNC_SIZE],

    /// All header metadata, including the reserved `avro.*` keys
    pub metadata: HashMap<String, Vec<u8>>,
}

impl Header {
    /// Read and validate a header from the start of a stream
    pub fn read<R: Read>(reader: &mut R) -> FormatResult<Self> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| FormatError::from_read(e, "magic"))?;
        if magic != MAGIC {
            return Err(FormatError::BadMagic { found: magic });
        }

        let metadata = read_metadata(reader)?;

        let schema_json = metadata.get(SCHEMA_KEY).ok_or(FormatError::MissingSchema)?;
        let schema_json = std::str::from_utf8(schema_json)
            .map_err(|e| FormatError::InvalidSchema(e.to_string()))?;
        let schema =
            Schema::parse_str(schema_json).map_err(|e| FormatError::InvalidSchema(e.to_string()))?;

        // Absent codec means null
        let codec = match metadata.get(CODEC_KEY) {
            Some(name) => Codec::from_name(&String::from_utf8_lossy(name))?,
            None => Codec::Null,
        };

        let mut sync = [0u8; SYNC_SIZE];
        reader
            .read_exact(&mut sync)
            .map_err(|e| FormatError::from_read(e, "header sync marker"))?;

        Ok(Self {
            schema,
            codec,
            sync,
            metadata,
        })
    }
}

/// Read the block-encoded `map<bytes>` that follows the magic
fn read_metadata<R: Read>(reader: &mut R) -> FormatResult<HashMap<String, Vec<u8>>> {
    let mut metadata = HashMap::new();
    let mut key = Vec::new();

    loop {
        let count = encoding::read_long(reader, "metadata block count")?;
        if count == 0 {
            break;
        }
        if count < 0 {
            // Negative count is followed by the block's byte size, which we don't need
            encoding::read_long(reader, "metadata block size")?;
        }

        for _ in 0..count.unsigned_abs() {
            encoding::read_len_prefixed(reader, "metadata key", &mut key)?;
            let name = String::from_utf8(std::mem::take(&mut key))
                .map_err(|e| FormatError::InvalidMetadata(e.to_string()))?;

            let mut value = Vec::new();
            encoding::read_len_prefixed(reader, "metadata value", &mut value)?;
            metadata.insert(name, value);
        }
    }

    Ok(metadata)
}
