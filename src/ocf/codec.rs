//! Block compression codecs

use crate::error::{FormatError, FormatResult};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::fmt;
use std::io::{self, Read, Write};

/// Largest decompressed block payload accepted
pub const MAX_BLOCK_BYTES: usize = 512 * 1024 * 1024;

/// Length of the big-endian CRC32 trailing every snappy block
const SNAPPY_CRC_SIZE: usize = 4;

/// Compression applied to each block payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Payload stored as-is
    #[default]
    Null,
    /// Raw DEFLATE (RFC 1951), no zlib header
    Deflate,
    /// Raw snappy followed by a CRC32 of the uncompressed payload
    Snappy,
}

impl Codec {
    /// Resolve the `avro.codec` header value
    pub fn from_name(name: &str) -> FormatResult<Self> {
        match name {
            "null" => Ok(Codec::Null),
            "deflate" => Ok(Codec::Deflate),
            "snappy" => Ok(Codec::Snappy),
            other => Err(FormatError::UnsupportedCodec(other.to_string())),
        }
    }

    /// Name as written in the header
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Null => "null",
            Codec::Deflate => "deflate",
            Codec::Snappy => "snappy",
        }
    }

    /// Append the decompressed form of `input` to `output`
    pub fn decompress(&self, input: &[u8], output: &mut Vec<u8>) -> io::Result<()> {
        self.decompress_with_limit(input, output, MAX_BLOCK_BYTES)
    }

    /// Like [`Codec::decompress`], failing once the payload exceeds `limit` bytes
    pub fn decompress_with_limit(
        &self,
        input: &[u8],
        output: &mut Vec<u8>,
        limit: usize,
    ) -> io::Result<()> {
        match self {
            Codec::Null => {
                check_limit(input.len(), limit)?;
                output.extend_from_slice(input);
            }
            Codec::Deflate => {
                let start = output.len();
                DeflateDecoder::new(input)
                    .take(limit as u64 + 1)
                    .read_to_end(output)?;
                check_limit(output.len() - start, limit)?;
            }
            Codec::Snappy => {
                let split = input.len().checked_sub(SNAPPY_CRC_SIZE).ok_or_else(|| {
                    invalid_data("snappy block shorter than its checksum".to_string())
                })?;
                let (data, crc) = input.split_at(split);
                check_limit(snap::raw::decompress_len(data).map_err(snappy_error)?, limit)?;

                let decoded = snap::raw::Decoder::new()
                    .decompress_vec(data)
                    .map_err(snappy_error)?;
                let expected = u32::from_be_bytes([crc[0], crc[1], crc[2], crc[3]]);
                let actual = crc32fast::hash(&decoded);
                if actual != expected {
                    return Err(invalid_data(format!(
                        "snappy checksum mismatch: expected {expected:08x}, got {actual:08x}"
                    )));
                }
                output.extend_from_slice(&decoded);
            }
        }
        Ok(())
    }

    /// Append the compressed form of `input` to `output`
    pub fn compress(&self, input: &[u8], output: &mut Vec<u8>) -> io::Result<()> {
        match self {
            Codec::Null => output.extend_from_slice(input),
            Codec::Deflate => {
                let mut encoder = DeflateEncoder::new(output, Compression::default());
                encoder.write_all(input)?;
                encoder.finish()?;
            }
            Codec::Snappy => {
                let compressed = snap::raw::Encoder::new()
                    .compress_vec(input)
                    .map_err(snappy_error)?;
                output.extend_from_slice(&compressed);
                output.extend_from_slice(&crc32fast::hash(input).to_be_bytes());
            }
        }
        Ok(())
    }
}

fn invalid_data(reason: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason)
}

fn snappy_error(err: snap::Error) -> io::Error {
    invalid_data(err.to_string())
}

fn check_limit(len: usize, limit: usize) -> io::Result<()> {
    if len > limit {
        return Err(invalid_data(format!(
            "decompressed block exceeds {limit} bytes"
        )));
    }
    Ok(())
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_names() {
        assert_eq!(Codec::from_name("null").unwrap(), Codec::Null);
        assert_eq!(Codec::from_name("deflate").unwrap(), Codec::Deflate);
        assert_eq!(Codec::from_name("snappy").unwrap(), Codec::Snappy);
        assert!(Codec::from_name("zstandard").is_err());
        assert_eq!(Codec::Deflate.to_string(), "deflate");
        assert_eq!(Codec::Snappy.to_string(), "snappy");
    }

    #[test]
    fn test_deflate_roundtrip() {
        let input = b"the same bytes over and over, the same bytes over and over".repeat(20);
        let mut compressed = Vec::new();
        Codec::Deflate.compress(&input, &mut compressed).unwrap();
        assert!(compressed.len() < input.len());

        let mut output = Vec::new();
        Codec::Deflate.decompress(&compressed, &mut output).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_deflate_garbage() {
        let mut output = Vec::new();
        assert!(Codec::Deflate
            .decompress(&[0xff, 0xff, 0xff, 0xff], &mut output)
            .is_err());
    }

    #[test]
    fn test_snappy_roundtrip() {
        let input = b"snappy snappy snappy snappy snappy snappy".repeat(50);
        let mut compressed = Vec::new();
        Codec::Snappy.compress(&input, &mut compressed).unwrap();
        assert!(compressed.len() < input.len());
        assert_eq!(
            &compressed[compressed.len() - 4..],
            &crc32fast::hash(&input).to_be_bytes()
        );

        let mut output = Vec::new();
        Codec::Snappy.decompress(&compressed, &mut output).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_snappy_bad_checksum() {
        let mut compressed = Vec::new();
        Codec::Snappy.compress(b"payload", &mut compressed).unwrap();
        let last = compressed.len() - 1;
        compressed[last] ^= 0xff;

        let err = Codec::Snappy
            .decompress(&compressed, &mut Vec::new())
            .unwrap_err();
        assert!(err.to_string().contains("checksum"));

        assert!(Codec::Snappy.decompress(&[0x01, 0x02], &mut Vec::new()).is_err());
    }

    #[test]
    fn test_decompress_limit() {
        let input = vec![0u8; 64 * 1024];
        for codec in [Codec::Null, Codec::Deflate, Codec::Snappy] {
            let mut compressed = Vec::new();
            codec.compress(&input, &mut compressed).unwrap();

            let mut output = Vec::new();
            let err = codec
                .decompress_with_limit(&compressed, &mut output, 1024)
                .unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidData, "{codec}");

            let mut output = Vec::new();
            codec
                .decompress_with_limit(&compressed, &mut output, input.len())
                .unwrap();
            assert_eq!(output.len(), input.len(), "{codec}");
        }
    }
}
