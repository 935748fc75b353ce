//! Zigzag varint and length-prefixed byte primitives

use crate::error::{FormatError, FormatResult};
use std::io::{ErrorKind, Read, Write};

/// Longest encoding of a 64-bit zigzag varint
const MAX_VARINT_BYTES: u32 = 10;

/// Read one byte, or `None` at end of stream
fn read_byte<R: Read>(reader: &mut R) -> FormatResult<Option<u8>> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(byte[0])),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(FormatError::Io(e)),
        }
    }
}

/// Read a zigzag varint, returning `None` if the stream ends before its first byte
pub(crate) fn read_long_or_eof<R: Read>(
    reader: &mut R,
    context: &'static str,
) -> FormatResult<Option<i64>> {
    let mut raw: u64 = 0;

    for i in 0..MAX_VARINT_BYTES {
        let byte = match read_byte(reader)? {
            Some(b) => b,
            None if i == 0 => return Ok(None),
            None => return Err(FormatError::UnexpectedEof { context }),
        };

        raw |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some(zigzag_decode(raw)));
        }
    }

    Err(FormatError::VarintOverflow { context })
}

/// Read a zigzag varint that must be present
pub(crate) fn read_long<R: Read>(reader: &mut R, context: &'static str) -> FormatResult<i64> {
    read_long_or_eof(reader, context)?.ok_or(FormatError::UnexpectedEof { context })
}

/// Read exactly `len` bytes into `out`, replacing its contents
pub(crate) fn read_exact_into<R: Read>(
    reader: &mut R,
    len: u64,
    context: &'static str,
    out: &mut Vec<u8>,
) -> FormatResult<()> {
    out.clear();
    // take() keeps a corrupt length from turning into one huge allocation
    let read = reader.by_ref().take(len).read_to_end(out)?;
    if (read as u64) < len {
        return Err(FormatError::UnexpectedEof { context });
    }
    Ok(())
}

/// Read a varint length followed by that many bytes
pub(crate) fn read_len_prefixed<R: Read>(
    reader: &mut R,
    context: &'static str,
    out: &mut Vec<u8>,
) -> FormatResult<()> {
    let len = read_long(reader, context)?;
    let len = u64::try_from(len).map_err(|_| FormatError::InvalidLength { context, value: len })?;
    read_exact_into(reader, len, context, out)
}

pub(crate) fn write_long<W: Write>(writer: &mut W, value: i64) -> std::io::Result<()> {
    let mut raw = zigzag_encode(value);
    let mut buf = [0u8; MAX_VARINT_BYTES as usize];
    let mut len = 0;

    loop {
        let byte = (raw & 0x7f) as u8;
        raw >>= 7;
        if raw == 0 {
            buf[len] = byte;
            len += 1;
            break;
        }
        buf[len] = byte | 0x80;
        len += 1;
    }

    writer.write_all(&buf[..len])
}

pub(crate) fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    write_long(writer, bytes.len() as i64)?;
    writer.write_all(bytes)
}

#[inline]
fn zigzag_decode(raw: u64) -> i64 {
    ((raw >> 1) as i64) ^ -((raw & 1) as i64)
}

#[inline]
fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}
