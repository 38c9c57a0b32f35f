// Copyright 2019 Zhizhesihai (Beijing) Technology Limited.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

//! Unsigned variable-length integers, the universal on-disk integer format.
//!
//! Seven payload bits per byte, least-significant group first, high bit set on
//! every byte but the last. Signed values are written by bit pattern, there is
//! no zig-zag step.

use crate::error::ErrorKind::BufferOverflow;
use crate::error::Result;

pub const MAX_VARINT32_LENGTH: usize = 5;
pub const MAX_VARINT64_LENGTH: usize = 10;

/// Bytes needed to encode `value`.
pub fn varint_length(value: u32) -> usize {
    let mut value = value >> 7;
    let mut len = 1;
    while value != 0 {
        value >>= 7;
        len += 1;
    }
    len
}

pub fn varint64_length(value: u64) -> usize {
    let mut value = value >> 7;
    let mut len = 1;
    while value != 0 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Encodes `value` into the front of `buf`, returns the number of bytes written.
pub fn encode_uvarint(buf: &mut [u8], value: u32) -> Result<usize> {
    let mut value = value;
    let mut pos = 0;
    while (value & !0x7f_u32) != 0 {
        if pos >= buf.len() {
            bail!(BufferOverflow(format!(
                "varint needs more than {} bytes",
                buf.len()
            )));
        }
        buf[pos] = ((value & 0x7f) | 0x80) as u8;
        value >>= 7;
        pos += 1;
    }
    if pos >= buf.len() {
        bail!(BufferOverflow(format!(
            "varint needs more than {} bytes",
            buf.len()
        )));
    }
    buf[pos] = value as u8;
    Ok(pos + 1)
}

#[inline]
pub fn encode_varint(buf: &mut [u8], value: i32) -> Result<usize> {
    encode_uvarint(buf, value as u32)
}

pub fn encode_uvarint64(buf: &mut [u8], value: u64) -> Result<usize> {
    let mut value = value;
    let mut pos = 0;
    while (value & !0x7f_u64) != 0 {
        if pos >= buf.len() {
            bail!(BufferOverflow(format!(
                "varint64 needs more than {} bytes",
                buf.len()
            )));
        }
        buf[pos] = ((value & 0x7f) | 0x80) as u8;
        value >>= 7;
        pos += 1;
    }
    if pos >= buf.len() {
        bail!(BufferOverflow(format!(
            "varint64 needs more than {} bytes",
            buf.len()
        )));
    }
    buf[pos] = value as u8;
    Ok(pos + 1)
}

/// Decodes one varint from the front of `cursor` and advances it.
pub fn decode_uvarint(cursor: &mut &[u8]) -> Result<u32> {
    let mut value = 0u32;
    let mut shift = 0u32;
    let mut pos = 0;
    loop {
        if pos >= cursor.len() {
            bail!(BufferOverflow(format!(
                "varint runs past the remaining {} bytes",
                cursor.len()
            )));
        }
        if shift > 28 {
            bail!(BufferOverflow("varint longer than 5 bytes".into()));
        }
        let b = cursor[pos];
        pos += 1;
        value |= u32::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    *cursor = &cursor[pos..];
    Ok(value)
}

#[inline]
pub fn decode_varint(cursor: &mut &[u8]) -> Result<i32> {
    decode_uvarint(cursor).map(|v| v as i32)
}

pub fn decode_uvarint64(cursor: &mut &[u8]) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    let mut pos = 0;
    loop {
        if pos >= cursor.len() {
            bail!(BufferOverflow(format!(
                "varint64 runs past the remaining {} bytes",
                cursor.len()
            )));
        }
        if shift > 63 {
            bail!(BufferOverflow("varint64 longer than 10 bytes".into()));
        }
        let b = cursor[pos];
        pos += 1;
        value |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    *cursor = &cursor[pos..];
    Ok(value)
}

/// Unchecked append for in-memory buffers, the caller owns the sizing.
#[inline]
pub fn append_uvarint(out: &mut Vec<u8>, value: u32) {
    let mut value = value;
    while (value & !0x7f_u32) != 0 {
        out.push(((value & 0x7f) | 0x80) as u8);
        value >>= 7;
    }
    out.push(value as u8);
}

#[inline]
pub fn append_uvarint64(out: &mut Vec<u8>, value: u64) {
    let mut value = value;
    while (value & !0x7f_u64) != 0 {
        out.push(((value & 0x7f) | 0x80) as u8);
        value >>= 7;
    }
    out.push(value as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_varint_round_trip() {
        let values = [
            0u32,
            1,
            127,
            128,
            255,
            16_383,
            16_384,
            2_097_151,
            2_097_152,
            0x7FFF_FFFF,
            u32::max_value(),
        ];
        for &v in values.iter() {
            let mut buf = [0u8; MAX_VARINT32_LENGTH];
            let written = encode_uvarint(&mut buf, v).unwrap();
            assert_eq!(written, varint_length(v));

            let mut cursor = &buf[..written];
            assert_eq!(decode_uvarint(&mut cursor).unwrap(), v);
            assert!(cursor.is_empty());
        }
    }

    #[test]
    fn test_varint_length_edges() {
        assert_eq!(varint_length(0), 1);
        assert_eq!(varint_length(127), 1);
        assert_eq!(varint_length(128), 2);
        assert_eq!(varint_length(0x7FFF_FFFF), 5);
        assert_eq!(varint64_length(u64::max_value()), 10);
    }

    #[test]
    fn test_signed_is_bit_pattern() {
        let mut buf = [0u8; MAX_VARINT32_LENGTH];
        let written = encode_varint(&mut buf, -1).unwrap();
        assert_eq!(written, 5);
        assert_eq!(&buf[..], &[0xff, 0xff, 0xff, 0xff, 0x0f]);
        let mut cursor = &buf[..];
        assert_eq!(decode_varint(&mut cursor).unwrap(), -1);
    }

    #[test]
    fn test_encode_overflow() {
        let mut buf = [0u8; 2];
        match encode_uvarint(&mut buf, 1 << 20) {
            Err(e) => match e.kind() {
                ErrorKind::BufferOverflow(_) => {}
                k => panic!("unexpected error {:?}", k),
            },
            Ok(_) => panic!("encode should overflow"),
        }
        assert_eq!(encode_uvarint(&mut buf, 300).unwrap(), 2);
    }

    #[test]
    fn test_decode_overflow() {
        let data = [0x80u8, 0x80];
        let mut cursor = &data[..];
        assert!(decode_uvarint(&mut cursor).is_err());
        // a failed decode leaves the cursor untouched
        assert_eq!(cursor.len(), 2);
    }

    #[test]
    fn test_append_matches_checked_encode() {
        let mut out = Vec::new();
        append_uvarint(&mut out, 300);
        append_uvarint64(&mut out, 1 << 40);
        let mut buf = [0u8; MAX_VARINT64_LENGTH];
        let n = encode_uvarint64(&mut buf, 1 << 40).unwrap();
        assert_eq!(&out[2..], &buf[..n]);

        let mut cursor = &out[..];
        assert_eq!(decode_uvarint(&mut cursor).unwrap(), 300);
        assert_eq!(decode_uvarint64(&mut cursor).unwrap(), 1 << 40);
    }
}
