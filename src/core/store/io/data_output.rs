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

use crate::core::util::varint::{
    encode_uvarint, encode_uvarint64, MAX_VARINT32_LENGTH, MAX_VARINT64_LENGTH,
};
use crate::error::Result;

use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Trait for writing the index files' low-level data types.
///
/// Fixed-width integers are little-endian, variable-width ones use the
/// varint layout of `core::util::varint`.
pub trait DataOutput: Write {
    fn write_byte(&mut self, b: u8) -> Result<()> {
        let buf = [b; 1];
        self.write_all(&buf)?;
        Ok(())
    }

    #[inline]
    fn write_bytes(&mut self, b: &[u8], offset: usize, length: usize) -> Result<()> {
        debug_assert!(offset + length <= b.len());
        self.write_all(&b[offset..offset + length])?;
        Ok(())
    }

    fn write_short(&mut self, i: u16) -> Result<()> {
        self.write_u16::<LittleEndian>(i)?;
        Ok(())
    }

    fn write_int(&mut self, i: u32) -> Result<()> {
        self.write_u32::<LittleEndian>(i)?;
        Ok(())
    }

    fn write_long(&mut self, i: u64) -> Result<()> {
        self.write_u64::<LittleEndian>(i)?;
        Ok(())
    }

    fn write_vint(&mut self, i: u32) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT32_LENGTH];
        let len = encode_uvarint(&mut buf, i)?;
        self.write_all(&buf[..len])?;
        Ok(())
    }

    fn write_vlong(&mut self, i: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT64_LENGTH];
        let len = encode_uvarint64(&mut buf, i)?;
        self.write_all(&buf[..len])?;
        Ok(())
    }
}

// a implement that can use Vec<u8> as a data output
impl DataOutput for Vec<u8> {}
