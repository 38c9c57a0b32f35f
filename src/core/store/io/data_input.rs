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

use crate::error::ErrorKind::*;
use crate::error::Result;

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read};

fn eof_error(e: io::Error, what: &str) -> crate::error::Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        UnexpectedEOF(format!("Reached EOF when {} is expected", what)).into()
    } else {
        e.into()
    }
}

/// Reading counterpart of `DataOutput`.
pub trait DataInput: Read {
    fn read_byte(&mut self) -> Result<u8> {
        self.read_u8().map_err(|e| eof_error(e, "a single byte"))
    }

    fn read_bytes(&mut self, b: &mut [u8], offset: usize, length: usize) -> Result<()> {
        let end = offset + length;
        if b.len() < end {
            let msg = format!(
                "Buffer too small: wring [{}, {}) to [0, {})",
                offset,
                end,
                b.len(),
            );
            bail!(IllegalArgument(msg));
        }
        self.read_exact(&mut b[offset..end])
            .map_err(|e| eof_error(e, &format!("{} bytes", length)))
    }

    fn read_short(&mut self) -> Result<u16> {
        self.read_u16::<LittleEndian>()
            .map_err(|e| eof_error(e, "a short"))
    }

    fn read_int(&mut self) -> Result<u32> {
        self.read_u32::<LittleEndian>()
            .map_err(|e| eof_error(e, "an int"))
    }

    fn read_long(&mut self) -> Result<u64> {
        self.read_u64::<LittleEndian>()
            .map_err(|e| eof_error(e, "a long"))
    }

    fn read_vint(&mut self) -> Result<u32> {
        let mut value = 0u32;
        let mut shift = 0;
        loop {
            let b = self.read_byte()?;
            value |= u32::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 28 {
                bail!(IllegalArgument("Invalid vInt detected".to_owned()));
            }
        }
    }

    fn read_vlong(&mut self) -> Result<u64> {
        let mut value = 0u64;
        let mut shift = 0;
        loop {
            let b = self.read_byte()?;
            value |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                bail!(IllegalArgument("Invalid vLong detected".to_owned()));
            }
        }
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        const SKIP_BUFFER_SIZE: usize = 1024;
        let mut skip_buffer = [0u8; SKIP_BUFFER_SIZE];
        let mut skipped = 0;

        while skipped < count {
            let step = ::std::cmp::min(SKIP_BUFFER_SIZE, count - skipped);
            self.read_bytes(&mut skip_buffer, 0, step)?;
            skipped += step;
        }
        Ok(())
    }
}

impl<'a> DataInput for &'a [u8] {
    fn read_byte(&mut self) -> Result<u8> {
        if self.is_empty() {
            bail!(UnexpectedEOF(
                "Reached EOF when a single byte is expected".to_owned()
            ));
        }
        let b = self[0];
        *self = &self[1..];
        Ok(b)
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        if self.len() < count {
            bail!(UnexpectedEOF(format!(
                "Reached EOF when skipping {} bytes",
                count
            )));
        }

        *self = &self[count..];
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::io::DataOutput;

    #[test]
    fn test_read_back() {
        let mut out: Vec<u8> = Vec::new();
        out.write_byte(7).unwrap();
        out.write_short(513).unwrap();
        out.write_int(0x9876_5432).unwrap();
        out.write_long(u64::max_value()).unwrap();
        out.write_vint(123_456).unwrap();
        out.write_vlong(1 << 50).unwrap();

        let mut input = &out[..];
        assert_eq!(input.read_byte().unwrap(), 7);
        assert_eq!(input.read_short().unwrap(), 513);
        assert_eq!(DataInput::read_int(&mut input).unwrap(), 0x9876_5432);
        assert_eq!(input.read_long().unwrap(), u64::max_value());
        assert_eq!(input.read_vint().unwrap(), 123_456);
        assert_eq!(input.read_vlong().unwrap(), 1 << 50);
        assert!(input.read_byte().is_err());
    }

    #[test]
    fn test_short_read_is_eof() {
        let data = [1u8, 2];
        let mut input = &data[..];
        match DataInput::read_int(&mut input) {
            Err(e) => match e.kind() {
                UnexpectedEOF(_) => {}
                k => panic!("unexpected error {:?}", k),
            },
            Ok(_) => panic!("read should fail"),
        }
    }
}
