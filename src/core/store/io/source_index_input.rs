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

use crate::core::store::io::{DataInput, IndexInput};

use crate::error::ErrorKind::{IllegalArgument, UnexpectedEOF};
use crate::error::Result;
use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
enum SourceData {
    Owned(Arc<Vec<u8>>),
    Mapped(Arc<Mmap>),
}

impl SourceData {
    fn bytes(&self) -> &[u8] {
        match self {
            SourceData::Owned(v) => v.as_slice(),
            SourceData::Mapped(m) => &m[..],
        }
    }
}

/// A cheaply clonable read-only view over a whole file, either memory
/// mapped or held in memory.
#[derive(Clone)]
pub struct ReadOnlySource {
    data: SourceData,
    offset: usize,
    len: usize,
}

impl ReadOnlySource {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        ReadOnlySource {
            data: SourceData::Owned(Arc::new(bytes)),
            offset: 0,
            len,
        }
    }

    /// Maps the file at `path`, empty files are read into an empty buffer.
    pub fn mmap<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let file_len = file.metadata()?.len() as usize;
        if file_len == 0 {
            return Ok(Self::from_vec(Vec::new()));
        }
        let mmap = unsafe { MmapOptions::new().len(file_len).map(&file)? };
        Ok(ReadOnlySource {
            data: SourceData::Mapped(Arc::new(mmap)),
            offset: 0,
            len: file_len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the data underlying the ReadOnlySource object.
    pub fn as_slice(&self) -> &[u8] {
        &self.data.bytes()[self.offset..self.offset + self.len]
    }

    /// Creates a view over `[from_offset, to_offset)` sharing the same
    /// backing data.
    pub fn slice(&self, from_offset: usize, to_offset: usize) -> Result<ReadOnlySource> {
        if from_offset > to_offset || to_offset > self.len {
            bail!(IllegalArgument(format!(
                "Illegal slice [{}, {}) of source with length {}",
                from_offset, to_offset, self.len
            )));
        }
        Ok(ReadOnlySource {
            data: self.data.clone(),
            offset: self.offset + from_offset,
            len: to_offset - from_offset,
        })
    }

    pub fn slice_from(&self, from_offset: usize) -> Result<ReadOnlySource> {
        self.slice(from_offset, self.len)
    }
}

/// `IndexInput` over a `ReadOnlySource`.
#[derive(Clone)]
pub struct SourceIndexInput {
    source: ReadOnlySource,
    position: usize,
    name: String,
}

impl SourceIndexInput {
    pub fn new(name: &str, source: ReadOnlySource) -> Self {
        SourceIndexInput {
            source,
            position: 0,
            name: name.to_string(),
        }
    }
}

impl IndexInput for SourceIndexInput {
    fn file_pointer(&self) -> u64 {
        self.position as u64
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.source.len() as u64 {
            bail!(UnexpectedEOF(format!(
                "seek to {} past the end of {} (length {})",
                pos,
                self.name,
                self.source.len()
            )));
        }
        self.position = pos as usize;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.source.len() as u64
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl DataInput for SourceIndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        if self.position >= self.source.len() {
            bail!(UnexpectedEOF(format!(
                "Reached EOF of {} when a single byte is expected",
                self.name
            )));
        }
        let b = self.source.as_slice()[self.position];
        self.position += 1;
        Ok(b)
    }

    fn skip_bytes(&mut self, count: usize) -> Result<()> {
        if self.position + count > self.source.len() {
            bail!(UnexpectedEOF(format!(
                "Reached EOF of {} when skipping {} bytes",
                self.name, count
            )));
        }
        self.position += count;
        Ok(())
    }
}

impl Read for SourceIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let slice = self.source.as_slice();
        let count = buf.len().min(slice.len() - self.position);
        buf[..count].copy_from_slice(&slice[self.position..self.position + count]);

        self.position += count;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::io::{DataOutput, FSIndexOutput, IndexOutput};

    #[test]
    fn test_mmap_source_input() {
        let name = "test.bin";
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(name);

        let mut fsout = FSIndexOutput::new(name.to_string(), &path).unwrap();
        fsout.write_byte(b'a').unwrap();
        fsout.write_short(0x7F).unwrap();
        fsout.write_long(567_890).unwrap();
        fsout.write_int(1_234_567).unwrap();
        fsout.write_byte(b'b').unwrap();
        fsout.close().unwrap();

        let source = ReadOnlySource::mmap(&path).unwrap();
        assert_eq!(source.len(), 16);
        let mut input = SourceIndexInput::new(name, source.slice(3, 15).unwrap());
        assert_eq!(input.read_long().unwrap(), 567_890);
        assert_eq!(input.read_int().unwrap(), 1_234_567);
        assert!(input.read_int().is_err());

        input.seek(0).unwrap();
        assert_eq!(input.read_long().unwrap(), 567_890);
        assert!(input.seek(13).is_err());
    }

    #[test]
    fn test_empty_file_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("empty");
        ::std::fs::write(&path, b"").unwrap();
        let source = ReadOnlySource::mmap(&path).unwrap();
        assert!(source.is_empty());
    }
}
