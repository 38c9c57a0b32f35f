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

use crate::error::ErrorKind::UnexpectedEOF;
use crate::error::Result;

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const CHUNK_SIZE: usize = 8192;

/// Buffered streaming `IndexInput` for `FSDirectory`, never maps the file.
pub struct FSIndexInput {
    name: String,
    reader: BufReader<File>,
    position: u64,
    len: u64,
}

impl FSIndexInput {
    pub fn new<P: AsRef<Path>>(name: String, path: P) -> Result<FSIndexInput> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(FSIndexInput {
            name,
            reader: BufReader::with_capacity(CHUNK_SIZE, file),
            position: 0,
            len,
        })
    }
}

impl IndexInput for FSIndexInput {
    fn file_pointer(&self) -> u64 {
        self.position
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            bail!(UnexpectedEOF(format!(
                "seek to {} past the end of {} (length {})",
                pos, self.name, self.len
            )));
        }
        self.reader.seek(SeekFrom::Start(pos))?;
        self.position = pos;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl DataInput for FSIndexInput {}

impl Read for FSIndexInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.reader.read(buf)?;
        self.position += count as u64;
        Ok(count)
    }
}
