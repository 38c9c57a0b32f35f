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

use crate::core::store::io::{DataOutput, IndexOutput};

use std::io::{self, Write};
use std::sync::{Arc, RwLock};

/// A memory-resident `IndexOutput`, appends straight into a file of a
/// `RAMDirectory`.
pub struct RAMOutputStream {
    name: String,
    file: Arc<RwLock<Vec<u8>>>,
    written: usize,
}

impl RAMOutputStream {
    pub fn new(name: &str, file: Arc<RwLock<Vec<u8>>>) -> Self {
        RAMOutputStream {
            name: name.to_string(),
            file,
            written: 0,
        }
    }
}

impl Write for RAMOutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self
            .file
            .write()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "ram file lock poisoned"))?;
        file.extend_from_slice(buf);
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DataOutput for RAMOutputStream {}

impl IndexOutput for RAMOutputStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn file_pointer(&self) -> u64 {
        self.written as u64
    }
}
