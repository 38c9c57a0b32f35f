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

use crate::core::store::io::DataOutput;

use crate::error::Result;

/// Trait for output to a file in a Directory.
pub trait IndexOutput: DataOutput + Send {
    fn name(&self) -> &str;
    fn file_pointer(&self) -> u64;

    /// Flushes buffered bytes, the output must not be written afterwards.
    fn close(&mut self) -> Result<()> {
        self.flush()?;
        Ok(())
    }
}
