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

use std::fmt;
use std::sync::Arc;

use crate::core::store::io::{IndexInput, IndexOutput, ReadOnlySource};
use crate::error::Result;

pub type DirectoryRc = Arc<dyn Directory>;

/// A Directory is a flat list of files plus named sub directories.
///
/// Files may be written once, when they are created. Once a file is created
/// it may only be opened for read, or deleted.
pub trait Directory: fmt::Display + Send + Sync {
    /// Returns the names of the files directly in this directory, sorted.
    fn list_all(&self) -> Result<Vec<String>>;

    fn file_exists(&self, name: &str) -> bool;

    /// Returns the length of a file in the directory.
    fn file_length(&self, name: &str) -> Result<u64>;

    /// Creates a new, empty file in the directory with the given name.
    /// Returns a stream writing this file.
    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>>;

    /// Opens a streaming reader, the file is not loaded into memory.
    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>>;

    /// Opens a whole-file read-only view, memory resident or mapped.
    fn open_source(&self, name: &str) -> Result<ReadOnlySource>;

    fn delete_file(&self, name: &str) -> Result<()>;

    /// Returns the named child directory, creating it when missing.
    fn sub_directory(&self, name: &str) -> Result<DirectoryRc>;
}
