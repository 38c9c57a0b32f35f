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

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::core::store::directory::{Directory, DirectoryRc};
use crate::core::store::io::{
    IndexInput, IndexOutput, RAMOutputStream, ReadOnlySource, SourceIndexInput,
};
use crate::error::ErrorKind::FileIO;
use crate::error::Result;

type RAMFile = Arc<RwLock<Vec<u8>>>;

/// Memory resident `Directory`; sub directories share one file table keyed by
/// '/'-joined paths.
#[derive(Clone)]
pub struct RAMDirectory {
    files: Arc<RwLock<BTreeMap<String, RAMFile>>>,
    prefix: String,
}

impl Default for RAMDirectory {
    fn default() -> Self {
        RAMDirectory {
            files: Arc::new(RwLock::new(BTreeMap::new())),
            prefix: String::new(),
        }
    }
}

impl RAMDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn full_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn file(&self, name: &str) -> Result<RAMFile> {
        let full_name = self.full_name(name);
        match self.files.read()?.get(&full_name) {
            Some(f) => Ok(Arc::clone(f)),
            None => bail!(FileIO(format!("file {} does not exist", full_name))),
        }
    }

    fn snapshot(&self, name: &str) -> Result<ReadOnlySource> {
        let file = self.file(name)?;
        let bytes = file.read()?.clone();
        Ok(ReadOnlySource::from_vec(bytes))
    }
}

impl Directory for RAMDirectory {
    fn list_all(&self) -> Result<Vec<String>> {
        let files = self.files.read()?;
        Ok(files
            .keys()
            .filter_map(|k| k.strip_prefix(self.prefix.as_str()))
            .filter(|k| !k.contains('/'))
            .map(|k| k.to_string())
            .collect())
    }

    fn file_exists(&self, name: &str) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(&self.full_name(name)))
            .unwrap_or(false)
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        let file = self.file(name)?;
        let len = file.read()?.len();
        Ok(len as u64)
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        let file: RAMFile = Arc::new(RwLock::new(Vec::new()));
        self.files
            .write()?
            .insert(self.full_name(name), Arc::clone(&file));
        Ok(Box::new(RAMOutputStream::new(name, file)))
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let source = self.snapshot(name)?;
        Ok(Box::new(SourceIndexInput::new(name, source)))
    }

    fn open_source(&self, name: &str) -> Result<ReadOnlySource> {
        self.snapshot(name)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        let full_name = self.full_name(name);
        if self.files.write()?.remove(&full_name).is_none() {
            bail!(FileIO(format!("file {} does not exist", full_name)));
        }
        Ok(())
    }

    fn sub_directory(&self, name: &str) -> Result<DirectoryRc> {
        Ok(Arc::new(RAMDirectory {
            files: Arc::clone(&self.files),
            prefix: format!("{}{}/", self.prefix, name),
        }))
    }
}

impl fmt::Display for RAMDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RAMDirectory({})", self.prefix)
    }
}
