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
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::store::directory::{Directory, DirectoryRc};
use crate::core::store::io::{
    FSIndexInput, FSIndexOutput, IndexInput, IndexOutput, ReadOnlySource,
};
use crate::error::ErrorKind::{FileIO, IllegalArgument};
use crate::error::Result;

/// a straightforward `Directory` implementations use std::fs::File.
///
/// Whole-file sources are memory mapped, streaming inputs are buffered reads.
pub struct FSDirectory {
    pub directory: PathBuf,
    io_buffer_size: usize,
}

impl FSDirectory {
    pub const DEFAULT_IO_BUFFER_SIZE: usize = 8192;

    pub fn new<T: AsRef<Path> + ?Sized>(directory: &T) -> Result<FSDirectory> {
        Self::with_buffer_size(directory, Self::DEFAULT_IO_BUFFER_SIZE)
    }

    pub fn with_buffer_size<T: AsRef<Path> + ?Sized>(
        directory: &T,
        io_buffer_size: usize,
    ) -> Result<FSDirectory> {
        let directory = directory.as_ref();
        if !Path::exists(directory) {
            fs::create_dir_all(directory)?;
        } else if !Path::is_dir(directory) {
            bail!(IllegalArgument(format!(
                "Path {:?} exists but is not directory",
                directory
            )))
        }

        Ok(FSDirectory {
            directory: From::from(directory),
            io_buffer_size,
        })
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.directory.join(name)
    }
}

impl Directory for FSDirectory {
    fn list_all(&self) -> Result<Vec<String>> {
        let mut result = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    result.push(name.to_string());
                }
            }
        }
        result.sort();
        Ok(result)
    }

    fn file_exists(&self, name: &str) -> bool {
        self.resolve(name).is_file()
    }

    fn file_length(&self, name: &str) -> Result<u64> {
        let path = self.resolve(name);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) => bail!(FileIO(format!("stat {:?} failed: {}", path, e))),
        }
    }

    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        let output = FSIndexOutput::with_buffer_size(
            name.to_string(),
            self.resolve(name),
            self.io_buffer_size,
        )?;
        Ok(Box::new(output))
    }

    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let path = self.resolve(name);
        if !path.is_file() {
            bail!(FileIO(format!("file {:?} does not exist", path)));
        }
        Ok(Box::new(FSIndexInput::new(name.to_string(), path)?))
    }

    fn open_source(&self, name: &str) -> Result<ReadOnlySource> {
        let path = self.resolve(name);
        if !path.is_file() {
            bail!(FileIO(format!("file {:?} does not exist", path)));
        }
        ReadOnlySource::mmap(path)
    }

    fn delete_file(&self, name: &str) -> Result<()> {
        fs::remove_file(self.resolve(name))?;
        Ok(())
    }

    fn sub_directory(&self, name: &str) -> Result<DirectoryRc> {
        let dir = FSDirectory::with_buffer_size(&self.resolve(name), self.io_buffer_size)?;
        Ok(Arc::new(dir))
    }
}

impl fmt::Display for FSDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FSDirectory({})", self.directory.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::io::{DataInput, DataOutput};

    #[test]
    fn test_fs_directory_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = FSDirectory::new(temp_dir.path()).unwrap();
        {
            let mut out = dir.create_output("a").unwrap();
            out.write_int(42).unwrap();
            out.close().unwrap();
        }
        let sub = dir.sub_directory("index").unwrap();
        {
            let mut out = sub.create_output("b").unwrap();
            out.write_byte(1).unwrap();
            out.close().unwrap();
        }

        assert_eq!(dir.list_all().unwrap(), vec!["a".to_string()]);
        assert_eq!(dir.file_length("a").unwrap(), 4);
        assert!(sub.file_exists("b"));
        assert!(!dir.file_exists("b"));

        let mut input = dir.open_input("a").unwrap();
        assert_eq!(input.read_int().unwrap(), 42);
        assert_eq!(dir.open_source("a").unwrap().as_slice(), &[42, 0, 0, 0]);
        assert!(dir.open_input("missing").is_err());
    }
}
