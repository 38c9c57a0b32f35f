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

use crate::core::store::directory::DirectoryRc;
use crate::core::util::DocId;
use crate::error::Result;

use std::fmt;

/// A source segment of a merge.
#[derive(Clone)]
pub struct SegmentData {
    segment_id: u32,
    base_doc_id: DocId,
    doc_count: usize,
    directory: DirectoryRc,
}

impl SegmentData {
    pub fn new(
        segment_id: u32,
        base_doc_id: DocId,
        doc_count: usize,
        directory: DirectoryRc,
    ) -> Self {
        SegmentData {
            segment_id,
            base_doc_id,
            doc_count,
            directory,
        }
    }

    /// Lays `segments` out one after another, each `(directory, doc count)`
    /// starting where the previous one ended.
    pub fn sequence(segments: Vec<(DirectoryRc, usize)>) -> Vec<SegmentData> {
        let mut base = 0;
        segments
            .into_iter()
            .enumerate()
            .map(|(i, (directory, doc_count))| {
                let segment = SegmentData::new(i as u32, base, doc_count, directory);
                base += doc_count as DocId;
                segment
            })
            .collect()
    }

    pub fn segment_id(&self) -> u32 {
        self.segment_id
    }

    pub fn base_doc_id(&self) -> DocId {
        self.base_doc_id
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    pub fn directory(&self) -> &DirectoryRc {
        &self.directory
    }

    /// The directory holding the files of `index_name`.
    pub fn index_directory(&self, index_name: &str) -> Result<DirectoryRc> {
        self.directory.sub_directory(index_name)
    }
}

impl fmt::Debug for SegmentData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SegmentData")
            .field("segment_id", &self.segment_id)
            .field("base_doc_id", &self.base_doc_id)
            .field("doc_count", &self.doc_count)
            .field("directory", &self.directory.to_string())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::directory::{Directory, RAMDirectory};

    use std::sync::Arc;

    #[test]
    fn test_sequence() {
        let root = RAMDirectory::new();
        let other: DirectoryRc = Arc::new(RAMDirectory::new());
        let segments = SegmentData::sequence(vec![
            (root.sub_directory("segment_0").unwrap(), 3),
            (root.sub_directory("segment_1").unwrap(), 2),
            (other, 4),
        ]);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1].segment_id(), 1);
        assert_eq!(segments[1].base_doc_id(), 3);
        assert_eq!(segments[2].base_doc_id(), 5);
        assert_eq!(segments[2].doc_count(), 4);
        assert!(segments[0].index_directory("title").is_ok());
    }
}
