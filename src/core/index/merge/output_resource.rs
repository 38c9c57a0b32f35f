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

use crate::core::codec::postings::TermIndexMode;
use crate::core::codec::IndexFormatOption;
use crate::core::index::IndexDataWriter;
use crate::core::store::directory::DirectoryRc;
use crate::error::ErrorKind::InconsistentState;
use crate::error::Result;

use std::fmt;

/// A target segment of a merge.
#[derive(Clone)]
pub struct OutputSegmentMergeInfo {
    pub target_segment_index: usize,
    /// Root directory of the target segment, indexes live in sub directories.
    pub directory: DirectoryRc,
}

impl OutputSegmentMergeInfo {
    pub fn new(target_segment_index: usize, directory: DirectoryRc) -> Self {
        OutputSegmentMergeInfo {
            target_segment_index,
            directory,
        }
    }
}

impl fmt::Debug for OutputSegmentMergeInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OutputSegmentMergeInfo")
            .field("target_segment_index", &self.target_segment_index)
            .field("directory", &self.directory.to_string())
            .finish()
    }
}

/// Dictionary and posting writers of one index in one target segment.
pub struct IndexOutputSegmentResource {
    target_segment_index: usize,
    index_directory: DirectoryRc,
    normal: IndexDataWriter,
    bitmap: Option<IndexDataWriter>,
}

impl IndexOutputSegmentResource {
    /// Creates `<segment>/<index_name>/` and its files, the bitmap pair only
    /// when `with_bitmap`. `item_count` pre-sizes hash dictionaries.
    pub fn create(
        info: &OutputSegmentMergeInfo,
        index_name: &str,
        format: &IndexFormatOption,
        with_bitmap: bool,
        item_count: Option<usize>,
    ) -> Result<IndexOutputSegmentResource> {
        let index_directory = info.directory.sub_directory(index_name)?;
        let normal = IndexDataWriter::create_normal(index_directory.as_ref(), format, item_count)?;
        let bitmap = if with_bitmap {
            Some(IndexDataWriter::create_bitmap(
                index_directory.as_ref(),
                format,
                None,
            )?)
        } else {
            None
        };
        Ok(IndexOutputSegmentResource {
            target_segment_index: info.target_segment_index,
            index_directory,
            normal,
            bitmap,
        })
    }

    pub fn target_segment_index(&self) -> usize {
        self.target_segment_index
    }

    pub fn index_directory(&self) -> &DirectoryRc {
        &self.index_directory
    }

    pub fn normal_writer(&mut self) -> &mut IndexDataWriter {
        &mut self.normal
    }

    pub fn writer(&mut self, mode: TermIndexMode) -> Result<&mut IndexDataWriter> {
        match mode {
            TermIndexMode::Normal => Ok(&mut self.normal),
            TermIndexMode::Bitmap => match self.bitmap {
                Some(ref mut bitmap) => Ok(bitmap),
                None => bail!(InconsistentState(format!(
                    "target segment {} has no bitmap output",
                    self.target_segment_index
                ))),
            },
        }
    }

    pub fn term_count(&self) -> usize {
        self.normal.term_count()
    }

    pub fn bitmap_term_count(&self) -> usize {
        self.bitmap.as_ref().map_or(0, |b| b.term_count())
    }

    /// Closes the files, the resource writes nothing afterwards.
    pub fn reset(&mut self) -> Result<()> {
        self.normal.close()?;
        if let Some(ref mut bitmap) = self.bitmap {
            bitmap.close()?;
        }
        Ok(())
    }
}

/// Creates one resource per target segment, in target order.
pub fn create_output_resources(
    outputs: &[OutputSegmentMergeInfo],
    index_name: &str,
    format: &IndexFormatOption,
    with_bitmap: bool,
    item_count: Option<usize>,
) -> Result<Vec<IndexOutputSegmentResource>> {
    let mut resources = Vec::with_capacity(outputs.len());
    for (i, info) in outputs.iter().enumerate() {
        if info.target_segment_index != i {
            bail!(InconsistentState(format!(
                "output {} declares target segment {}",
                i, info.target_segment_index
            )));
        }
        resources.push(IndexOutputSegmentResource::create(
            info,
            index_name,
            format,
            with_bitmap,
            item_count,
        )?);
    }
    Ok(resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{
        DictKeyType, PostingFormatOption, BITMAP_DICTIONARY_FILE_NAME, DICTIONARY_FILE_NAME,
    };
    use crate::core::store::directory::RAMDirectory;
    use std::sync::Arc;

    #[test]
    fn test_output_resources() {
        let root: DirectoryRc = Arc::new(RAMDirectory::new());
        let format = IndexFormatOption::new(PostingFormatOption::default(), DictKeyType::U64, true);
        let outputs = vec![
            OutputSegmentMergeInfo::new(0, root.sub_directory("segment_0").unwrap()),
            OutputSegmentMergeInfo::new(1, root.sub_directory("segment_1").unwrap()),
        ];
        let mut resources =
            create_output_resources(&outputs, "title", &format, false, Some(10)).unwrap();
        assert_eq!(resources.len(), 2);
        assert!(resources[1].writer(TermIndexMode::Bitmap).is_err());
        for r in &mut resources {
            r.reset().unwrap();
        }
        let index_dir = outputs[1].directory.sub_directory("title").unwrap();
        assert!(index_dir.file_exists(DICTIONARY_FILE_NAME));
        assert!(!index_dir.file_exists(BITMAP_DICTIONARY_FILE_NAME));

        let swapped = vec![outputs[1].clone()];
        assert!(create_output_resources(&swapped, "title", &format, true, None).is_err());
    }
}
