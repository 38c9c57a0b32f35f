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

use crate::core::codec::postings::{PostingIterator, TermIndexMode};
use crate::core::codec::IndexFormatOption;
use crate::core::index::merge::{MultiSegmentPostingWriter, OutputSegmentMergeInfo};
use crate::core::index::{
    AdaptiveBitmapConfig, AdaptiveBitmapRule, IndexConfig, IndexDataWriter, ReclaimMap,
};
use crate::core::store::directory::{Directory, DirectoryRc};
use crate::core::util::{BufferPool, DictKey};
use crate::error::Result;

use std::io::Write;

pub const ADAPTIVE_BITMAP_DIRECTORY_NAME: &str = "adaptive_bitmap";
pub const ADAPTIVE_BITMAP_VOCABULARY_FILE_NAME: &str = "adaptive_bitmap_vocabulary";

/// Turns frequent terms into bitmap postings under
/// `<segment>/<index>/adaptive_bitmap/` of every target segment.
///
/// The keys given a bitmap are listed in the `adaptive_bitmap_vocabulary`
/// file next to the bitmap files.
pub struct AdaptiveBitmapIndexWriter {
    config: AdaptiveBitmapConfig,
    format: IndexFormatOption,
    directories: Vec<DirectoryRc>,
    writers: Vec<IndexDataWriter>,
    vocabulary: Vec<DictKey>,
    total_doc_count: usize,
}

impl AdaptiveBitmapIndexWriter {
    /// `total_doc_count` is the document count of the merged index.
    pub fn create(
        index_config: &IndexConfig,
        config: &AdaptiveBitmapConfig,
        outputs: &[OutputSegmentMergeInfo],
        total_doc_count: usize,
    ) -> Result<AdaptiveBitmapIndexWriter> {
        let format = index_config.format;
        let mut directories = Vec::with_capacity(outputs.len());
        let mut writers = Vec::with_capacity(outputs.len());
        for output in outputs {
            let directory = output
                .directory
                .sub_directory(&index_config.index_name)?
                .sub_directory(ADAPTIVE_BITMAP_DIRECTORY_NAME)?;
            writers.push(IndexDataWriter::create_bitmap(
                directory.as_ref(),
                &format,
                None,
            )?);
            directories.push(directory);
        }
        Ok(AdaptiveBitmapIndexWriter {
            config: *config,
            format,
            directories,
            writers,
            vocabulary: Vec::new(),
            total_doc_count,
        })
    }

    pub fn need_adaptive_bitmap(&self, df: u32) -> bool {
        match self.config.rule {
            AdaptiveBitmapRule::DocFrequency(threshold) => df >= threshold,
            AdaptiveBitmapRule::Percent(percent) => {
                self.total_doc_count > 0
                    && u64::from(df) * 100 >= u64::from(percent) * self.total_doc_count as u64
            }
        }
    }

    /// The normal posting of an adaptive term is dropped.
    pub fn is_bitmap_only(&self) -> bool {
        self.config.is_bitmap_only()
    }

    pub fn vocabulary(&self) -> &[DictKey] {
        &self.vocabulary
    }

    pub fn add_posting(
        &mut self,
        key: DictKey,
        mut iterator: PostingIterator,
        term_payload: u16,
        reclaim_map: &ReclaimMap,
        pool: &mut BufferPool,
    ) -> Result<()> {
        let mut writer = MultiSegmentPostingWriter::new(
            self.format.bitmap_format_option().posting_format_option,
            TermIndexMode::Bitmap,
            self.writers.len(),
            pool,
        );
        while let Some(matched) = iterator.next()? {
            let (target, local_doc_id) = reclaim_map.get_local_id(matched.doc_id);
            writer.add_match(target, local_doc_id, &matched)?;
        }
        writer.set_term_payload(term_payload)?;
        writer.end_segment()?;
        writer.dump(key, &mut self.writers, term_payload)?;
        writer.recycle(pool);
        self.vocabulary.push(key);
        Ok(())
    }

    /// Io buffers of the outputs plus one bitmap over all documents.
    pub fn estimate_memory_use(
        total_doc_count: usize,
        output_count: usize,
        io_buffer_size: usize,
    ) -> usize {
        output_count * io_buffer_size * 2 + total_doc_count / 8 + 1
    }

    pub fn end(&mut self) -> Result<()> {
        let content = serde_json::to_vec(&self.vocabulary)?;
        for (writer, directory) in self.writers.iter_mut().zip(self.directories.iter()) {
            writer.close()?;
            self.format.store(directory.as_ref())?;
            let mut output = directory.create_output(ADAPTIVE_BITMAP_VOCABULARY_FILE_NAME)?;
            output.write_all(&content)?;
            output.close()?;
        }
        info!("{} adaptive bitmap terms", self.vocabulary.len());
        Ok(())
    }
}

/// Reads the adaptive bitmap keys of an index directory, empty when the index
/// has none.
pub fn load_adaptive_vocabulary(index_directory: &dyn Directory) -> Result<Vec<DictKey>> {
    let directory = index_directory.sub_directory(ADAPTIVE_BITMAP_DIRECTORY_NAME)?;
    if !directory.file_exists(ADAPTIVE_BITMAP_VOCABULARY_FILE_NAME) {
        return Ok(Vec::new());
    }
    let source = directory.open_source(ADAPTIVE_BITMAP_VOCABULARY_FILE_NAME)?;
    Ok(serde_json::from_slice(source.as_slice())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{DictKeyType, PostingFormatOption};
    use crate::core::index::{AdaptiveBitmapRule, HighFrequencyTermPostingType};
    use crate::core::store::directory::RAMDirectory;
    use std::sync::Arc;

    fn adaptive_writer(
        rule: AdaptiveBitmapRule,
        directory: DirectoryRc,
    ) -> AdaptiveBitmapIndexWriter {
        let format =
            IndexFormatOption::new(PostingFormatOption::default(), DictKeyType::U64, false);
        let index_config = IndexConfig::new("body", format);
        let config = AdaptiveBitmapConfig::new(rule, HighFrequencyTermPostingType::BitmapOnly);
        let outputs = vec![OutputSegmentMergeInfo::new(0, directory)];
        AdaptiveBitmapIndexWriter::create(&index_config, &config, &outputs, 200).unwrap()
    }

    #[test]
    fn test_adaptive_thresholds() {
        let by_df =
            adaptive_writer(AdaptiveBitmapRule::DocFrequency(10), Arc::new(RAMDirectory::new()));
        assert!(!by_df.need_adaptive_bitmap(9));
        assert!(by_df.need_adaptive_bitmap(10));
        assert!(by_df.is_bitmap_only());

        let by_percent =
            adaptive_writer(AdaptiveBitmapRule::Percent(5), Arc::new(RAMDirectory::new()));
        assert!(!by_percent.need_adaptive_bitmap(9));
        assert!(by_percent.need_adaptive_bitmap(10));
    }

    #[test]
    fn test_empty_vocabulary() {
        let directory: DirectoryRc = Arc::new(RAMDirectory::new());
        let mut writer =
            adaptive_writer(AdaptiveBitmapRule::DocFrequency(1), Arc::clone(&directory));
        let index_directory = directory.sub_directory("body").unwrap();
        assert!(load_adaptive_vocabulary(index_directory.as_ref()).unwrap().is_empty());

        writer.end().unwrap();
        assert!(writer.vocabulary().is_empty());
        assert!(load_adaptive_vocabulary(index_directory.as_ref()).unwrap().is_empty());
        let bitmap_directory =
            index_directory.sub_directory(ADAPTIVE_BITMAP_DIRECTORY_NAME).unwrap();
        assert!(bitmap_directory.file_exists(ADAPTIVE_BITMAP_VOCABULARY_FILE_NAME));
    }
}
