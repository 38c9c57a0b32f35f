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

use crate::core::codec::postings::{PostingIterator, TermIndexMode, TermMatch};
use crate::core::codec::IndexFormatOption;
use crate::core::index::merge::{
    create_output_resources, IndexOutputSegmentResource, MultiSegmentPostingWriter,
    OutputSegmentMergeInfo,
};
use crate::core::index::{IndexConfig, ReclaimMap, TruncateConfig, TruncateSortRule};
use crate::core::util::{BufferPool, DictKey};
use crate::error::Result;

use std::mem;

/// Writes the truncated postings of one truncate config into the sibling
/// index `<index>_<truncate name>` of every target segment.
pub struct TruncateIndexWriter {
    config: TruncateConfig,
    index_name: String,
    format: IndexFormatOption,
    resources: Vec<IndexOutputSegmentResource>,
    term_count: usize,
}

impl TruncateIndexWriter {
    pub fn create(
        index_config: &IndexConfig,
        config: &TruncateConfig,
        outputs: &[OutputSegmentMergeInfo],
    ) -> Result<TruncateIndexWriter> {
        let index_name = index_config.truncate_index_name(&config.name);
        let format = index_config.format;
        let resources = create_output_resources(outputs, &index_name, &format, false, None)?;
        Ok(TruncateIndexWriter {
            config: config.clone(),
            index_name,
            format,
            resources,
            term_count: 0,
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn term_count(&self) -> usize {
        self.term_count
    }

    pub fn need_truncate(&self, df: u32) -> bool {
        df > self.config.df_threshold
    }

    /// Documents the truncated list of a term with `df` documents holds.
    pub fn truncate_posting_count(&self, df: u32) -> usize {
        (df as usize).min(self.config.limit)
    }

    /// Documents a full truncated list holds.
    pub fn truncate_meta_posting_count(&self) -> usize {
        self.config.limit
    }

    /// Keeps the best `limit` documents of `iterator` by the sort rule and
    /// writes them, in doc id order, as the posting of `key`.
    pub fn add_posting(
        &mut self,
        key: DictKey,
        mut iterator: PostingIterator,
        term_payload: u16,
        reclaim_map: &ReclaimMap,
        pool: &mut BufferPool,
    ) -> Result<()> {
        let mut matches = iterator.collect_all()?;
        self.select(&mut matches);
        let mut writer = MultiSegmentPostingWriter::new(
            self.format.posting_format_option,
            TermIndexMode::Normal,
            self.resources.len(),
            pool,
        );
        for matched in &matches {
            let (target, local_doc_id) = reclaim_map.get_local_id(matched.doc_id);
            writer.add_match(target, local_doc_id, matched)?;
        }
        writer.set_term_payload(term_payload)?;
        writer.end_segment()?;
        writer.dump(key, &mut self.resources, term_payload)?;
        writer.recycle(pool);
        self.term_count += 1;
        Ok(())
    }

    fn select(&self, matches: &mut Vec<TermMatch>) {
        match self.config.sort_rule {
            TruncateSortRule::DocPayloadDesc => {
                matches.sort_by(|a, b| {
                    b.doc_payload
                        .cmp(&a.doc_payload)
                        .then(a.doc_id.cmp(&b.doc_id))
                });
                matches.truncate(self.config.limit);
                matches.sort_by_key(|m| m.doc_id);
            }
            TruncateSortRule::DocIdAsc => matches.truncate(self.config.limit),
        }
    }

    /// Io buffers of the outputs plus one full truncated list.
    pub fn estimate_memory_use(
        config: &TruncateConfig,
        output_count: usize,
        io_buffer_size: usize,
    ) -> usize {
        output_count * io_buffer_size * 2 + config.limit * mem::size_of::<TermMatch>()
    }

    /// Closes the outputs and writes the format option of every truncate index.
    pub fn end(&mut self) -> Result<()> {
        for resource in &mut self.resources {
            resource.reset()?;
            self.format.store(resource.index_directory().as_ref())?;
        }
        info!(
            "truncate index {} holds {} terms",
            self.index_name, self.term_count
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{DictKeyType, PostingFormatOption};
    use crate::core::store::directory::{DirectoryRc, RAMDirectory};
    use std::sync::Arc;

    fn truncate_writer(limit: usize, sort_rule: TruncateSortRule) -> TruncateIndexWriter {
        let format =
            IndexFormatOption::new(PostingFormatOption::default(), DictKeyType::U64, false);
        let index_config = IndexConfig::new("body", format);
        let directory: DirectoryRc = Arc::new(RAMDirectory::new());
        let outputs = vec![OutputSegmentMergeInfo::new(0, directory)];
        let config = TruncateConfig::new("top", 2, limit, sort_rule);
        TruncateIndexWriter::create(&index_config, &config, &outputs).unwrap()
    }

    fn matches(payloads: &[u16]) -> Vec<TermMatch> {
        payloads
            .iter()
            .enumerate()
            .map(|(doc, &doc_payload)| TermMatch {
                doc_id: doc as i32,
                tf: 1,
                doc_payload,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_truncate_counts() {
        let writer = truncate_writer(3, TruncateSortRule::DocIdAsc);
        assert_eq!(writer.index_name(), "body_top");
        assert!(!writer.need_truncate(2));
        assert!(writer.need_truncate(3));
        assert_eq!(writer.truncate_posting_count(2), 2);
        assert_eq!(writer.truncate_posting_count(10), 3);
        assert_eq!(writer.truncate_meta_posting_count(), 3);
    }

    #[test]
    fn test_select_by_doc_payload() {
        let writer = truncate_writer(2, TruncateSortRule::DocPayloadDesc);
        let mut selected = matches(&[5, 9, 1, 9]);
        writer.select(&mut selected);
        let docs: Vec<i32> = selected.iter().map(|m| m.doc_id).collect();
        assert_eq!(docs, vec![1, 3]);

        let writer = truncate_writer(2, TruncateSortRule::DocIdAsc);
        let mut selected = matches(&[5, 9, 1, 9]);
        writer.select(&mut selected);
        let docs: Vec<i32> = selected.iter().map(|m| m.doc_id).collect();
        assert_eq!(docs, vec![0, 1]);
    }
}
