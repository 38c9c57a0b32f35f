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

use crate::core::codec::dictionary::open_disk_dictionary_iterator;
use crate::core::codec::postings::TermIndexMode;
use crate::core::codec::{
    dict_value_offset, is_dict_inline, IndexFormatOption, PostingFormatOption,
    DICTIONARY_FILE_NAME, INDEX_FORMAT_OPTION_FILE_NAME, POSTING_FILE_NAME,
};
use crate::core::index::merge::{
    create_output_resources, IndexOutputSegmentResource, OutputSegmentMergeInfo,
    PostingMerger, SegmentTermInfoQueue, TermExtender, TermOperation,
};
use crate::core::index::{IndexConfig, MergerConfig, ReclaimMap, SegmentData};
use crate::core::store::directory::Directory;
use crate::core::util::BufferPool;
use crate::error::ErrorKind::{IllegalArgument, InconsistentState};
use crate::error::Result;

use std::fmt;

/// Memory the merger needs whatever the index.
const FIXED_MEMORY_USE: usize = 1 << 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MergerState {
    Init,
    BeginMerge,
    Merging,
    EndMerge,
}

impl fmt::Display for MergerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Counters of the last merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Terms written to the normal dictionaries.
    pub term_count: usize,
    pub bitmap_term_count: usize,
    /// Terms with no document left.
    pub dropped_term_count: usize,
    pub discarded_term_count: usize,
    /// Bitmap terms no longer in the high frequency vocabulary.
    pub skipped_bitmap_term_count: usize,
}

/// Merges one index of a set of source segments into target segments.
///
/// Call `begin_merge` with the sources, then `merge` or
/// `sort_by_weight_merge` once. Terms are merged one at a time and all
/// per-term buffers are released before the next term. The outputs of a
/// failed merge are invalid, but the merger accepts `begin_merge` again.
pub struct IndexMerger {
    index_config: IndexConfig,
    merger_config: MergerConfig,
    state: MergerState,
    segments: Vec<SegmentData>,
    pool: BufferPool,
    stats: MergeStats,
}

impl IndexMerger {
    pub fn new(index_config: IndexConfig, merger_config: MergerConfig) -> Result<IndexMerger> {
        index_config.check()?;
        if merger_config.io_buffer_size == 0 {
            bail!(IllegalArgument("io buffer size is 0".into()));
        }
        Ok(IndexMerger {
            index_config,
            merger_config,
            state: MergerState::Init,
            segments: Vec::new(),
            pool: BufferPool::new("index_merger"),
            stats: MergeStats::default(),
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_config.index_name
    }

    pub fn stats(&self) -> &MergeStats {
        &self.stats
    }

    pub fn begin_merge(&mut self, segments: Vec<SegmentData>) -> Result<()> {
        if self.state != MergerState::Init && self.state != MergerState::EndMerge {
            bail!(InconsistentState(format!(
                "begin merge of index {} in state {}",
                self.index_config.index_name, self.state
            )));
        }
        self.segments = segments;
        self.stats = MergeStats::default();
        self.state = MergerState::BeginMerge;
        Ok(())
    }

    /// Merges keeping the source order of documents, `reclaim_map` must not
    /// reorder the documents of a term.
    pub fn merge(
        &mut self,
        reclaim_map: &ReclaimMap,
        outputs: &[OutputSegmentMergeInfo],
    ) -> Result<()> {
        self.do_merge(reclaim_map, outputs, false)
    }

    /// Merges in new doc id order, whatever order `reclaim_map` gives.
    pub fn sort_by_weight_merge(
        &mut self,
        reclaim_map: &ReclaimMap,
        outputs: &[OutputSegmentMergeInfo],
    ) -> Result<()> {
        self.do_merge(reclaim_map, outputs, true)
    }

    fn do_merge(
        &mut self,
        reclaim_map: &ReclaimMap,
        outputs: &[OutputSegmentMergeInfo],
        sort_by_weight: bool,
    ) -> Result<()> {
        if self.state != MergerState::BeginMerge {
            bail!(InconsistentState(format!(
                "merge of index {} in state {}",
                self.index_config.index_name, self.state
            )));
        }
        if outputs.is_empty() {
            error!(
                "merge of index {} has no output segment",
                self.index_config.index_name
            );
            return Ok(());
        }
        if reclaim_map.target_segment_count() != outputs.len() {
            bail!(IllegalArgument(format!(
                "reclaim map has {} target segments, {} outputs given",
                reclaim_map.target_segment_count(),
                outputs.len()
            )));
        }
        self.state = MergerState::Merging;
        info!(
            "begin {}merge of index {}: {} source segments, {} outputs",
            if sort_by_weight { "sort by weight " } else { "" },
            self.index_config.index_name,
            self.segments.len(),
            outputs.len()
        );
        if let Err(e) = self.merge_terms(reclaim_map, outputs, sort_by_weight) {
            // outputs of a failed merge are invalid, the merger may begin again
            error!(
                "merge of index {} failed: {}",
                self.index_config.index_name, e
            );
            self.pool.reset();
            self.state = MergerState::EndMerge;
            return Err(e);
        }
        info!(
            "end merge of index {}: {:?}",
            self.index_config.index_name, self.stats
        );
        Ok(())
    }

    fn merge_terms(
        &mut self,
        reclaim_map: &ReclaimMap,
        outputs: &[OutputSegmentMergeInfo],
        sort_by_weight: bool,
    ) -> Result<()> {
        let format = self.index_config.format;
        let with_bitmap = self.index_config.high_frequency.is_some();
        let item_count = if self.merger_config.preload_dict_key_count
            && format.hash_typed_dictionary
        {
            Some(self.count_distinct_keys()?)
        } else {
            None
        };
        let mut resources = create_output_resources(
            outputs,
            &self.index_config.index_name,
            &format,
            with_bitmap,
            item_count,
        )?;
        let mut extender = TermExtender::create(&self.index_config, outputs, reclaim_map)?;
        let mut queue =
            SegmentTermInfoQueue::new(&self.segments, &self.index_config.index_name, with_bitmap)?;

        while !queue.is_empty() {
            let key = queue.current_key();
            let mode = queue.current_mode();
            if mode == TermIndexMode::Bitmap && !self.index_config.is_high_frequency_term(key) {
                self.stats.skipped_bitmap_term_count += 1;
                queue.move_to_next_term()?;
                continue;
            }
            let option = Self::stream_option(&format, mode);
            let mut merger = PostingMerger::new(option, mode, outputs.len(), &mut self.pool);
            {
                let (_, _, term_infos) = queue.current_term_infos()?;
                if sort_by_weight {
                    merger.sort_by_weight_merge(term_infos, reclaim_map)?;
                } else {
                    merger.merge(term_infos, reclaim_map)?;
                }
            }
            if merger.doc_freq() == 0 {
                self.stats.dropped_term_count += 1;
            } else {
                let operation = match extender {
                    Some(ref mut extender) => {
                        extender.extend_term(key, &merger, reclaim_map, &mut self.pool)?
                    }
                    None => TermOperation::Remain,
                };
                match operation {
                    TermOperation::Discard => self.stats.discarded_term_count += 1,
                    TermOperation::Remain => {
                        merger.dump(key, &mut resources)?;
                        match mode {
                            TermIndexMode::Normal => self.stats.term_count += 1,
                            TermIndexMode::Bitmap => self.stats.bitmap_term_count += 1,
                        }
                    }
                }
            }
            merger.recycle(&mut self.pool);
            self.pool.reset();
            queue.move_to_next_term()?;
        }

        self.end_merge(extender, resources, &format)
    }

    fn stream_option(format: &IndexFormatOption, mode: TermIndexMode) -> PostingFormatOption {
        match mode {
            TermIndexMode::Normal => format.posting_format_option,
            TermIndexMode::Bitmap => format.bitmap_format_option().posting_format_option,
        }
    }

    fn end_merge(
        &mut self,
        extender: Option<TermExtender>,
        mut resources: Vec<IndexOutputSegmentResource>,
        format: &IndexFormatOption,
    ) -> Result<()> {
        if let Some(mut extender) = extender {
            extender.end()?;
        }
        for resource in &mut resources {
            resource.reset()?;
            format.store(resource.index_directory().as_ref())?;
        }
        drop(resources);
        self.pool.reset();
        self.state = MergerState::EndMerge;
        Ok(())
    }

    /// Number of distinct normal keys over all sources.
    fn count_distinct_keys(&self) -> Result<usize> {
        let mut queue =
            SegmentTermInfoQueue::new(&self.segments, &self.index_config.index_name, false)?;
        let mut count = 0;
        while !queue.is_empty() {
            count += 1;
            queue.move_to_next_term()?;
        }
        debug!(
            "index {} has {} distinct keys",
            self.index_config.index_name, count
        );
        Ok(count)
    }

    /// Upper bound of the memory a merge of `segments` into `output_count`
    /// targets takes.
    pub fn estimate_memory_use(
        &self,
        segments: &[SegmentData],
        output_count: usize,
        sort_by_weight: bool,
    ) -> Result<usize> {
        let io_buffer_size = self.merger_config.io_buffer_size;
        let streams = if self.index_config.high_frequency.is_some() { 2 } else { 1 };
        let mut total = FIXED_MEMORY_USE + io_buffer_size * output_count * 2 * streams;

        let mut max_posting_length = 0;
        let mut key_count = 0;
        let mut doc_count = 0;
        for segment in segments {
            doc_count += segment.doc_count();
            let directory = segment.index_directory(&self.index_config.index_name)?;
            if !directory.file_exists(INDEX_FORMAT_OPTION_FILE_NAME) {
                continue;
            }
            let (length, keys) = Self::scan_postings(directory.as_ref())?;
            max_posting_length = max_posting_length.max(length);
            key_count += keys;
        }
        total += if sort_by_weight {
            max_posting_length * segments.len()
        } else {
            max_posting_length
        };

        let format = &self.index_config.format;
        if self.merger_config.preload_dict_key_count && format.hash_typed_dictionary {
            // key, chain pointer and value of every record
            total += key_count * (format.dict_key_type.width() + 4 + 8);
        }
        if TermExtender::is_active(&self.index_config) {
            total += max_posting_length;
            total += TermExtender::estimate_memory_use(
                &self.index_config,
                doc_count,
                output_count,
                io_buffer_size,
            );
        }
        debug!(
            "merge of index {} estimated to use {} bytes",
            self.index_config.index_name, total
        );
        Ok(total)
    }

    /// Largest posting block of an index directory and its key count.
    fn scan_postings(directory: &dyn Directory) -> Result<(usize, usize)> {
        let format = IndexFormatOption::load(directory)?;
        let posting_length = directory.file_length(POSTING_FILE_NAME)?;
        let mut iter = open_disk_dictionary_iterator(&format, directory, DICTIONARY_FILE_NAME)?;
        let mut key_count = 0;
        let mut max_length = 0;
        let mut last_offset = None;
        while let Some((_, value)) = iter.next()? {
            key_count += 1;
            if is_dict_inline(value) {
                continue;
            }
            let offset = dict_value_offset(value);
            if let Some(last) = last_offset {
                max_length = max_length.max(offset.saturating_sub(last));
            }
            last_offset = Some(offset);
        }
        if let Some(last) = last_offset {
            max_length = max_length.max(posting_length.saturating_sub(last));
        }
        Ok((max_length as usize, key_count))
    }
}
