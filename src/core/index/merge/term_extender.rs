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
use crate::core::index::merge::{
    AdaptiveBitmapIndexWriter, OutputSegmentMergeInfo, PostingMerger, TruncateIndexWriter,
};
use crate::core::index::{IndexConfig, ReclaimMap};
use crate::core::util::{BufferPool, DictKey};
use crate::error::Result;

/// What happens to the full posting of a merged term.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TermOperation {
    Remain,
    /// The term is left out of the target dictionary, a derived index holds
    /// what is needed of it.
    Discard,
}

/// Feeds merged terms to the truncate and adaptive bitmap indexes.
pub struct TermExtender {
    index_config: IndexConfig,
    truncate_writers: Vec<TruncateIndexWriter>,
    adaptive_writer: Option<AdaptiveBitmapIndexWriter>,
}

impl TermExtender {
    /// `None` when the index has neither truncate nor adaptive bitmap configs.
    pub fn create(
        index_config: &IndexConfig,
        outputs: &[OutputSegmentMergeInfo],
        reclaim_map: &ReclaimMap,
    ) -> Result<Option<TermExtender>> {
        if !Self::is_active(index_config) {
            return Ok(None);
        }
        let mut truncate_writers = Vec::with_capacity(index_config.truncate.len());
        for config in &index_config.truncate {
            truncate_writers.push(TruncateIndexWriter::create(index_config, config, outputs)?);
        }
        let adaptive_writer = match index_config.adaptive_bitmap {
            Some(ref config) => Some(AdaptiveBitmapIndexWriter::create(
                index_config,
                config,
                outputs,
                reclaim_map.new_doc_count(),
            )?),
            None => None,
        };
        Ok(Some(TermExtender {
            index_config: index_config.clone(),
            truncate_writers,
            adaptive_writer,
        }))
    }

    pub fn is_active(index_config: &IndexConfig) -> bool {
        !index_config.truncate.is_empty() || index_config.adaptive_bitmap.is_some()
    }

    fn is_bitmap_only_high_frequency_term(&self, key: DictKey) -> bool {
        self.index_config
            .high_frequency
            .as_ref()
            .map_or(false, |hf| hf.is_bitmap_only() && hf.contains(key))
    }

    /// Runs the truncate stage, then the adaptive bitmap stage. Any stage
    /// asking for it discards the term.
    ///
    /// Truncated lists are only cut from normal postings. A bitmap only high
    /// frequency term gets no truncated list, its normal posting is discarded
    /// once a truncated list of it would be full.
    pub fn extend_term(
        &mut self,
        key: DictKey,
        merger: &PostingMerger,
        reclaim_map: &ReclaimMap,
        pool: &mut BufferPool,
    ) -> Result<TermOperation> {
        let df = merger.doc_freq();
        let mode = merger.mode();
        let mut discard = false;

        if mode == TermIndexMode::Normal {
            let bitmap_only = self.is_bitmap_only_high_frequency_term(key);
            for writer in &mut self.truncate_writers {
                if !writer.need_truncate(df) {
                    continue;
                }
                if bitmap_only {
                    if writer.truncate_posting_count(df) >= writer.truncate_meta_posting_count() {
                        discard = true;
                    }
                    continue;
                }
                writer.add_posting(
                    key,
                    merger.create_posting_iterator(reclaim_map)?,
                    merger.term_payload(),
                    reclaim_map,
                    pool,
                )?;
            }
        }

        if mode != TermIndexMode::Bitmap {
            if let Some(ref mut writer) = self.adaptive_writer {
                if writer.need_adaptive_bitmap(df) {
                    writer.add_posting(
                        key,
                        merger.create_posting_iterator(reclaim_map)?,
                        merger.term_payload(),
                        reclaim_map,
                        pool,
                    )?;
                    if writer.is_bitmap_only() {
                        discard = true;
                    }
                }
            }
        }

        Ok(if discard {
            TermOperation::Discard
        } else {
            TermOperation::Remain
        })
    }

    pub fn truncate_writers(&self) -> &[TruncateIndexWriter] {
        &self.truncate_writers
    }

    pub fn adaptive_writer(&self) -> Option<&AdaptiveBitmapIndexWriter> {
        self.adaptive_writer.as_ref()
    }

    /// Memory the extenders of `index_config` need on top of the merge.
    pub fn estimate_memory_use(
        index_config: &IndexConfig,
        total_doc_count: usize,
        output_count: usize,
        io_buffer_size: usize,
    ) -> usize {
        let truncate: usize = index_config
            .truncate
            .iter()
            .map(|c| TruncateIndexWriter::estimate_memory_use(c, output_count, io_buffer_size))
            .sum();
        let adaptive = index_config.adaptive_bitmap.map_or(0, |_| {
            AdaptiveBitmapIndexWriter::estimate_memory_use(
                total_doc_count,
                output_count,
                io_buffer_size,
            )
        });
        truncate + adaptive
    }

    pub fn end(&mut self) -> Result<()> {
        for writer in &mut self.truncate_writers {
            writer.end()?;
        }
        if let Some(ref mut writer) = self.adaptive_writer {
            writer.end()?;
        }
        Ok(())
    }
}
