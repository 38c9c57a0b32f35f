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

use crate::core::codec::postings::{
    PostingIterator, PostingWriter, TermMatch, TermIndexMode, TermPostingWriter,
};
use crate::core::codec::PostingFormatOption;
use crate::core::index::merge::IndexOutputSegmentResource;
use crate::core::index::{IndexDataWriter, ReclaimMap};
use crate::core::util::{BufferPool, DictKey, DocId};
use crate::error::ErrorKind::InconsistentState;
use crate::error::Result;

/// Where a merged term of one target segment gets written.
pub trait PostingOutput {
    fn data_writer(&mut self, mode: TermIndexMode) -> Result<&mut IndexDataWriter>;
}

impl PostingOutput for IndexOutputSegmentResource {
    fn data_writer(&mut self, mode: TermIndexMode) -> Result<&mut IndexDataWriter> {
        self.writer(mode)
    }
}

impl PostingOutput for IndexDataWriter {
    fn data_writer(&mut self, _mode: TermIndexMode) -> Result<&mut IndexDataWriter> {
        Ok(self)
    }
}

/// The posting writers of one term, one per target segment.
pub struct MultiSegmentPostingWriter {
    option: PostingFormatOption,
    mode: TermIndexMode,
    writers: Vec<TermPostingWriter>,
}

impl MultiSegmentPostingWriter {
    /// `option` is the format of the `mode` stream.
    pub fn new(
        option: PostingFormatOption,
        mode: TermIndexMode,
        target_count: usize,
        pool: &mut BufferPool,
    ) -> Self {
        let writers = (0..target_count)
            .map(|_| TermPostingWriter::new(option, mode, pool))
            .collect();
        MultiSegmentPostingWriter {
            option,
            mode,
            writers,
        }
    }

    pub fn mode(&self) -> TermIndexMode {
        self.mode
    }

    pub fn target_count(&self) -> usize {
        self.writers.len()
    }

    pub fn writer_mut(&mut self, target: usize) -> Result<&mut TermPostingWriter> {
        let count = self.writers.len();
        match self.writers.get_mut(target) {
            Some(w) => Ok(w),
            None => bail!(InconsistentState(format!(
                "target segment {} of {}",
                target, count
            ))),
        }
    }

    /// Appends a decoded document to the writer of `target`.
    pub fn add_match(
        &mut self,
        target: usize,
        local_doc_id: DocId,
        matched: &TermMatch,
    ) -> Result<()> {
        let has_positions = self.option.has_position_list;
        let writer = self.writer_mut(target)?;
        if has_positions {
            for (&pos, &payload) in matched
                .positions
                .iter()
                .zip(matched.position_payloads.iter())
            {
                writer.add_position(pos, payload, 0)?;
            }
        } else {
            for _ in 0..matched.tf {
                writer.add_position(0, 0, 0)?;
            }
        }
        writer.end_document_with_field_map(local_doc_id, matched.doc_payload, matched.field_map)
    }

    pub fn end_segment(&mut self) -> Result<()> {
        for writer in &mut self.writers {
            writer.end_segment()?;
        }
        Ok(())
    }

    pub fn set_term_payload(&mut self, term_payload: u16) -> Result<()> {
        for writer in &mut self.writers {
            writer.set_term_payload(term_payload)?;
        }
        Ok(())
    }

    pub fn df(&self) -> u32 {
        self.writers.iter().map(|w| w.df()).sum()
    }

    pub fn total_tf(&self) -> u64 {
        self.writers.iter().map(|w| w.total_tf()).sum()
    }

    /// Writes the term into every target segment holding documents of it.
    pub fn dump<R: PostingOutput>(
        &mut self,
        key: DictKey,
        outputs: &mut [R],
        term_payload: u16,
    ) -> Result<()> {
        if outputs.len() != self.writers.len() {
            bail!(InconsistentState(format!(
                "{} outputs for {} target segments",
                outputs.len(),
                self.writers.len()
            )));
        }
        for (writer, output) in self.writers.iter_mut().zip(outputs.iter_mut()) {
            if writer.df() == 0 {
                continue;
            }
            writer.set_term_payload(term_payload)?;
            output.data_writer(self.mode)?.add_term(key, &*writer)?;
        }
        Ok(())
    }

    /// Replays the merged term in new global doc id order.
    pub fn create_posting_iterator(&self, reclaim_map: &ReclaimMap) -> Result<PostingIterator> {
        let mut parts = Vec::with_capacity(self.writers.len());
        for (target, writer) in self.writers.iter().enumerate() {
            if writer.df() > 0 {
                parts.push((
                    reclaim_map.target_base_doc_id(target),
                    writer.snapshot(&self.option)?,
                ));
            }
        }
        Ok(PostingIterator::new(parts))
    }

    /// Worst case bytes the term takes in the posting files.
    pub fn dump_length(&self) -> usize {
        self.writers.iter().map(|w| w.dump_length()).sum()
    }

    pub fn recycle(self, pool: &mut BufferPool) {
        for writer in self.writers {
            writer.recycle(pool);
        }
    }
}
