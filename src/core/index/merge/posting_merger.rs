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
use crate::core::codec::PostingFormatOption;
use crate::core::index::merge::{
    MultiSegmentPostingWriter, OneDocMerger, PostingOutput, SegmentTermInfo,
};
use crate::core::index::ReclaimMap;
use crate::core::util::{BufferPool, DictKey, DocId, INVALID_DOCID};
use crate::error::Result;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One source of a sorted merge, positioned on its next live document.
struct PostingListSortedItem<'a> {
    merger: OneDocMerger<'a>,
    base_doc_id: DocId,
    new_doc_id: DocId,
    target: usize,
    local_doc_id: DocId,
}

impl<'a> PostingListSortedItem<'a> {
    fn new(merger: OneDocMerger<'a>, base_doc_id: DocId) -> Self {
        PostingListSortedItem {
            merger,
            base_doc_id,
            new_doc_id: INVALID_DOCID,
            target: 0,
            local_doc_id: INVALID_DOCID,
        }
    }

    /// Advances past deleted documents, false when none is left.
    fn next(&mut self, reclaim_map: &ReclaimMap) -> Result<bool> {
        while self.merger.next()? {
            let old_doc_id = self.base_doc_id + self.merger.current_doc_id();
            let new_doc_id = reclaim_map.get_new_id(old_doc_id);
            if new_doc_id == INVALID_DOCID {
                self.merger.skip_doc()?;
                continue;
            }
            let (target, local_doc_id) = reclaim_map.get_local_id(new_doc_id);
            self.new_doc_id = new_doc_id;
            self.target = target;
            self.local_doc_id = local_doc_id;
            return Ok(true);
        }
        Ok(false)
    }

    fn merge_into(&mut self, writer: &mut MultiSegmentPostingWriter) -> Result<()> {
        let local_doc_id = self.local_doc_id;
        self.merger
            .merge_doc(Some(writer.writer_mut(self.target)?), local_doc_id)
    }
}

impl<'a> Eq for PostingListSortedItem<'a> {}

impl<'a> PartialEq for PostingListSortedItem<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.new_doc_id == other.new_doc_id
    }
}

impl<'a> Ord for PostingListSortedItem<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed for binary heap
        other.new_doc_id.cmp(&self.new_doc_id)
    }
}

impl<'a> PartialOrd for PostingListSortedItem<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Merges the postings a term has in the source segments into the target
/// segments, remapping doc ids through a `ReclaimMap`.
pub struct PostingMerger {
    writer: MultiSegmentPostingWriter,
    term_payload: u16,
}

impl PostingMerger {
    /// `option` is the format of the `mode` stream.
    pub fn new(
        option: PostingFormatOption,
        mode: TermIndexMode,
        target_count: usize,
        pool: &mut BufferPool,
    ) -> Self {
        PostingMerger {
            writer: MultiSegmentPostingWriter::new(option, mode, target_count, pool),
            term_payload: 0,
        }
    }

    /// Copies the sources one after another, the reclaim map must keep their
    /// relative order.
    pub fn merge(
        &mut self,
        term_infos: &mut [SegmentTermInfo],
        reclaim_map: &ReclaimMap,
    ) -> Result<()> {
        for info in term_infos.iter_mut() {
            if let Some(term_payload) = info.decoder.term_payload() {
                self.term_payload = term_payload;
            }
            let base_doc_id = info.base_doc_id;
            let mut merger = OneDocMerger::new(&mut info.decoder);
            while merger.next()? {
                let old_doc_id = base_doc_id + merger.current_doc_id();
                match reclaim_map.get_new_local_id(old_doc_id) {
                    Some((target, local_doc_id)) => {
                        merger.merge_doc(Some(self.writer.writer_mut(target)?), local_doc_id)?
                    }
                    None => merger.skip_doc()?,
                }
            }
        }
        self.end_merge()
    }

    /// Interleaves the documents of all sources by new global doc id.
    pub fn sort_by_weight_merge(
        &mut self,
        term_infos: &mut [SegmentTermInfo],
        reclaim_map: &ReclaimMap,
    ) -> Result<()> {
        let mut heap = BinaryHeap::with_capacity(term_infos.len());
        for info in term_infos.iter_mut() {
            if let Some(term_payload) = info.decoder.term_payload() {
                self.term_payload = term_payload;
            }
            let mut item =
                PostingListSortedItem::new(OneDocMerger::new(&mut info.decoder), info.base_doc_id);
            if item.next(reclaim_map)? {
                heap.push(item);
            }
        }
        while let Some(mut item) = heap.pop() {
            item.merge_into(&mut self.writer)?;
            if item.next(reclaim_map)? {
                heap.push(item);
            }
        }
        self.end_merge()
    }

    fn end_merge(&mut self) -> Result<()> {
        self.writer.set_term_payload(self.term_payload)?;
        self.writer.end_segment()
    }

    pub fn mode(&self) -> TermIndexMode {
        self.writer.mode()
    }

    pub fn doc_freq(&self) -> u32 {
        self.writer.df()
    }

    pub fn total_tf(&self) -> u64 {
        self.writer.total_tf()
    }

    /// Payload of the last source that stores one.
    pub fn term_payload(&self) -> u16 {
        self.term_payload
    }

    pub fn dump_length(&self) -> usize {
        self.writer.dump_length()
    }

    pub fn create_posting_iterator(&self, reclaim_map: &ReclaimMap) -> Result<PostingIterator> {
        self.writer.create_posting_iterator(reclaim_map)
    }

    pub fn dump<R: PostingOutput>(&mut self, key: DictKey, outputs: &mut [R]) -> Result<()> {
        let term_payload = self.term_payload;
        self.writer.dump(key, outputs, term_payload)
    }

    pub fn recycle(self, pool: &mut BufferPool) {
        self.writer.recycle(pool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::postings::{PostingWriter, PostingWriterImpl};

    fn option() -> PostingFormatOption {
        PostingFormatOption {
            has_term_payload: true,
            has_doc_payload: true,
            ..PostingFormatOption::with_positions()
        }
    }

    fn source(
        segment_id: u32,
        base_doc_id: DocId,
        payloads: &[u16],
        term_payload: u16,
    ) -> SegmentTermInfo {
        let mut pool = BufferPool::new("test");
        let mut writer = PostingWriterImpl::new(option(), &mut pool);
        for (doc, &payload) in payloads.iter().enumerate() {
            writer.add_position(doc as u32, 0, 0).unwrap();
            writer.end_document(doc as DocId, payload).unwrap();
        }
        writer.set_term_payload(term_payload).unwrap();
        writer.end_segment().unwrap();
        SegmentTermInfo::new(segment_id, base_doc_id, writer.snapshot().unwrap())
    }

    fn merged_docs(merger: &PostingMerger, reclaim_map: &ReclaimMap) -> Vec<(DocId, u16)> {
        merger
            .create_posting_iterator(reclaim_map)
            .unwrap()
            .collect_all()
            .unwrap()
            .iter()
            .map(|m| (m.doc_id, m.doc_payload))
            .collect()
    }

    #[test]
    fn test_merge_drops_deleted_docs() {
        let mut infos = vec![source(0, 0, &[10, 11, 12], 7), source(1, 3, &[20, 21], 9)];
        let reclaim_map = ReclaimMap::new(vec![0, INVALID_DOCID, 1, 2, 3], vec![0]).unwrap();
        let mut pool = BufferPool::new("test");
        let mut merger = PostingMerger::new(option(), TermIndexMode::Normal, 1, &mut pool);
        merger.merge(&mut infos, &reclaim_map).unwrap();

        assert_eq!(merger.doc_freq(), 4);
        assert_eq!(merger.total_tf(), 4);
        assert_eq!(merger.term_payload(), 9);
        assert_eq!(
            merged_docs(&merger, &reclaim_map),
            vec![(0, 10), (1, 12), (2, 20), (3, 21)]
        );
        merger.recycle(&mut pool);
    }

    #[test]
    fn test_sort_by_weight_merge() {
        let mut infos = vec![source(0, 0, &[10, 11, 12], 7), source(1, 3, &[20, 21], 9)];
        // the second segment goes first, split over two targets
        let reclaim_map = ReclaimMap::new(vec![2, 3, 4, 0, 1], vec![0, 3]).unwrap();
        let mut pool = BufferPool::new("test");

        let mut merger = PostingMerger::new(option(), TermIndexMode::Normal, 2, &mut pool);
        merger.sort_by_weight_merge(&mut infos, &reclaim_map).unwrap();
        assert_eq!(merger.doc_freq(), 5);
        assert_eq!(
            merged_docs(&merger, &reclaim_map),
            vec![(0, 20), (1, 21), (2, 10), (3, 11), (4, 12)]
        );

        let mut infos = vec![source(0, 0, &[10, 11, 12], 7), source(1, 3, &[20, 21], 9)];
        let mut merger = PostingMerger::new(option(), TermIndexMode::Normal, 2, &mut pool);
        assert!(merger.merge(&mut infos, &reclaim_map).is_err());
    }

    #[test]
    fn test_all_deleted() {
        let mut infos = vec![source(0, 0, &[10, 11], 7)];
        let reclaim_map = ReclaimMap::new(vec![INVALID_DOCID, INVALID_DOCID, 0], vec![0]).unwrap();
        let mut pool = BufferPool::new("test");
        let mut merger = PostingMerger::new(option(), TermIndexMode::Normal, 1, &mut pool);
        merger.sort_by_weight_merge(&mut infos, &reclaim_map).unwrap();
        assert_eq!(merger.doc_freq(), 0);
        assert!(merger.create_posting_iterator(&reclaim_map).unwrap().next().unwrap().is_none());
    }
}
