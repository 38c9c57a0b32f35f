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

use crate::core::codec::postings::{PostingDecoder, MAX_DOC_PER_RECORD, MAX_POS_PER_RECORD};
use crate::core::util::DocId;
use crate::error::ErrorKind::IndexCollapsed;
use crate::error::Result;

use std::collections::VecDeque;

/// One document of a decoded posting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DocInfo {
    pub doc_id: DocId,
    pub tf: u32,
    pub doc_payload: u16,
    pub field_map: u8,
}

/// Record buffers to walk a `PostingDecoder` one document and one position
/// at a time.
pub struct PostingCursor {
    docs: Vec<DocId>,
    tfs: Vec<u32>,
    doc_payloads: Vec<u16>,
    field_maps: Vec<u8>,
    doc_count: usize,
    doc_cursor: usize,
    positions: Vec<u32>,
    pos_payloads: Vec<u8>,
    pos_count: usize,
    pos_cursor: usize,
}

impl Default for PostingCursor {
    fn default() -> Self {
        PostingCursor {
            docs: vec![0; MAX_DOC_PER_RECORD],
            tfs: vec![0; MAX_DOC_PER_RECORD],
            doc_payloads: vec![0; MAX_DOC_PER_RECORD],
            field_maps: vec![0; MAX_DOC_PER_RECORD],
            doc_count: 0,
            doc_cursor: 0,
            positions: vec![0; MAX_POS_PER_RECORD],
            pos_payloads: vec![0; MAX_POS_PER_RECORD],
            pos_count: 0,
            pos_cursor: 0,
        }
    }
}

impl PostingCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next document of `decoder`, its positions must be consumed with
    /// `next_position` before the following call.
    pub fn next_doc(&mut self, decoder: &mut PostingDecoder) -> Result<Option<DocInfo>> {
        if self.doc_cursor == self.doc_count {
            self.doc_count = decoder.decode_doc_list(
                &mut self.docs,
                &mut self.tfs,
                &mut self.doc_payloads,
                &mut self.field_maps,
            )?;
            self.doc_cursor = 0;
            if self.doc_count == 0 {
                return Ok(None);
            }
        }
        let i = self.doc_cursor;
        self.doc_cursor += 1;
        Ok(Some(DocInfo {
            doc_id: self.docs[i],
            tf: self.tfs[i],
            doc_payload: self.doc_payloads[i],
            field_map: self.field_maps[i],
        }))
    }

    /// Next position delta and payload of the current document.
    pub fn next_position(&mut self, decoder: &mut PostingDecoder) -> Result<(u32, u8)> {
        if self.pos_cursor == self.pos_count {
            self.pos_count = decoder.decode_pos_list(&mut self.positions, &mut self.pos_payloads)?;
            self.pos_cursor = 0;
            if self.pos_count == 0 {
                bail!(IndexCollapsed(
                    "position list ended before the doc list".into()
                ));
            }
        }
        let i = self.pos_cursor;
        self.pos_cursor += 1;
        Ok((self.positions[i], self.pos_payloads[i]))
    }

    /// Reads the positions of a document with `tf` occurrences, resolving the
    /// deltas to in-document positions.
    pub fn read_positions(
        &mut self,
        decoder: &mut PostingDecoder,
        tf: u32,
        positions: &mut Vec<u32>,
        payloads: &mut Vec<u8>,
    ) -> Result<()> {
        positions.clear();
        payloads.clear();
        if !decoder.has_position_list() {
            return Ok(());
        }
        let mut pos = 0u32;
        for _ in 0..tf {
            let (delta, payload) = self.next_position(decoder)?;
            pos += delta;
            positions.push(pos);
            payloads.push(payload);
        }
        Ok(())
    }
}

/// A document together with its positions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TermMatch {
    pub doc_id: DocId,
    pub tf: u32,
    pub doc_payload: u16,
    pub field_map: u8,
    pub positions: Vec<u32>,
    pub position_payloads: Vec<u8>,
}

/// Walks several postings back to back, shifting each part's doc ids by
/// its base.
pub struct PostingIterator {
    parts: VecDeque<(DocId, PostingDecoder)>,
    cursor: PostingCursor,
}

impl PostingIterator {
    pub fn new(parts: Vec<(DocId, PostingDecoder)>) -> Self {
        PostingIterator {
            parts: parts.into(),
            cursor: PostingCursor::new(),
        }
    }

    pub fn next(&mut self) -> Result<Option<TermMatch>> {
        loop {
            let (base, decoder) = match self.parts.front_mut() {
                Some(part) => (part.0, &mut part.1),
                None => return Ok(None),
            };
            if let Some(info) = self.cursor.next_doc(decoder)? {
                let mut matched = TermMatch {
                    doc_id: base + info.doc_id,
                    tf: info.tf,
                    doc_payload: info.doc_payload,
                    field_map: info.field_map,
                    positions: Vec::new(),
                    position_payloads: Vec::new(),
                };
                self.cursor.read_positions(
                    decoder,
                    info.tf,
                    &mut matched.positions,
                    &mut matched.position_payloads,
                )?;
                return Ok(Some(matched));
            }
            self.parts.pop_front();
            self.cursor = PostingCursor::new();
        }
    }

    /// Drains the remaining documents.
    pub fn collect_all(&mut self) -> Result<Vec<TermMatch>> {
        let mut result = Vec::new();
        while let Some(m) = self.next()? {
            result.push(m);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::postings::{PostingWriter, PostingWriterImpl};
    use crate::core::codec::PostingFormatOption;
    use crate::core::util::BufferPool;

    fn build(option: PostingFormatOption, docs: &[(DocId, &[u32])]) -> PostingDecoder {
        let mut pool = BufferPool::new("test");
        let mut writer = PostingWriterImpl::new(option, &mut pool);
        for &(doc_id, positions) in docs {
            for &pos in positions {
                writer.add_position(pos, (pos % 7) as u8, 0).unwrap();
            }
            writer.end_document(doc_id, 0).unwrap();
        }
        writer.end_segment().unwrap();
        writer.snapshot().unwrap()
    }

    #[test]
    fn test_iterate_parts_with_positions() {
        let option = PostingFormatOption::with_positions();
        let first = build(option, &[(0, &[1, 4][..]), (2, &[0][..])]);
        let many: Vec<u32> = (0..200).collect();
        let second = build(option, &[(1, &many[..]), (3, &[9][..])]);

        let mut iter = PostingIterator::new(vec![(0, first), (10, second)]);
        let all = iter.collect_all().unwrap();
        let doc_ids: Vec<DocId> = all.iter().map(|m| m.doc_id).collect();
        assert_eq!(doc_ids, vec![0, 2, 11, 13]);
        assert_eq!(all[0].positions, vec![1, 4]);
        assert_eq!(all[0].position_payloads, vec![1, 4]);
        assert_eq!(all[2].tf, 200);
        assert_eq!(all[2].positions, many);
        assert_eq!(all[3].positions, vec![9]);
        assert_eq!(all[3].position_payloads, vec![2]);
        assert_eq!(iter.next().unwrap(), None);
    }
}
