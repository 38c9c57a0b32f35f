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
    DocInfo, PostingCursor, PostingDecoder, PostingWriter, TermPostingWriter,
};
use crate::core::util::{DocId, INVALID_DOCID};
use crate::error::ErrorKind::InconsistentState;
use crate::error::Result;

/// Copies the documents of one source posting into posting writers, one
/// document at a time.
///
/// Every document reached with `next` must be handed to `merge_doc`, deleted
/// ones included, so that the position stream stays aligned with the doc list.
pub struct OneDocMerger<'a> {
    decoder: &'a mut PostingDecoder,
    cursor: PostingCursor,
    current: Option<DocInfo>,
    positions: Vec<u32>,
    pos_payloads: Vec<u8>,
}

impl<'a> OneDocMerger<'a> {
    pub fn new(decoder: &'a mut PostingDecoder) -> Self {
        OneDocMerger {
            decoder,
            cursor: PostingCursor::new(),
            current: None,
            positions: Vec::new(),
            pos_payloads: Vec::new(),
        }
    }

    /// Moves to the next document, false once the posting is exhausted.
    pub fn next(&mut self) -> Result<bool> {
        self.current = self.cursor.next_doc(self.decoder)?;
        Ok(self.current.is_some())
    }

    /// Segment local id of the current document.
    pub fn current_doc_id(&self) -> DocId {
        self.current.map_or(INVALID_DOCID, |info| info.doc_id)
    }

    /// Writes the current document into `writer` as `new_doc_id`. Without a
    /// writer the document is only consumed.
    pub fn merge_doc<W: PostingWriter>(
        &mut self,
        writer: Option<&mut W>,
        new_doc_id: DocId,
    ) -> Result<()> {
        let info = match self.current.take() {
            Some(info) => info,
            None => bail!(InconsistentState("no current document to merge".into())),
        };
        self.cursor.read_positions(
            self.decoder,
            info.tf,
            &mut self.positions,
            &mut self.pos_payloads,
        )?;
        let writer = match writer {
            Some(w) => w,
            None => return Ok(()),
        };
        if self.decoder.has_position_list() {
            for (&pos, &payload) in self.positions.iter().zip(self.pos_payloads.iter()) {
                writer.add_position(pos, payload, 0)?;
            }
        } else {
            for _ in 0..info.tf {
                writer.add_position(0, 0, 0)?;
            }
        }
        writer.end_document_with_field_map(new_doc_id, info.doc_payload, info.field_map)
    }

    /// Consumes a deleted document.
    pub fn skip_doc(&mut self) -> Result<()> {
        self.merge_doc::<TermPostingWriter>(None, INVALID_DOCID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::postings::{PostingIterator, PostingWriterImpl};
    use crate::core::codec::PostingFormatOption;
    use crate::core::util::BufferPool;

    #[test]
    fn test_skip_keeps_positions_aligned() {
        let option = PostingFormatOption {
            has_field_map: true,
            has_doc_payload: true,
            ..PostingFormatOption::with_positions()
        };
        let mut pool = BufferPool::new("test");
        let mut source = PostingWriterImpl::new(option, &mut pool);
        for doc in 0..200 {
            for pos in 0..(doc % 3 + 1) as u32 {
                source.add_position(pos * 2, pos as u8, 1).unwrap();
            }
            source.end_document(doc, doc as u16).unwrap();
        }
        source.end_segment().unwrap();
        let mut decoder = source.snapshot().unwrap();

        let mut target = PostingWriterImpl::new(option, &mut pool);
        let mut merger = OneDocMerger::new(&mut decoder);
        let mut new_id = 0;
        while merger.next().unwrap() {
            if merger.current_doc_id() % 2 == 0 {
                merger.skip_doc().unwrap();
            } else {
                merger.merge_doc(Some(&mut target), new_id).unwrap();
                new_id += 1;
            }
        }
        assert_eq!(merger.current_doc_id(), INVALID_DOCID);
        assert!(merger.merge_doc(Some(&mut target), new_id).is_err());
        target.end_segment().unwrap();
        assert_eq!(target.df(), 100);

        let matches = PostingIterator::new(vec![(0, target.snapshot().unwrap())])
            .collect_all()
            .unwrap();
        // source doc 5 has tf 3 and becomes doc 2
        assert_eq!(matches[2].doc_id, 2);
        assert_eq!(matches[2].doc_payload, 5);
        assert_eq!(matches[2].field_map, 0b10);
        assert_eq!(matches[2].positions, vec![0, 2, 4]);
        assert_eq!(matches[2].position_payloads, vec![0, 1, 2]);
    }
}
