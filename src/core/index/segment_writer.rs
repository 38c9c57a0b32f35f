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

use crate::core::codec::postings::{BitmapPostingWriter, PostingWriter, PostingWriterImpl};
use crate::core::index::{IndexConfig, IndexDataWriter};
use crate::core::store::directory::Directory;
use crate::core::util::{BufferPool, DictKey, DocId, INVALID_DOCID};
use crate::error::ErrorKind::InconsistentState;
use crate::error::Result;

use std::collections::{BTreeMap, BTreeSet};

/// Builds the files of one index of a new segment from tokenized documents.
///
/// Tokens of a document are added with `add_token`, then the document is
/// closed with `end_document`. Keys of the high frequency vocabulary also get
/// a bitmap posting, and only that one when the vocabulary is bitmap only.
pub struct SegmentIndexWriter {
    config: IndexConfig,
    pool: BufferPool,
    postings: BTreeMap<DictKey, PostingWriterImpl>,
    bitmap_postings: BTreeMap<DictKey, BitmapPostingWriter>,
    term_payloads: BTreeMap<DictKey, u16>,
    current_doc_keys: BTreeSet<DictKey>,
    last_doc_id: DocId,
}

impl SegmentIndexWriter {
    pub fn new(config: IndexConfig) -> Result<SegmentIndexWriter> {
        config.check()?;
        Ok(SegmentIndexWriter {
            config,
            pool: BufferPool::new("segment_index_writer"),
            postings: BTreeMap::new(),
            bitmap_postings: BTreeMap::new(),
            term_payloads: BTreeMap::new(),
            current_doc_keys: BTreeSet::new(),
            last_doc_id: INVALID_DOCID,
        })
    }

    fn has_normal_posting(&self, key: DictKey) -> bool {
        match self.config.high_frequency {
            Some(ref hf) => !(hf.is_bitmap_only() && hf.contains(key)),
            None => true,
        }
    }

    pub fn add_token(
        &mut self,
        key: DictKey,
        pos: u32,
        pos_payload: u8,
        field_index: u8,
    ) -> Result<()> {
        if self.has_normal_posting(key) {
            let option = self.config.format.posting_format_option;
            let pool = &mut self.pool;
            self.postings
                .entry(key)
                .or_insert_with(|| PostingWriterImpl::new(option, pool))
                .add_position(pos, pos_payload, field_index)?;
        }
        if self.config.is_high_frequency_term(key) {
            self.bitmap_postings.entry(key).or_default();
        }
        self.current_doc_keys.insert(key);
        Ok(())
    }

    pub fn end_document(&mut self, doc_id: DocId, doc_payload: u16) -> Result<()> {
        if doc_id <= self.last_doc_id {
            bail!(InconsistentState(format!(
                "doc {} ends after doc {}",
                doc_id, self.last_doc_id
            )));
        }
        for key in &self.current_doc_keys {
            if let Some(writer) = self.postings.get_mut(key) {
                writer.end_document(doc_id, doc_payload)?;
            }
            if let Some(writer) = self.bitmap_postings.get_mut(key) {
                writer.end_document(doc_id)?;
            }
        }
        self.current_doc_keys.clear();
        self.last_doc_id = doc_id;
        Ok(())
    }

    pub fn set_term_payload(&mut self, key: DictKey, term_payload: u16) {
        self.term_payloads.insert(key, term_payload);
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Writes the index into `<directory>/<index name>/`.
    pub fn dump(mut self, directory: &dyn Directory) -> Result<()> {
        if !self.current_doc_keys.is_empty() {
            bail!(InconsistentState(
                "dump with an unfinished document".into()
            ));
        }
        let index_dir = directory.sub_directory(&self.config.index_name)?;
        let format = self.config.format;

        let mut normal = IndexDataWriter::create_normal(index_dir.as_ref(), &format, None)?;
        let postings = ::std::mem::replace(&mut self.postings, BTreeMap::new());
        for (key, mut writer) in postings {
            writer.set_term_payload(self.term_payloads.get(&key).copied().unwrap_or(0))?;
            writer.end_segment()?;
            normal.add_term(key, &writer)?;
            writer.recycle(&mut self.pool);
        }
        normal.close()?;

        if self.config.high_frequency.is_some() {
            let mut bitmap = IndexDataWriter::create_bitmap(index_dir.as_ref(), &format, None)?;
            for (key, writer) in &mut self.bitmap_postings {
                writer.set_term_payload(self.term_payloads.get(key).copied().unwrap_or(0));
                bitmap.add_term(*key, &*writer)?;
            }
            bitmap.close()?;
        }
        format.store(index_dir.as_ref())?;
        debug!(
            "dumped index {} of {} docs: {} terms, {} bitmap terms",
            self.config.index_name,
            self.last_doc_id + 1,
            normal.term_count(),
            self.bitmap_postings.len()
        );
        self.pool.reset();
        Ok(())
    }
}
