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

use crate::core::codec::dictionary::{open_disk_dictionary_iterator, DictionaryIterator};
use crate::core::codec::postings::{PostingDecoder, TermIndexMode};
use crate::core::codec::{
    IndexFormatOption, PostingFormatOption, BITMAP_DICTIONARY_FILE_NAME,
    BITMAP_POSTING_FILE_NAME, DICTIONARY_FILE_NAME, INDEX_FORMAT_OPTION_FILE_NAME,
    POSTING_FILE_NAME,
};
use crate::core::index::SegmentData;
use crate::core::store::directory::Directory;
use crate::core::store::io::ReadOnlySource;
use crate::core::util::{DictKey, DictValue, DocId};
use crate::error::Result;

use smallvec::SmallVec;

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// The posting of the current term in one source segment.
pub struct SegmentTermInfo {
    pub segment_id: u32,
    pub base_doc_id: DocId,
    pub decoder: PostingDecoder,
}

impl SegmentTermInfo {
    pub fn new(segment_id: u32, base_doc_id: DocId, decoder: PostingDecoder) -> Self {
        SegmentTermInfo {
            segment_id,
            base_doc_id,
            decoder,
        }
    }
}

/// One dictionary stream (normal or bitmap) of one source segment.
struct TermSource {
    segment_id: u32,
    base_doc_id: DocId,
    mode: TermIndexMode,
    option: PostingFormatOption,
    iterator: Box<dyn DictionaryIterator>,
    posting: ReadOnlySource,
    current: Option<(DictKey, DictValue)>,
}

impl TermSource {
    fn open(
        segment: &SegmentData,
        directory: &dyn Directory,
        format: &IndexFormatOption,
        mode: TermIndexMode,
    ) -> Result<TermSource> {
        let (dictionary_file, posting_file) = match mode {
            TermIndexMode::Normal => (DICTIONARY_FILE_NAME, POSTING_FILE_NAME),
            TermIndexMode::Bitmap => (BITMAP_DICTIONARY_FILE_NAME, BITMAP_POSTING_FILE_NAME),
        };
        let mut source = TermSource {
            segment_id: segment.segment_id(),
            base_doc_id: segment.base_doc_id(),
            mode,
            option: format.posting_format_option,
            iterator: open_disk_dictionary_iterator(format, directory, dictionary_file)?,
            posting: directory.open_source(posting_file)?,
            current: None,
        };
        source.advance()?;
        Ok(source)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.iterator.next()?;
        Ok(())
    }

    fn open_decoder(&self, value: DictValue) -> Result<PostingDecoder> {
        match self.mode {
            TermIndexMode::Normal => PostingDecoder::open(&self.option, value, &self.posting),
            TermIndexMode::Bitmap => {
                PostingDecoder::open_bitmap(&self.option, value, &self.posting)
            }
        }
    }
}

type HeapItem = Reverse<(DictKey, TermIndexMode, usize)>;

/// Walks the dictionaries of all source segments in lock step.
///
/// Every `(key, mode)` is yielded once with the sources holding it, keys
/// ascending and the normal stream of a key before its bitmap stream. Sources
/// of a term come in segment order.
pub struct SegmentTermInfoQueue {
    sources: Vec<TermSource>,
    heap: BinaryHeap<HeapItem>,
    current_key: DictKey,
    current_mode: TermIndexMode,
    // (source index, dictionary value) of the current term
    current: SmallVec<[(usize, DictValue); 8]>,
    term_infos: Vec<SegmentTermInfo>,
}

impl SegmentTermInfoQueue {
    /// Opens `index_name` in every segment that has it, bitmap streams only
    /// when `with_bitmap`.
    pub fn new(
        segments: &[SegmentData],
        index_name: &str,
        with_bitmap: bool,
    ) -> Result<SegmentTermInfoQueue> {
        let mut sources = Vec::with_capacity(segments.len() * 2);
        for segment in segments {
            let directory = segment.index_directory(index_name)?;
            if !directory.file_exists(INDEX_FORMAT_OPTION_FILE_NAME) {
                debug!(
                    "segment {} has no index {}, skipped",
                    segment.segment_id(),
                    index_name
                );
                continue;
            }
            let format = IndexFormatOption::load(directory.as_ref())?;
            sources.push(TermSource::open(
                segment,
                directory.as_ref(),
                &format,
                TermIndexMode::Normal,
            )?);
            if with_bitmap && directory.file_exists(BITMAP_DICTIONARY_FILE_NAME) {
                sources.push(TermSource::open(
                    segment,
                    directory.as_ref(),
                    &format.bitmap_format_option(),
                    TermIndexMode::Bitmap,
                )?);
            }
        }
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (i, source) in sources.iter().enumerate() {
            if let Some((key, _)) = source.current {
                heap.push(Reverse((key, source.mode, i)));
            }
        }
        let mut queue = SegmentTermInfoQueue {
            sources,
            heap,
            current_key: 0,
            current_mode: TermIndexMode::Normal,
            current: SmallVec::new(),
            term_infos: Vec::new(),
        };
        queue.load_current();
        Ok(queue)
    }

    fn load_current(&mut self) {
        self.current.clear();
        let (key, mode) = match self.heap.peek() {
            Some(Reverse((key, mode, _))) => (*key, *mode),
            None => return,
        };
        self.current_key = key;
        self.current_mode = mode;
        while let Some(&Reverse((k, m, i))) = self.heap.peek() {
            if k != key || m != mode {
                break;
            }
            self.heap.pop();
            if let Some((_, value)) = self.sources[i].current {
                self.current.push((i, value));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn current_key(&self) -> DictKey {
        self.current_key
    }

    pub fn current_mode(&self) -> TermIndexMode {
        self.current_mode
    }

    /// Opens the postings of the current term, one per source holding it.
    pub fn current_term_infos(
        &mut self,
    ) -> Result<(DictKey, TermIndexMode, &mut [SegmentTermInfo])> {
        self.term_infos.clear();
        for &(i, value) in &self.current {
            let source = &self.sources[i];
            let decoder = source.open_decoder(value)?;
            self.term_infos.push(SegmentTermInfo::new(
                source.segment_id,
                source.base_doc_id,
                decoder,
            ));
        }
        Ok((self.current_key, self.current_mode, &mut self.term_infos[..]))
    }

    /// Drops the postings of the current term and moves every source that
    /// held it forward.
    pub fn move_to_next_term(&mut self) -> Result<()> {
        self.term_infos.clear();
        let current = ::std::mem::replace(&mut self.current, SmallVec::new());
        for (i, _) in current {
            let source = &mut self.sources[i];
            source.advance()?;
            if let Some((key, _)) = source.current {
                self.heap.push(Reverse((key, source.mode, i)));
            }
        }
        self.load_current();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::{DictKeyType, PostingFormatOption};
    use crate::core::index::{
        HighFrequencyConfig, HighFrequencyTermPostingType, IndexConfig, SegmentIndexWriter,
    };
    use crate::core::store::directory::{DirectoryRc, RAMDirectory};
    use std::sync::Arc;

    fn build_segment(keys: &[DictKey], doc_count: i32) -> DirectoryRc {
        let dir: DirectoryRc = Arc::new(RAMDirectory::new());
        let format =
            IndexFormatOption::new(PostingFormatOption::default(), DictKeyType::U32, false);
        let mut config = IndexConfig::new("body", format);
        config.high_frequency = Some(HighFrequencyConfig::new(
            vec![5],
            HighFrequencyTermPostingType::Both,
        ));
        let mut writer = SegmentIndexWriter::new(config).unwrap();
        for doc in 0..doc_count {
            for &key in keys {
                writer.add_token(key, 0, 0, 0).unwrap();
            }
            writer.end_document(doc, 0).unwrap();
        }
        writer.dump(dir.as_ref()).unwrap();
        dir
    }

    #[test]
    fn test_term_order() {
        let empty: DirectoryRc = Arc::new(RAMDirectory::new());
        let segments = SegmentData::sequence(vec![
            (build_segment(&[1, 5, 9], 3), 3),
            (empty, 4),
            (build_segment(&[2, 5], 2), 2),
        ]);
        let mut queue = SegmentTermInfoQueue::new(&segments, "body", true).unwrap();
        let mut terms = Vec::new();
        while !queue.is_empty() {
            let (key, mode, infos) = queue.current_term_infos().unwrap();
            let sources: Vec<(u32, DocId, u32)> = infos
                .iter()
                .map(|info| (info.segment_id, info.base_doc_id, info.decoder.doc_freq()))
                .collect();
            terms.push((key, mode, sources));
            queue.move_to_next_term().unwrap();
        }
        assert_eq!(
            terms,
            vec![
                (1, TermIndexMode::Normal, vec![(0, 0, 3)]),
                (2, TermIndexMode::Normal, vec![(2, 7, 2)]),
                (5, TermIndexMode::Normal, vec![(0, 0, 3), (2, 7, 2)]),
                (5, TermIndexMode::Bitmap, vec![(0, 0, 3), (2, 7, 2)]),
                (9, TermIndexMode::Normal, vec![(0, 0, 3)]),
            ]
        );

        let mut queue = SegmentTermInfoQueue::new(&segments, "body", false).unwrap();
        let mut count = 0;
        while !queue.is_empty() {
            assert_eq!(queue.current_mode(), TermIndexMode::Normal);
            count += 1;
            queue.move_to_next_term().unwrap();
        }
        assert_eq!(count, 4);
    }
}
