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

use crate::core::codec::dictionary::{open_dictionary_reader, DictionaryReader};
use crate::core::codec::postings::{PostingDecoder, PostingIterator, TermMatch};
use crate::core::codec::{
    IndexFormatOption, BITMAP_DICTIONARY_FILE_NAME, BITMAP_POSTING_FILE_NAME,
    DICTIONARY_FILE_NAME, POSTING_FILE_NAME,
};
use crate::core::store::directory::Directory;
use crate::core::store::io::ReadOnlySource;
use crate::core::util::{DictKey, DictValue};
use crate::error::Result;

struct IndexData {
    format: IndexFormatOption,
    dictionary: Box<dyn DictionaryReader>,
    posting: ReadOnlySource,
}

impl IndexData {
    fn open(
        directory: &dyn Directory,
        format: IndexFormatOption,
        dictionary_file: &str,
        posting_file: &str,
    ) -> Result<IndexData> {
        let dictionary = open_dictionary_reader(&format, directory.open_source(dictionary_file)?)?;
        let posting = directory.open_source(posting_file)?;
        Ok(IndexData {
            format,
            dictionary,
            posting,
        })
    }

    fn keys(&self) -> Result<Vec<DictKey>> {
        let mut iter = self.dictionary.create_iterator()?;
        let mut keys = Vec::with_capacity(self.dictionary.item_count());
        while let Some((key, _)) = iter.next()? {
            keys.push(key);
        }
        Ok(keys)
    }
}

/// Read side of one index of a segment: `index_format_option`, the normal
/// dictionary and posting, and the bitmap pair. Either pair may be absent.
pub struct SegmentIndexReader {
    format: IndexFormatOption,
    normal: Option<IndexData>,
    bitmap: Option<IndexData>,
}

impl SegmentIndexReader {
    pub fn open(directory: &dyn Directory) -> Result<SegmentIndexReader> {
        let format = IndexFormatOption::load(directory)?;
        let normal = if directory.file_exists(DICTIONARY_FILE_NAME) {
            Some(IndexData::open(
                directory,
                format,
                DICTIONARY_FILE_NAME,
                POSTING_FILE_NAME,
            )?)
        } else {
            None
        };
        let bitmap = if directory.file_exists(BITMAP_DICTIONARY_FILE_NAME) {
            Some(IndexData::open(
                directory,
                format.bitmap_format_option(),
                BITMAP_DICTIONARY_FILE_NAME,
                BITMAP_POSTING_FILE_NAME,
            )?)
        } else {
            None
        };
        Ok(SegmentIndexReader {
            format,
            normal,
            bitmap,
        })
    }

    pub fn format(&self) -> &IndexFormatOption {
        &self.format
    }

    pub fn term_count(&self) -> usize {
        self.normal
            .as_ref()
            .map_or(0, |n| n.dictionary.item_count())
    }

    pub fn bitmap_term_count(&self) -> usize {
        self.bitmap
            .as_ref()
            .map_or(0, |b| b.dictionary.item_count())
    }

    pub fn lookup_value(&self, key: DictKey) -> Result<Option<DictValue>> {
        match self.normal {
            Some(ref normal) => normal.dictionary.lookup(key),
            None => Ok(None),
        }
    }

    pub fn lookup(&self, key: DictKey) -> Result<Option<PostingDecoder>> {
        let normal = match self.normal {
            Some(ref n) => n,
            None => return Ok(None),
        };
        match normal.dictionary.lookup(key)? {
            Some(value) => Ok(Some(PostingDecoder::open(
                &normal.format.posting_format_option,
                value,
                &normal.posting,
            )?)),
            None => Ok(None),
        }
    }

    pub fn lookup_bitmap(&self, key: DictKey) -> Result<Option<PostingDecoder>> {
        let bitmap = match self.bitmap {
            Some(ref b) => b,
            None => return Ok(None),
        };
        match bitmap.dictionary.lookup(key)? {
            Some(value) => Ok(Some(PostingDecoder::open_bitmap(
                &bitmap.format.posting_format_option,
                value,
                &bitmap.posting,
            )?)),
            None => Ok(None),
        }
    }

    pub fn keys(&self) -> Result<Vec<DictKey>> {
        match self.normal {
            Some(ref n) => n.keys(),
            None => Ok(Vec::new()),
        }
    }

    pub fn bitmap_keys(&self) -> Result<Vec<DictKey>> {
        match self.bitmap {
            Some(ref b) => b.keys(),
            None => Ok(Vec::new()),
        }
    }

    /// Fully decoded normal posting of `key`.
    pub fn read_posting(&self, key: DictKey) -> Result<Option<Vec<TermMatch>>> {
        Self::collect(self.lookup(key)?)
    }

    pub fn read_bitmap_posting(&self, key: DictKey) -> Result<Option<Vec<TermMatch>>> {
        Self::collect(self.lookup_bitmap(key)?)
    }

    fn collect(decoder: Option<PostingDecoder>) -> Result<Option<Vec<TermMatch>>> {
        match decoder {
            Some(decoder) => {
                let matches = PostingIterator::new(vec![(0, decoder)]).collect_all()?;
                Ok(Some(matches))
            }
            None => Ok(None),
        }
    }
}
