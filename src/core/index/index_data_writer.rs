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

use crate::core::codec::dictionary::{create_dictionary_writer, DictionaryWriter};
use crate::core::codec::postings::{write_posting_block, PostingWriter};
use crate::core::codec::{
    make_dict_value, IndexFormatOption, PostingFormatOption, BITMAP_DICTIONARY_FILE_NAME,
    BITMAP_POSTING_FILE_NAME, DICTIONARY_FILE_NAME, POSTING_FILE_NAME,
};
use crate::core::store::directory::Directory;
use crate::core::store::io::IndexOutput;
use crate::core::util::DictKey;
use crate::error::Result;

/// Dictionary plus posting file of one posting stream of an index.
pub struct IndexDataWriter {
    option: PostingFormatOption,
    dictionary: Box<dyn DictionaryWriter>,
    posting: Box<dyn IndexOutput>,
    closed: bool,
}

impl IndexDataWriter {
    pub fn create(
        directory: &dyn Directory,
        format: &IndexFormatOption,
        dictionary_file: &str,
        posting_file: &str,
        item_count: Option<usize>,
    ) -> Result<IndexDataWriter> {
        let dictionary_output = directory.create_output(dictionary_file)?;
        let posting = directory.create_output(posting_file)?;
        Ok(IndexDataWriter {
            option: format.posting_format_option,
            dictionary: create_dictionary_writer(format, dictionary_output, item_count),
            posting,
            closed: false,
        })
    }

    /// The normal stream of the index described by `format`.
    pub fn create_normal(
        directory: &dyn Directory,
        format: &IndexFormatOption,
        item_count: Option<usize>,
    ) -> Result<IndexDataWriter> {
        Self::create(
            directory,
            format,
            DICTIONARY_FILE_NAME,
            POSTING_FILE_NAME,
            item_count,
        )
    }

    /// The bitmap stream of the index described by `format`.
    pub fn create_bitmap(
        directory: &dyn Directory,
        format: &IndexFormatOption,
        item_count: Option<usize>,
    ) -> Result<IndexDataWriter> {
        Self::create(
            directory,
            &format.bitmap_format_option(),
            BITMAP_DICTIONARY_FILE_NAME,
            BITMAP_POSTING_FILE_NAME,
            item_count,
        )
    }

    pub fn option(&self) -> &PostingFormatOption {
        &self.option
    }

    /// Adds the posting of `key`: dict-inline values go to the dictionary
    /// only, anything else gets a block in the posting file.
    pub fn add_term<W: PostingWriter>(&mut self, key: DictKey, writer: &W) -> Result<()> {
        if let Some(value) = writer.dict_inline_posting_value()? {
            return self.dictionary.add_item(key, value);
        }
        let offset = self.posting.file_pointer();
        write_posting_block(&self.option, writer, self.posting.as_mut())?;
        self.dictionary
            .add_item(key, make_dict_value(writer.compress_mode(), offset))
    }

    pub fn term_count(&self) -> usize {
        self.dictionary.item_count()
    }

    pub fn posting_length(&self) -> u64 {
        self.posting.file_pointer()
    }

    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.dictionary.close()?;
        self.posting.close()?;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::dictionary::open_dictionary_reader;
    use crate::core::codec::postings::{PostingDecoder, PostingWriterImpl};
    use crate::core::codec::{is_dict_inline, DictKeyType};
    use crate::core::store::directory::RAMDirectory;
    use crate::core::util::BufferPool;

    #[test]
    fn test_add_terms() {
        let format =
            IndexFormatOption::new(PostingFormatOption::default(), DictKeyType::U32, false);
        let dir = RAMDirectory::new();
        let mut pool = BufferPool::new("test");
        let mut data = IndexDataWriter::create_normal(&dir, &format, None).unwrap();

        let mut single = PostingWriterImpl::new(format.posting_format_option, &mut pool);
        single.end_document(4, 0).unwrap();
        single.end_segment().unwrap();
        data.add_term(1, &single).unwrap();

        let mut double = PostingWriterImpl::new(format.posting_format_option, &mut pool);
        double.end_document(4, 0).unwrap();
        double.end_document(8, 0).unwrap();
        double.end_segment().unwrap();
        data.add_term(2, &double).unwrap();
        assert!(data.add_term(2, &double).is_err());
        assert_eq!(data.term_count(), 2);
        data.close().unwrap();

        let dictionary =
            open_dictionary_reader(&format, dir.open_source(DICTIONARY_FILE_NAME).unwrap())
                .unwrap();
        let posting = dir.open_source(POSTING_FILE_NAME).unwrap();
        assert!(is_dict_inline(dictionary.lookup(1).unwrap().unwrap()));
        let value = dictionary.lookup(2).unwrap().unwrap();
        assert!(!is_dict_inline(value));
        let decoder = PostingDecoder::open(&format.posting_format_option, value, &posting).unwrap();
        assert_eq!(decoder.doc_freq(), 2);
    }
}
