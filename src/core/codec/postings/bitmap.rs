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

use crate::core::store::io::{DataOutput, ReadOnlySource};
use crate::core::util::varint::{decode_uvarint, varint_length};
use crate::core::util::{DocId, INVALID_DOCID};
use crate::error::ErrorKind::{IndexCollapsed, InconsistentState};
use crate::error::{Result, ResultExt};

use byteorder::{ByteOrder, LittleEndian};

/// Collects the documents of a high frequency term as a bitmap, bit `i`
/// set when local doc `i` contains the term.
pub struct BitmapPostingWriter {
    words: Vec<u32>,
    df: u32,
    last_doc_id: DocId,
    term_payload: u16,
}

impl Default for BitmapPostingWriter {
    fn default() -> Self {
        BitmapPostingWriter {
            words: Vec::new(),
            df: 0,
            last_doc_id: INVALID_DOCID,
            term_payload: 0,
        }
    }
}

impl BitmapPostingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn end_document(&mut self, doc_id: DocId) -> Result<()> {
        if doc_id < 0 || (self.last_doc_id != INVALID_DOCID && doc_id <= self.last_doc_id) {
            bail!(InconsistentState(format!(
                "bitmap doc {} added after doc {}",
                doc_id, self.last_doc_id
            )));
        }
        let word = doc_id as usize / 32;
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u32 << (doc_id as u32 % 32);
        self.last_doc_id = doc_id;
        self.df += 1;
        Ok(())
    }

    pub fn df(&self) -> u32 {
        self.df
    }

    pub fn term_payload(&self) -> u16 {
        self.term_payload
    }

    pub fn set_term_payload(&mut self, term_payload: u16) {
        self.term_payload = term_payload;
    }

    pub fn dump_length(&self) -> usize {
        varint_length(self.words.len() as u32) + self.words.len() * 4
    }

    pub fn dump<O: DataOutput + ?Sized>(&self, output: &mut O) -> Result<()> {
        output.write_vint(self.words.len() as u32)?;
        for &word in &self.words {
            output.write_int(word)?;
        }
        Ok(())
    }
}

/// Walks the set bits of a dumped bitmap posting.
pub struct BitmapPostingDecoder {
    data: ReadOnlySource,
    word_count: usize,
    next_doc: usize,
}

impl BitmapPostingDecoder {
    /// `data` starts at the word count, right after the term meta.
    pub fn open(data: ReadOnlySource) -> Result<Self> {
        let mut input = data.as_slice();
        let word_count = decode_uvarint(&mut input)
            .chain_err(|| IndexCollapsed("bitmap word count".into()))? as usize;
        if input.len() < word_count * 4 {
            bail!(IndexCollapsed(format!(
                "bitmap of {} words truncated to {} bytes",
                word_count,
                input.len()
            )));
        }
        let start = data.len() - input.len();
        Ok(BitmapPostingDecoder {
            data: data.slice(start, start + word_count * 4)?,
            word_count,
            next_doc: 0,
        })
    }

    /// Fills `doc_buf` with the next set bits, returns how many were found.
    pub fn decode(&mut self, doc_buf: &mut [DocId]) -> usize {
        let words = self.data.as_slice();
        let limit = self.word_count * 32;
        let mut count = 0;
        while count < doc_buf.len() && self.next_doc < limit {
            let word_idx = self.next_doc / 32;
            let word = LittleEndian::read_u32(&words[word_idx * 4..]) >> (self.next_doc % 32);
            if word == 0 {
                self.next_doc = (word_idx + 1) * 32;
                continue;
            }
            self.next_doc += word.trailing_zeros() as usize;
            doc_buf[count] = self.next_doc as DocId;
            count += 1;
            self.next_doc += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_round_trip() {
        let mut writer = BitmapPostingWriter::new();
        let docs: Vec<DocId> = vec![0, 1, 31, 32, 64, 100, 1000];
        for &d in &docs {
            writer.end_document(d).unwrap();
        }
        assert!(writer.end_document(1000).is_err());
        assert_eq!(writer.df(), 7);

        let mut buf: Vec<u8> = Vec::new();
        writer.dump(&mut buf).unwrap();
        assert_eq!(buf.len(), writer.dump_length());

        let mut decoder = BitmapPostingDecoder::open(ReadOnlySource::from_vec(buf)).unwrap();
        let mut doc_buf = [0; 4];
        let mut decoded = Vec::new();
        loop {
            let n = decoder.decode(&mut doc_buf);
            if n == 0 {
                break;
            }
            decoded.extend_from_slice(&doc_buf[..n]);
        }
        assert_eq!(decoded, docs);
    }

    #[test]
    fn test_truncated_bitmap() {
        let mut writer = BitmapPostingWriter::new();
        writer.end_document(200).unwrap();
        let mut buf: Vec<u8> = Vec::new();
        writer.dump(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(BitmapPostingDecoder::open(ReadOnlySource::from_vec(buf)).is_err());
    }
}
