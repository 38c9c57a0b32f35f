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

use crate::core::codec::{
    PostingFormatOption, PFOR_DELTA_COMPRESS_MODE, SHORT_LIST_COMPRESS_MODE,
};
use crate::core::store::io::{DataInput, DataOutput, ReadOnlySource};
use crate::core::util::varint::{append_uvarint, decode_uvarint, varint_length};
use crate::core::util::{DocId, INVALID_DOCID};
use crate::error::ErrorKind::{IndexCollapsed, InconsistentState};
use crate::error::{Result, ResultExt};

pub const MAX_DOC_PER_RECORD: usize = 128;
/// Doc lists up to this many documents are written without a record count.
pub const MAX_SHORT_LIST_DOC_COUNT: u32 = 8;

/// Buffers one record of documents at a time and appends finished records
/// to an in-memory byte buffer.
///
/// A record is four independently counted sub lists: doc id deltas, term
/// frequencies, doc payloads and field maps, the last three only present when
/// the format carries them.
pub struct DocListEncoder {
    option: PostingFormatOption,
    doc_deltas: Vec<u32>,
    tfs: Vec<u32>,
    doc_payloads: Vec<u16>,
    field_maps: Vec<u8>,
    current_tf: u32,
    current_field_map: u8,
    last_doc_id: DocId,
    df: u32,
    total_tf: u64,
    record_count: u32,
    data: Vec<u8>,
}

impl DocListEncoder {
    pub fn new(option: PostingFormatOption, mut data: Vec<u8>) -> Self {
        data.clear();
        DocListEncoder {
            option,
            doc_deltas: Vec::with_capacity(MAX_DOC_PER_RECORD),
            tfs: Vec::new(),
            doc_payloads: Vec::new(),
            field_maps: Vec::new(),
            current_tf: 0,
            current_field_map: 0,
            last_doc_id: INVALID_DOCID,
            df: 0,
            total_tf: 0,
            record_count: 0,
            data,
        }
    }

    /// Accounts one occurrence of the term in the current document.
    pub fn add_position(&mut self, field_index: u8) {
        self.current_tf += 1;
        if self.option.has_field_map {
            self.current_field_map |= 1u8 << field_index;
        }
    }

    /// Replaces the field map collected for the current document.
    pub fn set_field_map(&mut self, field_map: u8) {
        if self.option.has_field_map {
            self.current_field_map = field_map;
        }
    }

    pub fn end_document(&mut self, doc_id: DocId, doc_payload: u16) -> Result<()> {
        let tf = self.current_tf;
        let field_map = self.current_field_map;
        self.current_tf = 0;
        self.current_field_map = 0;
        self.add_document(doc_id, tf, doc_payload, field_map)
    }

    /// Appends a complete document, doc ids must be strictly increasing.
    pub fn add_document(
        &mut self,
        doc_id: DocId,
        tf: u32,
        doc_payload: u16,
        field_map: u8,
    ) -> Result<()> {
        if doc_id < 0 || (self.last_doc_id != INVALID_DOCID && doc_id <= self.last_doc_id) {
            bail!(InconsistentState(format!(
                "doc {} added after doc {}",
                doc_id, self.last_doc_id
            )));
        }
        let delta = if self.last_doc_id == INVALID_DOCID {
            doc_id as u32
        } else {
            (doc_id - self.last_doc_id) as u32
        };
        let tf = tf.max(1);
        self.doc_deltas.push(delta);
        if self.option.has_term_frequency {
            self.tfs.push(tf);
        }
        if self.option.has_doc_payload {
            self.doc_payloads.push(doc_payload);
        }
        if self.option.has_field_map {
            self.field_maps.push(field_map);
        }
        self.last_doc_id = doc_id;
        self.df += 1;
        self.total_tf += u64::from(tf);
        if self.doc_deltas.len() == MAX_DOC_PER_RECORD {
            self.flush_record();
        }
        Ok(())
    }

    fn flush_record(&mut self) {
        let n = self.doc_deltas.len() as u32;
        append_uvarint(&mut self.data, n);
        for &delta in &self.doc_deltas {
            append_uvarint(&mut self.data, delta);
        }
        if self.option.has_term_frequency {
            append_uvarint(&mut self.data, self.tfs.len() as u32);
            for &tf in &self.tfs {
                append_uvarint(&mut self.data, tf);
            }
        }
        if self.option.has_doc_payload {
            append_uvarint(&mut self.data, self.doc_payloads.len() as u32);
            for &payload in &self.doc_payloads {
                self.data.extend_from_slice(&payload.to_le_bytes());
            }
        }
        if self.option.has_field_map {
            append_uvarint(&mut self.data, self.field_maps.len() as u32);
            self.data.extend_from_slice(&self.field_maps);
        }
        self.doc_deltas.clear();
        self.tfs.clear();
        self.doc_payloads.clear();
        self.field_maps.clear();
        self.record_count += 1;
    }

    /// Writes out the partially filled record.
    pub fn flush(&mut self) {
        if !self.doc_deltas.is_empty() {
            self.flush_record();
        }
    }

    pub fn df(&self) -> u32 {
        self.df
    }

    pub fn total_tf(&self) -> u64 {
        self.total_tf
    }

    pub fn compress_mode(&self) -> u8 {
        if self.df <= MAX_SHORT_LIST_DOC_COUNT {
            SHORT_LIST_COMPRESS_MODE
        } else {
            PFOR_DELTA_COMPRESS_MODE
        }
    }

    fn body_length(&self) -> usize {
        if self.compress_mode() == SHORT_LIST_COMPRESS_MODE {
            self.data.len()
        } else {
            varint_length(self.record_count) + self.data.len()
        }
    }

    pub fn dump_length(&self) -> usize {
        let body = self.body_length();
        varint_length(body as u32) + body
    }

    pub fn dump<O: DataOutput + ?Sized>(&self, output: &mut O) -> Result<()> {
        if !self.doc_deltas.is_empty() {
            bail!(InconsistentState(format!(
                "doc list dumped with {} unflushed docs",
                self.doc_deltas.len()
            )));
        }
        output.write_vint(self.body_length() as u32)?;
        if self.compress_mode() == PFOR_DELTA_COMPRESS_MODE {
            output.write_vint(self.record_count)?;
        }
        output.write_bytes(&self.data, 0, self.data.len())
    }

    /// Gives the encoded byte buffer back for recycling.
    pub fn into_buffer(self) -> Vec<u8> {
        self.data
    }
}

/// Decodes the records written by `DocListEncoder`.
pub struct DocListDecoder {
    option: PostingFormatOption,
    data: ReadOnlySource,
    cursor: usize,
    remaining_records: u32,
    last_doc_id: DocId,
}

impl DocListDecoder {
    /// `data` is the doc list body without its length prefix.
    pub fn open(option: PostingFormatOption, doc_mode: u8, data: ReadOnlySource) -> Result<Self> {
        let (remaining_records, cursor) = match doc_mode {
            SHORT_LIST_COMPRESS_MODE => (if data.is_empty() { 0 } else { 1 }, 0),
            PFOR_DELTA_COMPRESS_MODE => {
                let mut input = data.as_slice();
                let count = decode_uvarint(&mut input)
                    .chain_err(|| IndexCollapsed("doc list record count".into()))?;
                (count, data.len() - input.len())
            }
            _ => bail!(IndexCollapsed(format!("unknown doc list mode {}", doc_mode))),
        };
        Ok(DocListDecoder {
            option,
            data,
            cursor,
            remaining_records,
            last_doc_id: INVALID_DOCID,
        })
    }

    /// Decodes the next record into the buffers, returns the number of docs
    /// decoded, 0 once the list is exhausted.
    pub fn decode_record(
        &mut self,
        doc_buf: &mut [DocId],
        tf_buf: &mut [u32],
        doc_payload_buf: &mut [u16],
        field_map_buf: &mut [u8],
    ) -> Result<usize> {
        if self.remaining_records == 0 {
            return Ok(0);
        }
        let data = self.data.clone();
        let mut input = &data.as_slice()[self.cursor..];
        let count = self
            .decode_record_inner(&mut input, doc_buf, tf_buf, doc_payload_buf, field_map_buf)
            .chain_err(|| IndexCollapsed("corrupted doc list record".into()))?;
        self.cursor = data.len() - input.len();
        self.remaining_records -= 1;
        Ok(count)
    }

    fn decode_record_inner(
        &mut self,
        input: &mut &[u8],
        doc_buf: &mut [DocId],
        tf_buf: &mut [u32],
        doc_payload_buf: &mut [u16],
        field_map_buf: &mut [u8],
    ) -> Result<usize> {
        let n = decode_uvarint(input)? as usize;
        if n == 0 || n > MAX_DOC_PER_RECORD || n > doc_buf.len() {
            bail!(IndexCollapsed(format!("doc list record of {} docs", n)));
        }
        for doc in doc_buf.iter_mut().take(n) {
            let delta = decode_uvarint(input)? as DocId;
            self.last_doc_id = if self.last_doc_id == INVALID_DOCID {
                delta
            } else {
                self.last_doc_id + delta
            };
            *doc = self.last_doc_id;
        }
        if self.option.has_term_frequency {
            check_list_len(decode_uvarint(input)? as usize, n, "tf")?;
            for tf in tf_buf.iter_mut().take(n) {
                *tf = decode_uvarint(input)?;
            }
        } else {
            tf_buf[..n].iter_mut().for_each(|tf| *tf = 1);
        }
        if self.option.has_doc_payload {
            check_list_len(decode_uvarint(input)? as usize, n, "doc payload")?;
            for payload in doc_payload_buf.iter_mut().take(n) {
                *payload = input.read_short()?;
            }
        } else {
            doc_payload_buf[..n].iter_mut().for_each(|p| *p = 0);
        }
        if self.option.has_field_map {
            check_list_len(decode_uvarint(input)? as usize, n, "field map")?;
            for field_map in field_map_buf.iter_mut().take(n) {
                *field_map = input.read_byte()?;
            }
        } else {
            field_map_buf[..n].iter_mut().for_each(|f| *f = 0);
        }
        Ok(n)
    }
}

pub(crate) fn check_list_len(len: usize, expected: usize, what: &str) -> Result<()> {
    if len != expected {
        bail!(IndexCollapsed(format!(
            "{} list holds {} items, doc list holds {}",
            what, len, expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_option() -> PostingFormatOption {
        PostingFormatOption {
            has_doc_payload: true,
            has_field_map: true,
            ..Default::default()
        }
    }

    fn decode_all(
        option: PostingFormatOption,
        encoder: &DocListEncoder,
    ) -> Vec<(DocId, u32, u16, u8)> {
        let mut buf: Vec<u8> = Vec::new();
        encoder.dump(&mut buf).unwrap();
        assert_eq!(buf.len(), encoder.dump_length());

        let mut input = &buf[..];
        let body_len = decode_uvarint(&mut input).unwrap() as usize;
        assert_eq!(body_len, input.len());
        let source = ReadOnlySource::from_vec(input.to_vec());
        let mut decoder = DocListDecoder::open(option, encoder.compress_mode(), source).unwrap();

        let mut docs = vec![0; MAX_DOC_PER_RECORD];
        let mut tfs = vec![0; MAX_DOC_PER_RECORD];
        let mut payloads = vec![0; MAX_DOC_PER_RECORD];
        let mut field_maps = vec![0; MAX_DOC_PER_RECORD];
        let mut result = Vec::new();
        loop {
            let n = decoder
                .decode_record(&mut docs, &mut tfs, &mut payloads, &mut field_maps)
                .unwrap();
            if n == 0 {
                break;
            }
            for i in 0..n {
                result.push((docs[i], tfs[i], payloads[i], field_maps[i]));
            }
        }
        result
    }

    #[test]
    fn test_short_list() {
        let option = full_option();
        let mut encoder = DocListEncoder::new(option, Vec::new());
        encoder.add_position(0);
        encoder.add_position(3);
        encoder.end_document(0, 7).unwrap();
        encoder.add_position(1);
        encoder.end_document(5, 9).unwrap();
        encoder.flush();

        assert_eq!(encoder.df(), 2);
        assert_eq!(encoder.total_tf(), 3);
        assert_eq!(encoder.compress_mode(), SHORT_LIST_COMPRESS_MODE);
        assert_eq!(
            decode_all(option, &encoder),
            vec![(0, 2, 7, 0b1001), (5, 1, 9, 0b10)]
        );
    }

    #[test]
    fn test_multiple_records() {
        let option = full_option();
        let mut encoder = DocListEncoder::new(option, Vec::new());
        let mut expected = Vec::new();
        for i in 0..300 {
            let doc_id = i * 3 + 1;
            let tf = (i % 4 + 1) as u32;
            encoder.add_document(doc_id, tf, i as u16, 1).unwrap();
            expected.push((doc_id, tf, i as u16, 1u8));
        }
        encoder.flush();
        assert_eq!(encoder.compress_mode(), PFOR_DELTA_COMPRESS_MODE);
        assert_eq!(decode_all(option, &encoder), expected);
    }

    #[test]
    fn test_doc_only_defaults() {
        let option = PostingFormatOption::doc_only();
        let mut encoder = DocListEncoder::new(option, Vec::new());
        for doc_id in &[2, 4, 8] {
            encoder.end_document(*doc_id, 0).unwrap();
        }
        encoder.flush();
        assert_eq!(
            decode_all(option, &encoder),
            vec![(2, 1, 0, 0), (4, 1, 0, 0), (8, 1, 0, 0)]
        );
    }

    #[test]
    fn test_out_of_order_doc() {
        let mut encoder = DocListEncoder::new(PostingFormatOption::default(), Vec::new());
        encoder.end_document(4, 0).unwrap();
        assert!(encoder.end_document(4, 0).is_err());
        assert!(encoder.end_document(2, 0).is_err());

        encoder.end_document(6, 0).unwrap();
        let mut buf: Vec<u8> = Vec::new();
        // not flushed yet
        assert!(encoder.dump(&mut buf).is_err());
    }

    #[test]
    fn test_mismatched_list_lengths() {
        let option = PostingFormatOption::default();
        // one record: 2 docs, but only 1 tf
        let mut body = Vec::new();
        append_uvarint(&mut body, 2);
        append_uvarint(&mut body, 1);
        append_uvarint(&mut body, 1);
        append_uvarint(&mut body, 1);
        append_uvarint(&mut body, 3);
        let mut decoder =
            DocListDecoder::open(option, SHORT_LIST_COMPRESS_MODE, ReadOnlySource::from_vec(body))
                .unwrap();
        let mut docs = [0; MAX_DOC_PER_RECORD];
        let mut tfs = [0; MAX_DOC_PER_RECORD];
        let mut payloads = [0; MAX_DOC_PER_RECORD];
        let mut field_maps = [0; MAX_DOC_PER_RECORD];
        let result = decoder.decode_record(&mut docs, &mut tfs, &mut payloads, &mut field_maps);
        assert!(result.is_err());
    }
}
