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

//! Packs a handful of small integers into the low 7 bytes of a dictionary
//! value, so that single document terms need no posting block.

use crate::core::codec::PostingFormatOption;
use crate::core::util::varint::{decode_uvarint, encode_uvarint};
use crate::error::ErrorKind::BufferOverflow;
use crate::error::Result;

/// The top byte of a dictionary value holds the compress mode nibble.
pub const MAX_DICT_INLINE_BYTES: usize = 7;

/// Number of fields a dict-inline value carries for `option`.
pub fn calculate_item_count(option: &PostingFormatOption) -> usize {
    let mut count = 1; // doc id
    if option.has_term_payload {
        count += 1;
    }
    if option.has_doc_payload {
        count += 1;
    }
    if option.has_term_frequency {
        count += 1;
    }
    if option.has_field_map {
        count += 1;
    }
    count
}

/// Varint encodes `values` into an 8 byte little-endian buffer, `None` when
/// the encoding needs more than `MAX_DICT_INLINE_BYTES`.
pub fn encode(values: &[u32]) -> Option<u64> {
    let mut buf = [0u8; 8];
    let mut cursor = 0;
    for &v in values {
        match encode_uvarint(&mut buf[cursor..MAX_DICT_INLINE_BYTES], v) {
            Ok(len) => cursor += len,
            Err(_) => return None,
        }
    }
    Some(u64::from_le_bytes(buf))
}

/// Decodes `count` values packed by `encode`.
pub fn decode(packed: u64, count: usize) -> Result<Vec<u32>> {
    let buf = packed.to_le_bytes();
    let mut cursor = &buf[..MAX_DICT_INLINE_BYTES];
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        if cursor.is_empty() {
            bail!(BufferOverflow(format!(
                "dict inline value holds less than {} items",
                count
            )));
        }
        values.push(decode_uvarint(&mut cursor)?);
    }
    Ok(values)
}

/// Field by field view of a dict-inline value, fields absent from the
/// format read as their defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DictInlineFormatter {
    option: PostingFormatOption,
    term_payload: u32,
    doc_id: u32,
    doc_payload: u32,
    term_freq: u32,
    field_map: u32,
}

impl DictInlineFormatter {
    pub fn new(option: PostingFormatOption) -> Self {
        DictInlineFormatter {
            option,
            term_payload: 0,
            doc_id: 0,
            doc_payload: 0,
            term_freq: 1,
            field_map: 0,
        }
    }

    pub fn from_packed(option: PostingFormatOption, packed: u64) -> Result<Self> {
        let values = decode(packed, calculate_item_count(&option))?;
        let mut formatter = Self::new(option);
        let mut iter = values.into_iter();
        if option.has_term_payload {
            formatter.term_payload = iter.next().unwrap_or(0);
        }
        formatter.doc_id = iter.next().unwrap_or(0);
        if option.has_doc_payload {
            formatter.doc_payload = iter.next().unwrap_or(0);
        }
        if option.has_term_frequency {
            formatter.term_freq = iter.next().unwrap_or(1);
        }
        if option.has_field_map {
            formatter.field_map = iter.next().unwrap_or(0);
        }
        Ok(formatter)
    }

    /// Values in packing order: term payload, doc id, doc payload, term
    /// frequency, field map.
    pub fn to_values(&self) -> Vec<u32> {
        let mut values = Vec::with_capacity(calculate_item_count(&self.option));
        if self.option.has_term_payload {
            values.push(self.term_payload);
        }
        values.push(self.doc_id);
        if self.option.has_doc_payload {
            values.push(self.doc_payload);
        }
        if self.option.has_term_frequency {
            values.push(self.term_freq);
        }
        if self.option.has_field_map {
            values.push(self.field_map);
        }
        values
    }

    pub fn encode(&self) -> Option<u64> {
        encode(&self.to_values())
    }

    pub fn term_payload(&self) -> u32 {
        self.term_payload
    }

    pub fn set_term_payload(&mut self, term_payload: u32) {
        self.term_payload = term_payload;
    }

    pub fn doc_id(&self) -> u32 {
        self.doc_id
    }

    pub fn set_doc_id(&mut self, doc_id: u32) {
        self.doc_id = doc_id;
    }

    pub fn doc_payload(&self) -> u32 {
        self.doc_payload
    }

    pub fn set_doc_payload(&mut self, doc_payload: u32) {
        self.doc_payload = doc_payload;
    }

    pub fn term_freq(&self) -> u32 {
        self.term_freq
    }

    pub fn set_term_freq(&mut self, term_freq: u32) {
        self.term_freq = term_freq;
    }

    pub fn field_map(&self) -> u32 {
        self.field_map
    }

    pub fn set_field_map(&mut self, field_map: u32) {
        self.field_map = field_map;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_count() {
        let mut option = PostingFormatOption::doc_only();
        assert_eq!(calculate_item_count(&option), 1);
        option.has_term_payload = true;
        option.has_doc_payload = true;
        option.has_term_frequency = true;
        option.has_field_map = true;
        assert_eq!(calculate_item_count(&option), 5);
    }

    #[test]
    fn test_encode_decode() {
        let values = [3u32, 100_000, 2];
        let packed = encode(&values).unwrap();
        assert_eq!(packed >> 56, 0);
        assert_eq!(decode(packed, 3).unwrap(), values.to_vec());

        // 3 + 3 + 1 bytes, exactly the budget
        let packed = encode(&[100_000, 100_000, 1]).unwrap();
        assert_eq!(decode(packed, 3).unwrap(), vec![100_000, 100_000, 1]);
    }

    #[test]
    fn test_encode_overflow_falls_back() {
        assert!(encode(&[u32::max_value(), u32::max_value()]).is_none());
        assert!(encode(&[1, 1, 1, 1, 1, 1, 1, 1]).is_none());
        assert!(encode(&[1, 1, 1, 1, 1, 1, 1]).is_some());
    }

    #[test]
    fn test_decode_too_many_items() {
        let packed = encode(&[1, 2]).unwrap();
        // zero bytes decode as zeros until the 7 byte budget ends
        assert_eq!(decode(packed, 7).unwrap(), vec![1, 2, 0, 0, 0, 0, 0]);
        assert!(decode(packed, 8).is_err());
    }

    #[test]
    fn test_formatter() {
        let option = PostingFormatOption {
            has_term_payload: true,
            has_doc_payload: true,
            has_field_map: true,
            ..Default::default()
        };
        let mut formatter = DictInlineFormatter::new(option);
        formatter.set_term_payload(9);
        formatter.set_doc_id(1024);
        formatter.set_doc_payload(3);
        formatter.set_term_freq(2);
        formatter.set_field_map(0x81);
        let packed = formatter.encode().unwrap();

        let decoded = DictInlineFormatter::from_packed(option, packed).unwrap();
        assert_eq!(decoded, formatter);
        assert_eq!(decoded.to_values(), vec![9, 1024, 3, 2, 0x81]);

        let doc_only = PostingFormatOption::doc_only();
        let mut formatter = DictInlineFormatter::new(doc_only);
        formatter.set_doc_id(7);
        let decoded =
            DictInlineFormatter::from_packed(doc_only, formatter.encode().unwrap()).unwrap();
        assert_eq!(decoded.doc_id(), 7);
        assert_eq!(decoded.term_freq(), 1);
        assert_eq!(decoded.field_map(), 0);
    }
}
