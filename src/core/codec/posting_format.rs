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

use crate::core::store::directory::Directory;
use crate::core::util::DictValue;
use crate::error::ErrorKind::IllegalArgument;
use crate::error::Result;

use std::io::Write;

pub const PFOR_DELTA_COMPRESS_MODE: u8 = 0;
pub const SHORT_LIST_COMPRESS_MODE: u8 = 1;
pub const DICT_INLINE_COMPRESS_MODE: u8 = 0x0F;

/// Bit offset of the compress mode nibble inside a dictionary value.
pub const COMPRESS_MODE_SHIFT: u32 = 60;
pub const DICT_VALUE_OFFSET_MASK: u64 = (1u64 << COMPRESS_MODE_SHIFT) - 1;

pub const INDEX_FORMAT_OPTION_FILE_NAME: &str = "index_format_option";
pub const DICTIONARY_FILE_NAME: &str = "dictionary";
pub const POSTING_FILE_NAME: &str = "posting";
pub const BITMAP_DICTIONARY_FILE_NAME: &str = "bitmap_dictionary";
pub const BITMAP_POSTING_FILE_NAME: &str = "bitmap_posting";

/// Combines the doc list and position list modes into one nibble.
#[inline]
pub fn compose_compress_mode(doc_mode: u8, pos_mode: u8) -> u8 {
    debug_assert!(doc_mode <= 3 && pos_mode <= 3);
    (doc_mode << 2) | pos_mode
}

#[inline]
pub fn doc_compress_mode(compress_mode: u8) -> u8 {
    (compress_mode >> 2) & 0x03
}

#[inline]
pub fn pos_compress_mode(compress_mode: u8) -> u8 {
    compress_mode & 0x03
}

/// Builds a dictionary value from a compress mode and a posting file offset
/// (or a packed inline payload).
#[inline]
pub fn make_dict_value(compress_mode: u8, offset: u64) -> DictValue {
    debug_assert!(offset <= DICT_VALUE_OFFSET_MASK);
    (u64::from(compress_mode & 0x0F) << COMPRESS_MODE_SHIFT) | (offset & DICT_VALUE_OFFSET_MASK)
}

#[inline]
pub fn dict_value_compress_mode(value: DictValue) -> u8 {
    (value >> COMPRESS_MODE_SHIFT) as u8
}

#[inline]
pub fn dict_value_offset(value: DictValue) -> u64 {
    value & DICT_VALUE_OFFSET_MASK
}

#[inline]
pub fn is_dict_inline(value: DictValue) -> bool {
    dict_value_compress_mode(value) == DICT_INLINE_COMPRESS_MODE
}

/// Options describing which parts a posting list carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingFormatOption {
    pub has_term_payload: bool,
    pub has_doc_payload: bool,
    pub has_term_frequency: bool,
    pub has_field_map: bool,
    pub has_position_list: bool,
    pub has_position_payload: bool,
    pub compressed_posting_header: bool,
    pub dict_inline_compress: bool,
}

impl Default for PostingFormatOption {
    fn default() -> Self {
        PostingFormatOption {
            has_term_payload: false,
            has_doc_payload: false,
            has_term_frequency: true,
            has_field_map: false,
            has_position_list: false,
            has_position_payload: false,
            compressed_posting_header: true,
            dict_inline_compress: true,
        }
    }
}

impl PostingFormatOption {
    /// Only docs, no frequencies nor positions.
    pub fn doc_only() -> Self {
        PostingFormatOption {
            has_term_frequency: false,
            ..Default::default()
        }
    }

    /// Postings of an index with full position information.
    pub fn with_positions() -> Self {
        PostingFormatOption {
            has_position_list: true,
            has_position_payload: true,
            ..Default::default()
        }
    }

    /// Format used by bitmap postings: doc ids only, term payload kept.
    pub fn bitmap_option(&self) -> PostingFormatOption {
        PostingFormatOption {
            has_term_payload: self.has_term_payload,
            has_doc_payload: false,
            has_term_frequency: false,
            has_field_map: false,
            has_position_list: false,
            has_position_payload: false,
            compressed_posting_header: self.compressed_posting_header,
            dict_inline_compress: false,
        }
    }

    /// Dict-inlining can not carry position lists.
    pub fn is_dict_inline_enabled(&self) -> bool {
        self.dict_inline_compress && !self.has_position_list
    }

    pub fn check(&self) -> Result<()> {
        if self.has_position_list && !self.has_term_frequency {
            bail!(IllegalArgument(
                "position list requires term frequency".into()
            ));
        }
        if self.has_position_payload && !self.has_position_list {
            bail!(IllegalArgument(
                "position payload requires position list".into()
            ));
        }
        Ok(())
    }
}

/// On-disk width of dictionary keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DictKeyType {
    U8,
    U16,
    U32,
    U64,
}

impl Default for DictKeyType {
    fn default() -> Self {
        DictKeyType::U64
    }
}

impl DictKeyType {
    pub fn width(self) -> usize {
        match self {
            DictKeyType::U8 => 1,
            DictKeyType::U16 => 2,
            DictKeyType::U32 => 4,
            DictKeyType::U64 => 8,
        }
    }
}

/// Everything a reader needs before parsing the files of one index directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexFormatOption {
    pub posting_format_option: PostingFormatOption,
    pub dict_key_type: DictKeyType,
    pub hash_typed_dictionary: bool,
}

impl IndexFormatOption {
    pub fn new(
        posting_format_option: PostingFormatOption,
        dict_key_type: DictKeyType,
        hash_typed_dictionary: bool,
    ) -> Self {
        IndexFormatOption {
            posting_format_option,
            dict_key_type,
            hash_typed_dictionary,
        }
    }

    /// Option for the bitmap files living next to this index.
    pub fn bitmap_format_option(&self) -> IndexFormatOption {
        IndexFormatOption {
            posting_format_option: self.posting_format_option.bitmap_option(),
            ..*self
        }
    }

    pub fn store(&self, directory: &dyn Directory) -> Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        let mut output = directory.create_output(INDEX_FORMAT_OPTION_FILE_NAME)?;
        output.write_all(&content)?;
        output.close()
    }

    pub fn load(directory: &dyn Directory) -> Result<IndexFormatOption> {
        let source = directory.open_source(INDEX_FORMAT_OPTION_FILE_NAME)?;
        let option: IndexFormatOption = serde_json::from_slice(source.as_slice())?;
        option.posting_format_option.check()?;
        Ok(option)
    }
}
