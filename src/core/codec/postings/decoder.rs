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

use crate::core::codec::dict_inline::DictInlineFormatter;
use crate::core::codec::postings::{
    BitmapPostingDecoder, DocListDecoder, PositionListDecoder, MAX_DOC_PER_RECORD,
};
use crate::core::codec::{
    dict_value_compress_mode, dict_value_offset, doc_compress_mode, is_dict_inline,
    pos_compress_mode, PostingFormatOption, TermMeta, TermMetaLoader,
};
use crate::core::store::io::{DataInput, ReadOnlySource};
use crate::core::util::varint::decode_uvarint;
use crate::core::util::{DictValue, DocId};
use crate::error::ErrorKind::{FileIO, IndexCollapsed};
use crate::error::{Result, ResultExt};

/// Cuts the length prefixed posting block at `offset` out of a posting
/// file, the result starts at the term meta.
pub fn read_posting_block(
    option: &PostingFormatOption,
    posting: &ReadOnlySource,
    offset: u64,
) -> Result<ReadOnlySource> {
    let offset = offset as usize;
    if offset >= posting.len() {
        bail!(FileIO(format!(
            "posting offset {} past the end of posting file ({} bytes)",
            offset,
            posting.len()
        )));
    }
    let mut input = &posting.as_slice()[offset..];
    let block_len = if option.compressed_posting_header {
        decode_uvarint(&mut input)
    } else {
        input.read_int()
    };
    let block_len = block_len.chain_err(|| FileIO("posting block length".into()))? as usize;
    let start = posting.len() - input.len();
    if block_len > input.len() {
        bail!(FileIO(format!(
            "posting block of {} bytes at {} is truncated",
            block_len, offset
        )));
    }
    posting.slice(start, start + block_len)
}

/// Splits `[vint length][body]` off the front of `data`.
fn split_list(data: &ReadOnlySource, what: &str) -> Result<(ReadOnlySource, ReadOnlySource)> {
    let mut input = data.as_slice();
    let len = decode_uvarint(&mut input)
        .chain_err(|| IndexCollapsed(format!("{} length", what)))? as usize;
    let start = data.len() - input.len();
    if len > input.len() {
        bail!(IndexCollapsed(format!(
            "{} of {} bytes exceeds the posting block",
            what, len
        )));
    }
    Ok((data.slice(start, start + len)?, data.slice_from(start + len)?))
}

enum DecoderState {
    Normal {
        doc_list: DocListDecoder,
        position_list: Option<PositionListDecoder>,
    },
    DictInline {
        formatter: DictInlineFormatter,
        consumed: bool,
    },
    Bitmap(BitmapPostingDecoder),
}

/// Decodes one term's posting, whatever shape it was stored in.
pub struct PostingDecoder {
    option: PostingFormatOption,
    term_meta: TermMeta,
    state: DecoderState,
}

impl PostingDecoder {
    /// Opens the posting behind a normal dictionary value, `posting` is the
    /// whole posting file.
    pub fn open(
        option: &PostingFormatOption,
        value: DictValue,
        posting: &ReadOnlySource,
    ) -> Result<PostingDecoder> {
        if is_dict_inline(value) {
            return Self::open_dict_inline(option, value);
        }
        let block = read_posting_block(option, posting, dict_value_offset(value))?;
        Self::open_block(option, dict_value_compress_mode(value), block)
    }

    pub fn open_dict_inline(
        option: &PostingFormatOption,
        value: DictValue,
    ) -> Result<PostingDecoder> {
        let formatter = DictInlineFormatter::from_packed(*option, dict_value_offset(value))?;
        let term_meta = TermMeta::new(
            1,
            u64::from(formatter.term_freq()),
            formatter.term_payload() as u16,
        );
        Ok(PostingDecoder {
            option: *option,
            term_meta,
            state: DecoderState::DictInline {
                formatter,
                consumed: false,
            },
        })
    }

    /// `block` starts at the term meta, as returned by `read_posting_block`.
    pub fn open_block(
        option: &PostingFormatOption,
        compress_mode: u8,
        block: ReadOnlySource,
    ) -> Result<PostingDecoder> {
        let mut input = block.as_slice();
        let term_meta = TermMetaLoader::new(*option)
            .load(&mut input)
            .chain_err(|| IndexCollapsed("posting term meta".into()))?;
        let rest = block.slice_from(block.len() - input.len())?;
        let (doc_data, rest) = split_list(&rest, "doc list")?;
        let doc_list = DocListDecoder::open(*option, doc_compress_mode(compress_mode), doc_data)?;
        let position_list = if option.has_position_list {
            let (pos_data, _) = split_list(&rest, "position list")?;
            Some(PositionListDecoder::open(
                *option,
                pos_compress_mode(compress_mode),
                pos_data,
            )?)
        } else {
            None
        };
        Ok(PostingDecoder {
            option: *option,
            term_meta,
            state: DecoderState::Normal {
                doc_list,
                position_list,
            },
        })
    }

    /// Opens a bitmap posting, `option` is the bitmap format option.
    pub fn open_bitmap(
        option: &PostingFormatOption,
        value: DictValue,
        posting: &ReadOnlySource,
    ) -> Result<PostingDecoder> {
        let block = read_posting_block(option, posting, dict_value_offset(value))?;
        Self::open_bitmap_block(option, block)
    }

    pub fn open_bitmap_block(
        option: &PostingFormatOption,
        block: ReadOnlySource,
    ) -> Result<PostingDecoder> {
        let mut input = block.as_slice();
        let term_meta = TermMetaLoader::new(*option)
            .load(&mut input)
            .chain_err(|| IndexCollapsed("bitmap term meta".into()))?;
        let data = block.slice_from(block.len() - input.len())?;
        Ok(PostingDecoder {
            option: *option,
            term_meta,
            state: DecoderState::Bitmap(BitmapPostingDecoder::open(data)?),
        })
    }

    pub fn option(&self) -> &PostingFormatOption {
        &self.option
    }

    pub fn term_meta(&self) -> &TermMeta {
        &self.term_meta
    }

    pub fn doc_freq(&self) -> u32 {
        self.term_meta.doc_freq
    }

    /// The stored term payload, `None` when the format has none.
    pub fn term_payload(&self) -> Option<u16> {
        if self.option.has_term_payload {
            Some(self.term_meta.payload)
        } else {
            None
        }
    }

    pub fn has_position_list(&self) -> bool {
        match self.state {
            DecoderState::Normal {
                ref position_list, ..
            } => position_list.is_some(),
            _ => false,
        }
    }

    /// Decodes up to `MAX_DOC_PER_RECORD` documents, doc ids are segment
    /// local and ascending. Returns 0 once the posting is exhausted.
    pub fn decode_doc_list(
        &mut self,
        doc_buf: &mut [DocId],
        tf_buf: &mut [u32],
        doc_payload_buf: &mut [u16],
        field_map_buf: &mut [u8],
    ) -> Result<usize> {
        debug_assert!(doc_buf.len() >= MAX_DOC_PER_RECORD);
        match self.state {
            DecoderState::Normal {
                ref mut doc_list, ..
            } => doc_list.decode_record(doc_buf, tf_buf, doc_payload_buf, field_map_buf),
            DecoderState::DictInline {
                ref formatter,
                ref mut consumed,
            } => {
                if *consumed {
                    return Ok(0);
                }
                *consumed = true;
                doc_buf[0] = formatter.doc_id() as DocId;
                tf_buf[0] = formatter.term_freq();
                doc_payload_buf[0] = formatter.doc_payload() as u16;
                field_map_buf[0] = formatter.field_map() as u8;
                Ok(1)
            }
            DecoderState::Bitmap(ref mut bitmap) => {
                let n = bitmap.decode(&mut doc_buf[..MAX_DOC_PER_RECORD]);
                for i in 0..n {
                    tf_buf[i] = 1;
                    doc_payload_buf[i] = 0;
                    field_map_buf[i] = 0;
                }
                Ok(n)
            }
        }
    }

    /// Decodes the next record of position deltas, 0 when there are none.
    pub fn decode_pos_list(
        &mut self,
        pos_buf: &mut [u32],
        pos_payload_buf: &mut [u8],
    ) -> Result<usize> {
        match self.state {
            DecoderState::Normal {
                position_list: Some(ref mut position_list),
                ..
            } => position_list.decode_record(pos_buf, pos_payload_buf),
            _ => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::dict_inline;
    use crate::core::codec::{make_dict_value, DICT_INLINE_COMPRESS_MODE};
    use crate::core::store::io::DataOutput;

    #[test]
    fn test_dict_inline_decoder() {
        let option = PostingFormatOption {
            has_term_payload: true,
            ..Default::default()
        };
        let packed = dict_inline::encode(&[5, 42, 3]).unwrap();
        let value = make_dict_value(DICT_INLINE_COMPRESS_MODE, packed);
        let empty = ReadOnlySource::from_vec(Vec::new());
        let mut decoder = PostingDecoder::open(&option, value, &empty).unwrap();
        assert_eq!(decoder.doc_freq(), 1);
        assert_eq!(decoder.term_payload(), Some(5));
        assert_eq!(decoder.term_meta().total_term_freq, 3);

        let mut docs = [0; MAX_DOC_PER_RECORD];
        let mut tfs = [0; MAX_DOC_PER_RECORD];
        let mut payloads = [0; MAX_DOC_PER_RECORD];
        let mut field_maps = [0; MAX_DOC_PER_RECORD];
        let n = decoder
            .decode_doc_list(&mut docs, &mut tfs, &mut payloads, &mut field_maps)
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!((docs[0], tfs[0]), (42, 3));
        let n = decoder
            .decode_doc_list(&mut docs, &mut tfs, &mut payloads, &mut field_maps)
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_read_posting_block_bounds() {
        let option = PostingFormatOption {
            compressed_posting_header: false,
            ..Default::default()
        };
        let mut file: Vec<u8> = Vec::new();
        file.write_int(3).unwrap();
        file.extend_from_slice(&[1, 2, 3]);
        let posting = ReadOnlySource::from_vec(file);
        let block = read_posting_block(&option, &posting, 0).unwrap();
        assert_eq!(block.as_slice(), &[1, 2, 3]);
        assert!(read_posting_block(&option, &posting, 7).is_err());

        let truncated = ReadOnlySource::from_vec(posting.as_slice()[..6].to_vec());
        assert!(read_posting_block(&option, &truncated, 0).is_err());
    }
}
