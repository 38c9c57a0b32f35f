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
    BitmapPostingWriter, DocListEncoder, PositionListEncoder, PostingDecoder,
};
use crate::core::codec::{
    compose_compress_mode, make_dict_value, PostingFormatOption, TermMeta, TermMetaDumper,
    DICT_INLINE_COMPRESS_MODE, PFOR_DELTA_COMPRESS_MODE,
};
use crate::core::store::io::{DataOutput, ReadOnlySource};
use crate::core::util::varint::varint_length;
use crate::core::util::{BufferPool, DictValue, DocId};
use crate::error::ErrorKind::InconsistentState;
use crate::error::Result;

/// Field indexes a field map can record.
pub const MAX_FIELD_MAP_FIELDS: u8 = 8;

/// Which posting stream of an index a term belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TermIndexMode {
    Normal,
    Bitmap,
}

/// Accumulates the posting of one term within one segment.
///
/// Calls follow `(add_position* end_document)* end_segment`, then the posting
/// is either turned into a dict-inline value or dumped as a posting block.
pub trait PostingWriter {
    fn add_position(&mut self, pos: u32, pos_payload: u8, field_index: u8) -> Result<()>;

    fn end_document(&mut self, doc_id: DocId, doc_payload: u16) -> Result<()>;

    /// Ends the document with `field_map` instead of the field map collected
    /// from its positions. Used when copying documents of another posting.
    fn end_document_with_field_map(
        &mut self,
        doc_id: DocId,
        doc_payload: u16,
        field_map: u8,
    ) -> Result<()>;

    /// Flushes partially filled records, no document may follow.
    fn end_segment(&mut self) -> Result<()>;

    fn df(&self) -> u32;

    fn total_tf(&self) -> u64;

    fn term_payload(&self) -> u16;

    fn set_term_payload(&mut self, term_payload: u16) -> Result<()>;

    /// Bytes `dump` writes, 0 when the posting has no block.
    fn dump_length(&self) -> usize;

    fn compress_mode(&self) -> u8;

    /// The packed dictionary value for a single document posting, `None`
    /// when the posting needs a block.
    fn dict_inline_posting_value(&self) -> Result<Option<DictValue>>;

    /// Writes the posting body, the term meta is written by the caller.
    fn dump<O: DataOutput + ?Sized>(&self, output: &mut O) -> Result<()>;

    fn term_meta(&self) -> TermMeta {
        TermMeta::new(self.df(), self.total_tf(), self.term_payload())
    }
}

/// Writes `[length][term meta][posting body]` for `writer`.
pub fn write_posting_block<W, O>(
    option: &PostingFormatOption,
    writer: &W,
    output: &mut O,
) -> Result<()>
where
    W: PostingWriter,
    O: DataOutput + ?Sized,
{
    let meta = writer.term_meta();
    let dumper = TermMetaDumper::new(*option);
    let block_len = dumper.calculate_store_size(&meta) + writer.dump_length();
    if option.compressed_posting_header {
        output.write_vint(block_len as u32)?;
    } else {
        output.write_int(block_len as u32)?;
    }
    dumper.dump(&meta, output)?;
    writer.dump(output)
}

/// Size of the block `write_posting_block` writes for `writer`.
pub fn posting_block_length<W: PostingWriter>(option: &PostingFormatOption, writer: &W) -> usize {
    let meta_len = TermMetaDumper::new(*option).calculate_store_size(&writer.term_meta());
    let block_len = meta_len + writer.dump_length();
    if option.compressed_posting_header {
        varint_length(block_len as u32) + block_len
    } else {
        4 + block_len
    }
}

#[derive(Clone, Copy, Debug)]
struct InlineDocInfo {
    doc_id: DocId,
    doc_payload: u16,
    tf: u32,
    field_map: u8,
}

struct FullEncoder {
    doc_list: DocListEncoder,
    position_list: Option<PositionListEncoder>,
}

enum PostingState {
    /// Nothing complete yet, the first document is being accumulated.
    SingleDocInfo,
    /// Exactly one complete document that fits a dict-inline value.
    DictInlineValue(InlineDocInfo),
    FullEncoder(Box<FullEncoder>),
}

/// The posting writer of a normal term.
///
/// It starts out holding a single document and only allocates encoders once
/// a second document arrives or the first one can not be dict-inlined.
/// Transitions only go forward: `SingleDocInfo -> DictInlineValue ->
/// FullEncoder`, or `SingleDocInfo -> FullEncoder`.
pub struct PostingWriterImpl {
    option: PostingFormatOption,
    state: PostingState,
    term_payload: u16,
    segment_ended: bool,
    // accumulators of the current document before encoders exist
    current_tf: u32,
    current_field_map: u8,
    doc_buffer: Option<Vec<u8>>,
    pos_buffer: Option<Vec<u8>>,
}

impl PostingWriterImpl {
    pub fn new(option: PostingFormatOption, pool: &mut BufferPool) -> Self {
        let mut writer = PostingWriterImpl {
            option,
            state: PostingState::SingleDocInfo,
            term_payload: 0,
            segment_ended: false,
            current_tf: 0,
            current_field_map: 0,
            doc_buffer: Some(pool.acquire()),
            pos_buffer: if option.has_position_list {
                Some(pool.acquire())
            } else {
                None
            },
        };
        if !option.is_dict_inline_enabled() {
            writer.state = PostingState::FullEncoder(writer.create_encoder());
        }
        writer
    }

    fn create_encoder(&mut self) -> Box<FullEncoder> {
        let doc_buffer = self.doc_buffer.take().unwrap_or_default();
        let position_list = if self.option.has_position_list {
            let pos_buffer = self.pos_buffer.take().unwrap_or_default();
            Some(PositionListEncoder::new(self.option, pos_buffer))
        } else {
            None
        };
        Box::new(FullEncoder {
            doc_list: DocListEncoder::new(self.option, doc_buffer),
            position_list,
        })
    }

    fn formatter(&self, info: &InlineDocInfo) -> DictInlineFormatter {
        let mut formatter = DictInlineFormatter::new(self.option);
        formatter.set_term_payload(u32::from(self.term_payload));
        formatter.set_doc_id(info.doc_id as u32);
        formatter.set_doc_payload(u32::from(info.doc_payload));
        formatter.set_term_freq(info.tf);
        formatter.set_field_map(u32::from(info.field_map));
        formatter
    }

    fn inline_value(&self, info: &InlineDocInfo) -> Option<DictValue> {
        self.formatter(info)
            .encode()
            .map(|packed| make_dict_value(DICT_INLINE_COMPRESS_MODE, packed))
    }

    /// Moves to `FullEncoder`, replaying the inlined document if there is one.
    fn promote(&mut self) -> Result<()> {
        let inlined = match self.state {
            PostingState::FullEncoder(_) => return Ok(()),
            PostingState::DictInlineValue(info) => Some(info),
            PostingState::SingleDocInfo => None,
        };
        let mut encoder = self.create_encoder();
        if let Some(info) = inlined {
            encoder
                .doc_list
                .add_document(info.doc_id, info.tf, info.doc_payload, info.field_map)?;
        }
        self.state = PostingState::FullEncoder(encoder);
        Ok(())
    }

    fn take_current_doc(&mut self, doc_id: DocId, doc_payload: u16) -> InlineDocInfo {
        let info = InlineDocInfo {
            doc_id,
            doc_payload,
            tf: self.current_tf.max(1),
            field_map: self.current_field_map,
        };
        self.current_tf = 0;
        self.current_field_map = 0;
        info
    }

    /// An immutable copy of what has been written so far, readable through
    /// the normal decoder. The writer must have seen `end_segment`.
    pub fn snapshot(&self) -> Result<PostingDecoder> {
        match self.state {
            PostingState::SingleDocInfo => bail!(InconsistentState(
                "snapshot of a posting without documents".into()
            )),
            PostingState::DictInlineValue(ref info) => match self.inline_value(info) {
                Some(value) => PostingDecoder::open_dict_inline(&self.option, value),
                None => bail!(InconsistentState(
                    "dict inline document no longer fits".into()
                )),
            },
            PostingState::FullEncoder(_) => {
                let mut block: Vec<u8> = Vec::with_capacity(self.dump_length() + 16);
                TermMetaDumper::new(self.option).dump(&self.term_meta(), &mut block)?;
                self.dump(&mut block)?;
                PostingDecoder::open_block(
                    &self.option,
                    self.compress_mode(),
                    ReadOnlySource::from_vec(block),
                )
            }
        }
    }

    /// Hands the encoder buffers back to `pool`.
    pub fn recycle(self, pool: &mut BufferPool) {
        if let PostingState::FullEncoder(encoder) = self.state {
            let encoder = *encoder;
            pool.recycle(encoder.doc_list.into_buffer());
            if let Some(position_list) = encoder.position_list {
                pool.recycle(position_list.into_buffer());
            }
        }
        if let Some(buf) = self.doc_buffer {
            pool.recycle(buf);
        }
        if let Some(buf) = self.pos_buffer {
            pool.recycle(buf);
        }
    }
}

impl PostingWriter for PostingWriterImpl {
    fn add_position(&mut self, pos: u32, pos_payload: u8, field_index: u8) -> Result<()> {
        if self.option.has_field_map && field_index >= MAX_FIELD_MAP_FIELDS {
            bail!(InconsistentState(format!(
                "field index {} does not fit the field map",
                field_index
            )));
        }
        match self.state {
            PostingState::FullEncoder(ref mut encoder) => {
                encoder.doc_list.add_position(field_index);
                if let Some(ref mut position_list) = encoder.position_list {
                    position_list.add_position(pos, pos_payload)?;
                }
            }
            _ => {
                self.current_tf += 1;
                if self.option.has_field_map {
                    self.current_field_map |= 1u8 << field_index;
                }
            }
        }
        Ok(())
    }

    fn end_document(&mut self, doc_id: DocId, doc_payload: u16) -> Result<()> {
        match self.state {
            PostingState::SingleDocInfo => {
                if doc_id < 0 {
                    bail!(InconsistentState(format!("invalid doc id {}", doc_id)));
                }
                let info = self.take_current_doc(doc_id, doc_payload);
                if self.inline_value(&info).is_some() {
                    self.state = PostingState::DictInlineValue(info);
                } else {
                    self.promote()?;
                    self.end_document_full(info)?;
                }
            }
            PostingState::DictInlineValue(_) => {
                let info = self.take_current_doc(doc_id, doc_payload);
                self.promote()?;
                self.end_document_full(info)?;
            }
            PostingState::FullEncoder(ref mut encoder) => {
                encoder.doc_list.end_document(doc_id, doc_payload)?;
                if let Some(ref mut position_list) = encoder.position_list {
                    position_list.end_document();
                }
            }
        }
        Ok(())
    }

    fn end_document_with_field_map(
        &mut self,
        doc_id: DocId,
        doc_payload: u16,
        field_map: u8,
    ) -> Result<()> {
        if self.option.has_field_map {
            match self.state {
                PostingState::FullEncoder(ref mut encoder) => {
                    encoder.doc_list.set_field_map(field_map)
                }
                _ => self.current_field_map = field_map,
            }
        }
        self.end_document(doc_id, doc_payload)
    }

    fn end_segment(&mut self) -> Result<()> {
        self.segment_ended = true;
        if let PostingState::FullEncoder(ref mut encoder) = self.state {
            encoder.doc_list.flush();
            if let Some(ref mut position_list) = encoder.position_list {
                position_list.flush();
            }
        }
        Ok(())
    }

    fn df(&self) -> u32 {
        match self.state {
            PostingState::SingleDocInfo => 0,
            PostingState::DictInlineValue(_) => 1,
            PostingState::FullEncoder(ref encoder) => encoder.doc_list.df(),
        }
    }

    fn total_tf(&self) -> u64 {
        match self.state {
            PostingState::SingleDocInfo => 0,
            PostingState::DictInlineValue(ref info) => u64::from(info.tf),
            PostingState::FullEncoder(ref encoder) => encoder.doc_list.total_tf(),
        }
    }

    fn term_payload(&self) -> u16 {
        self.term_payload
    }

    fn set_term_payload(&mut self, term_payload: u16) -> Result<()> {
        self.term_payload = term_payload;
        if let PostingState::DictInlineValue(info) = self.state {
            if self.inline_value(&info).is_none() {
                self.promote()?;
                // the replayed document must reach the dumped records
                if self.segment_ended {
                    self.end_segment()?;
                }
            }
        }
        Ok(())
    }

    fn dump_length(&self) -> usize {
        match self.state {
            PostingState::FullEncoder(ref encoder) => {
                encoder.doc_list.dump_length()
                    + encoder
                        .position_list
                        .as_ref()
                        .map_or(0, |p| p.dump_length())
            }
            _ => 0,
        }
    }

    fn compress_mode(&self) -> u8 {
        match self.state {
            PostingState::FullEncoder(ref encoder) => {
                let pos_mode = encoder
                    .position_list
                    .as_ref()
                    .map_or(PFOR_DELTA_COMPRESS_MODE, |p| p.compress_mode());
                compose_compress_mode(encoder.doc_list.compress_mode(), pos_mode)
            }
            _ => DICT_INLINE_COMPRESS_MODE,
        }
    }

    fn dict_inline_posting_value(&self) -> Result<Option<DictValue>> {
        match self.state {
            PostingState::SingleDocInfo => bail!(InconsistentState(
                "dict inline value of a posting without documents".into()
            )),
            PostingState::DictInlineValue(ref info) => match self.inline_value(info) {
                Some(value) => Ok(Some(value)),
                None => bail!(InconsistentState(
                    "dict inline document no longer fits".into()
                )),
            },
            PostingState::FullEncoder(_) => Ok(None),
        }
    }

    fn dump<O: DataOutput + ?Sized>(&self, output: &mut O) -> Result<()> {
        match self.state {
            PostingState::FullEncoder(ref encoder) => {
                encoder.doc_list.dump(output)?;
                if let Some(ref position_list) = encoder.position_list {
                    position_list.dump(output)?;
                }
                Ok(())
            }
            _ => bail!(InconsistentState(
                "posting without encoder has nothing to dump".into()
            )),
        }
    }
}

impl PostingWriterImpl {
    fn end_document_full(&mut self, info: InlineDocInfo) -> Result<()> {
        if let PostingState::FullEncoder(ref mut encoder) = self.state {
            encoder
                .doc_list
                .add_document(info.doc_id, info.tf, info.doc_payload, info.field_map)?;
        }
        Ok(())
    }
}

impl PostingWriter for BitmapPostingWriter {
    fn add_position(&mut self, _pos: u32, _pos_payload: u8, _field_index: u8) -> Result<()> {
        Ok(())
    }

    fn end_document(&mut self, doc_id: DocId, _doc_payload: u16) -> Result<()> {
        BitmapPostingWriter::end_document(self, doc_id)
    }

    fn end_document_with_field_map(
        &mut self,
        doc_id: DocId,
        _doc_payload: u16,
        _field_map: u8,
    ) -> Result<()> {
        BitmapPostingWriter::end_document(self, doc_id)
    }

    fn end_segment(&mut self) -> Result<()> {
        Ok(())
    }

    fn df(&self) -> u32 {
        BitmapPostingWriter::df(self)
    }

    fn total_tf(&self) -> u64 {
        u64::from(BitmapPostingWriter::df(self))
    }

    fn term_payload(&self) -> u16 {
        BitmapPostingWriter::term_payload(self)
    }

    fn set_term_payload(&mut self, term_payload: u16) -> Result<()> {
        BitmapPostingWriter::set_term_payload(self, term_payload);
        Ok(())
    }

    fn dump_length(&self) -> usize {
        BitmapPostingWriter::dump_length(self)
    }

    fn compress_mode(&self) -> u8 {
        PFOR_DELTA_COMPRESS_MODE
    }

    fn dict_inline_posting_value(&self) -> Result<Option<DictValue>> {
        if BitmapPostingWriter::df(self) == 0 {
            bail!(InconsistentState(
                "dict inline value of a posting without documents".into()
            ));
        }
        Ok(None)
    }

    fn dump<O: DataOutput + ?Sized>(&self, output: &mut O) -> Result<()> {
        BitmapPostingWriter::dump(self, output)
    }
}

/// A term posting writer of either stream.
pub enum TermPostingWriter {
    Normal(PostingWriterImpl),
    Bitmap(BitmapPostingWriter),
}

impl TermPostingWriter {
    pub fn new(option: PostingFormatOption, mode: TermIndexMode, pool: &mut BufferPool) -> Self {
        match mode {
            TermIndexMode::Normal => {
                TermPostingWriter::Normal(PostingWriterImpl::new(option, pool))
            }
            TermIndexMode::Bitmap => TermPostingWriter::Bitmap(BitmapPostingWriter::new()),
        }
    }

    pub fn mode(&self) -> TermIndexMode {
        match self {
            TermPostingWriter::Normal(_) => TermIndexMode::Normal,
            TermPostingWriter::Bitmap(_) => TermIndexMode::Bitmap,
        }
    }

    /// `option` is the format of the stream the writer belongs to.
    pub fn snapshot(&self, option: &PostingFormatOption) -> Result<PostingDecoder> {
        match self {
            TermPostingWriter::Normal(w) => w.snapshot(),
            TermPostingWriter::Bitmap(w) => {
                let mut block: Vec<u8> = Vec::with_capacity(w.dump_length() + 16);
                TermMetaDumper::new(*option).dump(&PostingWriter::term_meta(w), &mut block)?;
                w.dump(&mut block)?;
                PostingDecoder::open_bitmap_block(option, ReadOnlySource::from_vec(block))
            }
        }
    }

    pub fn recycle(self, pool: &mut BufferPool) {
        if let TermPostingWriter::Normal(w) = self {
            w.recycle(pool);
        }
    }
}

macro_rules! delegate {
    ($self:ident, $w:ident => $e:expr) => {
        match $self {
            TermPostingWriter::Normal($w) => $e,
            TermPostingWriter::Bitmap($w) => $e,
        }
    };
}

impl PostingWriter for TermPostingWriter {
    fn add_position(&mut self, pos: u32, pos_payload: u8, field_index: u8) -> Result<()> {
        delegate!(self, w => PostingWriter::add_position(w, pos, pos_payload, field_index))
    }

    fn end_document(&mut self, doc_id: DocId, doc_payload: u16) -> Result<()> {
        delegate!(self, w => PostingWriter::end_document(w, doc_id, doc_payload))
    }

    fn end_document_with_field_map(
        &mut self,
        doc_id: DocId,
        doc_payload: u16,
        field_map: u8,
    ) -> Result<()> {
        delegate!(self, w => w.end_document_with_field_map(doc_id, doc_payload, field_map))
    }

    fn end_segment(&mut self) -> Result<()> {
        delegate!(self, w => w.end_segment())
    }

    fn df(&self) -> u32 {
        delegate!(self, w => PostingWriter::df(w))
    }

    fn total_tf(&self) -> u64 {
        delegate!(self, w => w.total_tf())
    }

    fn term_payload(&self) -> u16 {
        delegate!(self, w => PostingWriter::term_payload(w))
    }

    fn set_term_payload(&mut self, term_payload: u16) -> Result<()> {
        delegate!(self, w => PostingWriter::set_term_payload(w, term_payload))
    }

    fn dump_length(&self) -> usize {
        delegate!(self, w => PostingWriter::dump_length(w))
    }

    fn compress_mode(&self) -> u8 {
        delegate!(self, w => w.compress_mode())
    }

    fn dict_inline_posting_value(&self) -> Result<Option<DictValue>> {
        delegate!(self, w => w.dict_inline_posting_value())
    }

    fn dump<O: DataOutput + ?Sized>(&self, output: &mut O) -> Result<()> {
        delegate!(self, w => PostingWriter::dump(w, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::postings::{read_posting_block, MAX_DOC_PER_RECORD, MAX_POS_PER_RECORD};
    use crate::core::codec::{dict_value_offset, is_dict_inline};

    fn decode_docs(decoder: &mut PostingDecoder) -> Vec<(DocId, u32, u16, u8)> {
        let mut docs = [0; MAX_DOC_PER_RECORD];
        let mut tfs = [0; MAX_DOC_PER_RECORD];
        let mut payloads = [0; MAX_DOC_PER_RECORD];
        let mut field_maps = [0; MAX_DOC_PER_RECORD];
        let mut result = Vec::new();
        loop {
            let n = decoder
                .decode_doc_list(&mut docs, &mut tfs, &mut payloads, &mut field_maps)
                .unwrap();
            if n == 0 {
                return result;
            }
            for i in 0..n {
                result.push((docs[i], tfs[i], payloads[i], field_maps[i]));
            }
        }
    }

    #[test]
    fn test_single_doc_is_dict_inlined() {
        let option = PostingFormatOption {
            has_doc_payload: true,
            has_field_map: true,
            ..Default::default()
        };
        let mut pool = BufferPool::new("test");
        let mut writer = PostingWriterImpl::new(option, &mut pool);
        assert!(writer.dict_inline_posting_value().is_err());

        writer.add_position(0, 0, 2).unwrap();
        writer.add_position(4, 0, 2).unwrap();
        writer.end_document(17, 3).unwrap();
        writer.end_segment().unwrap();
        assert_eq!(writer.df(), 1);
        assert_eq!(writer.total_tf(), 2);
        assert_eq!(writer.dump_length(), 0);

        let value = writer.dict_inline_posting_value().unwrap().unwrap();
        assert!(is_dict_inline(value));
        let mut decoder = writer.snapshot().unwrap();
        assert_eq!(decode_docs(&mut decoder), vec![(17, 2, 3, 0b100)]);
        let formatter = DictInlineFormatter::from_packed(option, dict_value_offset(value)).unwrap();
        assert_eq!(formatter.doc_id(), 17);
        writer.recycle(&mut pool);
    }

    #[test]
    fn test_second_doc_promotes() {
        let option = PostingFormatOption::default();
        let mut pool = BufferPool::new("test");
        let mut writer = PostingWriterImpl::new(option, &mut pool);
        writer.add_position(0, 0, 0).unwrap();
        writer.end_document(3, 0).unwrap();
        writer.add_position(0, 0, 0).unwrap();
        writer.add_position(1, 0, 0).unwrap();
        writer.add_position(2, 0, 0).unwrap();
        writer.end_document(9, 0).unwrap();
        writer.end_segment().unwrap();

        assert_eq!(writer.df(), 2);
        assert_eq!(writer.total_tf(), 4);
        assert_eq!(writer.dict_inline_posting_value().unwrap(), None);
        assert!(writer.dump_length() > 0);
        let mut decoder = writer.snapshot().unwrap();
        assert_eq!(decode_docs(&mut decoder), vec![(3, 1, 0, 0), (9, 3, 0, 0)]);
    }

    #[test]
    fn test_term_payload_after_end_segment_promotes() {
        let option = PostingFormatOption {
            has_term_payload: true,
            has_doc_payload: true,
            ..Default::default()
        };
        let mut pool = BufferPool::new("test");
        let mut writer = PostingWriterImpl::new(option, &mut pool);
        writer.add_position(0, 0, 0).unwrap();
        writer.end_document(1000, u16::max_value()).unwrap();
        writer.end_segment().unwrap();
        assert!(writer.dict_inline_posting_value().unwrap().is_some());

        // doc id, doc payload and tf take 7 bytes, the payload no longer fits
        writer.set_term_payload(u16::max_value()).unwrap();
        assert_eq!(writer.dict_inline_posting_value().unwrap(), None);
        assert_eq!(writer.df(), 1);
        assert!(writer.dump_length() > 0);
        let mut decoder = writer.snapshot().unwrap();
        assert_eq!(decoder.term_meta().payload, u16::max_value());
        assert_eq!(
            decode_docs(&mut decoder),
            vec![(1000, 1, u16::max_value(), 0)]
        );
    }

    #[test]
    fn test_large_doc_is_not_inlined() {
        let option = PostingFormatOption {
            has_term_payload: true,
            has_doc_payload: true,
            has_field_map: true,
            ..Default::default()
        };
        let mut pool = BufferPool::new("test");
        let mut writer = PostingWriterImpl::new(option, &mut pool);
        writer.add_position(0, 0, 7).unwrap();
        // 3 bytes of doc id plus 3 bytes of doc payload plus tf and field map
        writer.end_document(1 << 20, u16::max_value()).unwrap();
        writer.end_segment().unwrap();
        assert_eq!(writer.df(), 1);
        assert_eq!(writer.dict_inline_posting_value().unwrap(), None);
        let mut decoder = writer.snapshot().unwrap();
        assert_eq!(
            decode_docs(&mut decoder),
            vec![(1 << 20, 1, u16::max_value(), 0x80)]
        );
    }

    #[test]
    fn test_term_payload_can_break_inline() {
        let option = PostingFormatOption {
            has_term_payload: true,
            has_doc_payload: true,
            ..Default::default()
        };
        let mut pool = BufferPool::new("test");
        let mut writer = PostingWriterImpl::new(option, &mut pool);
        writer.end_document(1000, u16::max_value()).unwrap();
        assert!(writer.dict_inline_posting_value().unwrap().is_some());
        writer.set_term_payload(u16::max_value()).unwrap();
        writer.end_segment().unwrap();
        assert_eq!(writer.dict_inline_posting_value().unwrap(), None);
        let mut decoder = writer.snapshot().unwrap();
        assert_eq!(decoder.term_payload(), Some(u16::max_value()));
        assert_eq!(decode_docs(&mut decoder), vec![(1000, 1, u16::max_value(), 0)]);
    }

    #[test]
    fn test_positions_and_field_map_limits() {
        let option = PostingFormatOption {
            has_field_map: true,
            ..PostingFormatOption::with_positions()
        };
        let mut pool = BufferPool::new("test");
        let mut writer = PostingWriterImpl::new(option, &mut pool);
        assert!(writer.add_position(1, 0, MAX_FIELD_MAP_FIELDS).is_err());

        writer.add_position(1, 5, 0).unwrap();
        writer.add_position(6, 6, 1).unwrap();
        writer.end_document(0, 0).unwrap();
        writer.end_segment().unwrap();
        // positions disable dict inlining
        assert_eq!(writer.dict_inline_posting_value().unwrap(), None);

        let mut posting: Vec<u8> = Vec::new();
        write_posting_block(&option, &writer, &mut posting).unwrap();
        assert_eq!(posting.len(), posting_block_length(&option, &writer));
        let source = ReadOnlySource::from_vec(posting);
        let block = read_posting_block(&option, &source, 0).unwrap();
        let mut decoder =
            PostingDecoder::open_block(&option, writer.compress_mode(), block).unwrap();
        assert!(decoder.has_position_list());
        assert_eq!(decode_docs(&mut decoder), vec![(0, 2, 0, 0b11)]);

        let mut pos = [0u32; MAX_POS_PER_RECORD];
        let mut payloads = [0u8; MAX_POS_PER_RECORD];
        assert_eq!(decoder.decode_pos_list(&mut pos, &mut payloads).unwrap(), 2);
        assert_eq!(&pos[..2], &[1, 5]);
        assert_eq!(&payloads[..2], &[5, 6]);
    }

    #[test]
    fn test_bitmap_term_writer() {
        let option = PostingFormatOption::default().bitmap_option();
        let mut pool = BufferPool::new("test");
        let mut writer = TermPostingWriter::new(option, TermIndexMode::Bitmap, &mut pool);
        assert_eq!(writer.mode(), TermIndexMode::Bitmap);
        for doc in &[1, 5, 70] {
            writer.add_position(0, 0, 0).unwrap();
            writer.end_document(*doc, 0).unwrap();
        }
        writer.end_segment().unwrap();
        assert_eq!(writer.df(), 3);
        assert_eq!(writer.dict_inline_posting_value().unwrap(), None);
        let mut decoder = writer.snapshot(&option).unwrap();
        assert_eq!(decoder.doc_freq(), 3);
        assert_eq!(
            decode_docs(&mut decoder),
            vec![(1, 1, 0, 0), (5, 1, 0, 0), (70, 1, 0, 0)]
        );
        writer.recycle(&mut pool);
    }
}
