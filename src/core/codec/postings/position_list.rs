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

use crate::core::codec::postings::doc_list::check_list_len;
use crate::core::codec::{
    PostingFormatOption, PFOR_DELTA_COMPRESS_MODE, SHORT_LIST_COMPRESS_MODE,
};
use crate::core::store::io::{DataOutput, ReadOnlySource};
use crate::core::util::varint::{append_uvarint, decode_uvarint, varint_length};
use crate::error::ErrorKind::{IndexCollapsed, InconsistentState};
use crate::error::{Result, ResultExt};

pub const MAX_POS_PER_RECORD: usize = 128;
pub const MAX_SHORT_LIST_POS_COUNT: u64 = 8;

/// Encodes in-document positions as deltas, restarting from zero for every
/// document, in records of up to `MAX_POS_PER_RECORD`.
pub struct PositionListEncoder {
    option: PostingFormatOption,
    pos_deltas: Vec<u32>,
    pos_payloads: Vec<u8>,
    last_pos: u32,
    total_pos: u64,
    record_count: u32,
    data: Vec<u8>,
}

impl PositionListEncoder {
    pub fn new(option: PostingFormatOption, mut data: Vec<u8>) -> Self {
        data.clear();
        PositionListEncoder {
            option,
            pos_deltas: Vec::with_capacity(MAX_POS_PER_RECORD),
            pos_payloads: Vec::new(),
            last_pos: 0,
            total_pos: 0,
            record_count: 0,
            data,
        }
    }

    pub fn add_position(&mut self, pos: u32, pos_payload: u8) -> Result<()> {
        if pos < self.last_pos {
            bail!(InconsistentState(format!(
                "position {} added after position {}",
                pos, self.last_pos
            )));
        }
        self.pos_deltas.push(pos - self.last_pos);
        if self.option.has_position_payload {
            self.pos_payloads.push(pos_payload);
        }
        self.last_pos = pos;
        self.total_pos += 1;
        if self.pos_deltas.len() == MAX_POS_PER_RECORD {
            self.flush_record();
        }
        Ok(())
    }

    pub fn end_document(&mut self) {
        self.last_pos = 0;
    }

    fn flush_record(&mut self) {
        append_uvarint(&mut self.data, self.pos_deltas.len() as u32);
        for &delta in &self.pos_deltas {
            append_uvarint(&mut self.data, delta);
        }
        if self.option.has_position_payload {
            append_uvarint(&mut self.data, self.pos_payloads.len() as u32);
            self.data.extend_from_slice(&self.pos_payloads);
        }
        self.pos_deltas.clear();
        self.pos_payloads.clear();
        self.record_count += 1;
    }

    pub fn flush(&mut self) {
        if !self.pos_deltas.is_empty() {
            self.flush_record();
        }
    }

    pub fn total_pos_count(&self) -> u64 {
        self.total_pos
    }

    pub fn compress_mode(&self) -> u8 {
        if self.total_pos <= MAX_SHORT_LIST_POS_COUNT {
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
        if !self.pos_deltas.is_empty() {
            bail!(InconsistentState(format!(
                "position list dumped with {} unflushed positions",
                self.pos_deltas.len()
            )));
        }
        output.write_vint(self.body_length() as u32)?;
        if self.compress_mode() == PFOR_DELTA_COMPRESS_MODE {
            output.write_vint(self.record_count)?;
        }
        output.write_bytes(&self.data, 0, self.data.len())
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.data
    }
}

/// Decodes position records, yielding the raw per document deltas.
pub struct PositionListDecoder {
    option: PostingFormatOption,
    data: ReadOnlySource,
    cursor: usize,
    remaining_records: u32,
}

impl PositionListDecoder {
    pub fn open(option: PostingFormatOption, pos_mode: u8, data: ReadOnlySource) -> Result<Self> {
        let (remaining_records, cursor) = match pos_mode {
            SHORT_LIST_COMPRESS_MODE => (if data.is_empty() { 0 } else { 1 }, 0),
            PFOR_DELTA_COMPRESS_MODE => {
                let mut input = data.as_slice();
                let count = decode_uvarint(&mut input)
                    .chain_err(|| IndexCollapsed("position list record count".into()))?;
                (count, data.len() - input.len())
            }
            _ => bail!(IndexCollapsed(format!(
                "unknown position list mode {}",
                pos_mode
            ))),
        };
        Ok(PositionListDecoder {
            option,
            data,
            cursor,
            remaining_records,
        })
    }

    /// Returns the number of positions decoded, 0 once exhausted.
    pub fn decode_record(&mut self, pos_buf: &mut [u32], payload_buf: &mut [u8]) -> Result<usize> {
        if self.remaining_records == 0 {
            return Ok(0);
        }
        let data = self.data.clone();
        let mut input = &data.as_slice()[self.cursor..];
        let count = self
            .decode_record_inner(&mut input, pos_buf, payload_buf)
            .chain_err(|| IndexCollapsed("corrupted position list record".into()))?;
        self.cursor = data.len() - input.len();
        self.remaining_records -= 1;
        Ok(count)
    }

    fn decode_record_inner(
        &self,
        input: &mut &[u8],
        pos_buf: &mut [u32],
        payload_buf: &mut [u8],
    ) -> Result<usize> {
        let n = decode_uvarint(input)? as usize;
        if n == 0 || n > MAX_POS_PER_RECORD || n > pos_buf.len() {
            bail!(IndexCollapsed(format!("position record of {} items", n)));
        }
        for pos in pos_buf.iter_mut().take(n) {
            *pos = decode_uvarint(input)?;
        }
        if self.option.has_position_payload {
            check_list_len(decode_uvarint(input)? as usize, n, "position payload")?;
            if input.len() < n {
                bail!(IndexCollapsed("position payloads truncated".into()));
            }
            payload_buf[..n].copy_from_slice(&input[..n]);
            *input = &input[n..];
        } else {
            payload_buf[..n].iter_mut().for_each(|p| *p = 0);
        }
        Ok(n)
    }
}
