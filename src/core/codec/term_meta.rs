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

use crate::core::codec::PostingFormatOption;
use crate::core::store::io::{DataInput, DataOutput};
use crate::core::util::varint::{varint64_length, varint_length};
use crate::error::Result;

/// Per term statistics stored at the head of every posting block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TermMeta {
    pub doc_freq: u32,
    pub total_term_freq: u64,
    pub payload: u16,
}

impl TermMeta {
    pub fn new(doc_freq: u32, total_term_freq: u64, payload: u16) -> Self {
        TermMeta {
            doc_freq,
            total_term_freq,
            payload,
        }
    }
}

/// Writes `TermMeta`, fields implied by the format are left out.
pub struct TermMetaDumper {
    option: PostingFormatOption,
}

impl TermMetaDumper {
    pub fn new(option: PostingFormatOption) -> Self {
        TermMetaDumper { option }
    }

    pub fn calculate_store_size(&self, meta: &TermMeta) -> usize {
        let mut len = varint_length(meta.doc_freq);
        if self.option.has_term_frequency {
            len += varint64_length(meta.total_term_freq);
        }
        if self.option.has_term_payload {
            len += 2;
        }
        len
    }

    pub fn dump<O: DataOutput + ?Sized>(&self, meta: &TermMeta, output: &mut O) -> Result<()> {
        output.write_vint(meta.doc_freq)?;
        if self.option.has_term_frequency {
            output.write_vlong(meta.total_term_freq)?;
        }
        if self.option.has_term_payload {
            output.write_short(meta.payload)?;
        }
        Ok(())
    }
}

pub struct TermMetaLoader {
    option: PostingFormatOption,
}

impl TermMetaLoader {
    pub fn new(option: PostingFormatOption) -> Self {
        TermMetaLoader { option }
    }

    pub fn load<I: DataInput + ?Sized>(&self, input: &mut I) -> Result<TermMeta> {
        let doc_freq = input.read_vint()?;
        let total_term_freq = if self.option.has_term_frequency {
            input.read_vlong()?
        } else {
            u64::from(doc_freq)
        };
        let payload = if self.option.has_term_payload {
            input.read_short()?
        } else {
            0
        };
        Ok(TermMeta::new(doc_freq, total_term_freq, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_meta_dump_and_load() {
        let option = PostingFormatOption {
            has_term_payload: true,
            ..Default::default()
        };
        let meta = TermMeta::new(300, 1 << 20, 77);
        let dumper = TermMetaDumper::new(option);
        let mut buf: Vec<u8> = Vec::new();
        dumper.dump(&meta, &mut buf).unwrap();
        assert_eq!(buf.len(), dumper.calculate_store_size(&meta));
        assert_eq!(buf.len(), 2 + 3 + 2);

        let mut input = &buf[..];
        assert_eq!(TermMetaLoader::new(option).load(&mut input).unwrap(), meta);
        assert!(input.is_empty());
    }

    #[test]
    fn test_implied_fields_are_omitted() {
        let option = PostingFormatOption::doc_only();
        let meta = TermMeta::new(5, 5, 0);
        let mut buf: Vec<u8> = Vec::new();
        TermMetaDumper::new(option).dump(&meta, &mut buf).unwrap();
        assert_eq!(buf, vec![5]);

        let mut input = &buf[..];
        let loaded = TermMetaLoader::new(option).load(&mut input).unwrap();
        assert_eq!(loaded.total_term_freq, 5);
        assert_eq!(loaded.payload, 0);
    }
}
