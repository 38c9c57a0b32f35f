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

use crate::core::codec::dictionary::{
    DictionaryIterator, DictionaryKey, DictionaryLayout, DICTIONARY_TRAILER_SIZE,
};
use crate::core::store::io::{DataInput, IndexInput, ReadOnlySource};
use crate::core::util::{DictKey, DictValue};
use crate::error::ErrorKind::FileIO;
use crate::error::{Result, ResultExt};

use byteorder::{ByteOrder, LittleEndian};

use std::marker::PhantomData;

/// Walks the records region of a dictionary held in memory.
pub struct InMemoryDictionaryIterator<K: DictionaryKey> {
    records: ReadOnlySource,
    layout: DictionaryLayout,
    cursor: usize,
    _key: PhantomData<K>,
}

impl<K: DictionaryKey> InMemoryDictionaryIterator<K> {
    pub(crate) fn new(records: ReadOnlySource, layout: DictionaryLayout) -> Self {
        InMemoryDictionaryIterator {
            records,
            layout,
            cursor: 0,
            _key: PhantomData,
        }
    }
}

impl<K: DictionaryKey> DictionaryIterator for InMemoryDictionaryIterator<K> {
    fn next(&mut self) -> Result<Option<(DictKey, DictValue)>> {
        let bytes = self.records.as_slice();
        if self.cursor + self.layout.record_size > bytes.len() {
            return Ok(None);
        }
        let record = &bytes[self.cursor..self.cursor + self.layout.record_size];
        self.cursor += self.layout.record_size;
        let key = K::read_le(record).to_dict_key();
        let value = LittleEndian::read_u64(&record[self.layout.value_offset..]);
        Ok(Some((key, value)))
    }
}

/// Streams the records of a dictionary file, only the trailer is read up
/// front.
pub struct DiskDictionaryIterator<K: DictionaryKey> {
    input: Box<dyn IndexInput>,
    layout: DictionaryLayout,
    remaining: usize,
    buffer: Vec<u8>,
    _key: PhantomData<K>,
}

impl<K: DictionaryKey> DiskDictionaryIterator<K> {
    pub fn open(mut input: Box<dyn IndexInput>, layout: DictionaryLayout) -> Result<Self> {
        let len = input.len() as usize;
        let mut trailer = [0u8; DICTIONARY_TRAILER_SIZE];
        if len >= DICTIONARY_TRAILER_SIZE {
            input.seek((len - DICTIONARY_TRAILER_SIZE) as u64)?;
            input
                .read_bytes(&mut trailer, 0, DICTIONARY_TRAILER_SIZE)
                .chain_err(|| FileIO(format!("read trailer of {}", input.name())))?;
        }
        let layout = layout.parse(input.name(), len, &trailer)?;
        input.seek(0)?;
        let buffer = vec![0u8; layout.record_size];
        Ok(DiskDictionaryIterator {
            input,
            remaining: layout.item_count,
            layout,
            buffer,
            _key: PhantomData,
        })
    }
}

impl<K: DictionaryKey> DictionaryIterator for DiskDictionaryIterator<K> {
    fn next(&mut self) -> Result<Option<(DictKey, DictValue)>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let size = self.layout.record_size;
        if let Err(e) = self.input.read_bytes(&mut self.buffer, 0, size) {
            let msg = format!(
                "dictionary {} ends with {} records unread",
                self.input.name(),
                self.remaining
            );
            return Err(e).chain_err(|| FileIO(msg));
        }
        self.remaining -= 1;
        let key = K::read_le(&self.buffer).to_dict_key();
        let value = LittleEndian::read_u64(&self.buffer[self.layout.value_offset..]);
        Ok(Some((key, value)))
    }
}
