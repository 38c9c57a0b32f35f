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
    DictionaryIterator, DictionaryKey, DictionaryLayout, DictionaryReader, DictionaryWriter,
    InMemoryDictionaryIterator, DiskDictionaryIterator, DICTIONARY_MAGIC_NUMBER,
    DICTIONARY_TRAILER_SIZE, ITEM_COUNT_PER_BLOCK,
};
use crate::core::store::directory::DirectoryRc;
use crate::core::store::io::{DataInput, DataOutput, IndexInput, IndexOutput, ReadOnlySource};
use crate::core::util::{DictKey, DictValue};
use crate::error::ErrorKind::{FileIO, InconsistentState};
use crate::error::Result;

use byteorder::{ByteOrder, LittleEndian};

use std::cmp::{min, Ordering};
use std::sync::Mutex;

/// Writes sorted `(key, value)` records followed by a sparse index holding
/// the last key of every block of `ITEM_COUNT_PER_BLOCK` records.
pub struct TieredDictionaryWriter<K: DictionaryKey> {
    output: Box<dyn IndexOutput>,
    block_index: Vec<K>,
    item_count: usize,
    last_key: Option<K>,
    closed: bool,
}

impl<K: DictionaryKey> TieredDictionaryWriter<K> {
    pub fn new(output: Box<dyn IndexOutput>) -> Self {
        TieredDictionaryWriter {
            output,
            block_index: Vec::new(),
            item_count: 0,
            last_key: None,
            closed: false,
        }
    }
}

impl<K: DictionaryKey> DictionaryWriter for TieredDictionaryWriter<K> {
    fn add_item(&mut self, key: DictKey, value: DictValue) -> Result<()> {
        if self.closed {
            bail!(InconsistentState(format!(
                "add key {} to closed dictionary {}",
                key,
                self.output.name()
            )));
        }
        let k = K::from_dict_key(key)?;
        if let Some(last) = self.last_key {
            if k <= last {
                bail!(InconsistentState(format!(
                    "dictionary keys out of order: {} after {:?}",
                    key, last
                )));
            }
        }
        k.write_to(self.output.as_mut())?;
        self.output.write_long(value)?;
        self.item_count += 1;
        self.last_key = Some(k);
        if self.item_count % ITEM_COUNT_PER_BLOCK == 0 {
            self.block_index.push(k);
        }
        Ok(())
    }

    fn item_count(&self) -> usize {
        self.item_count
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.item_count % ITEM_COUNT_PER_BLOCK != 0 {
            if let Some(last) = self.last_key {
                self.block_index.push(last);
            }
        }
        for &k in &self.block_index {
            k.write_to(self.output.as_mut())?;
        }
        self.output.write_int(self.block_index.len() as u32)?;
        self.output.write_int(DICTIONARY_MAGIC_NUMBER)?;
        self.output.close()?;
        self.closed = true;
        Ok(())
    }
}

fn check_block_count(name: &str, layout: &DictionaryLayout) -> Result<()> {
    let expected = (layout.item_count + ITEM_COUNT_PER_BLOCK - 1) / ITEM_COUNT_PER_BLOCK;
    if layout.index_count != expected {
        bail!(FileIO(format!(
            "dictionary {} has {} blocks for {} items",
            name, layout.index_count, layout.item_count
        )));
    }
    Ok(())
}

fn read_block_index<K: DictionaryKey>(bytes: &[u8], count: usize) -> Vec<K> {
    (0..count)
        .map(|i| K::read_le(&bytes[i * K::WIDTH..]))
        .collect()
}

/// Binary search inside sorted records, returns the value stored for `key`.
fn search_records<K: DictionaryKey>(
    records: &[u8],
    layout: &DictionaryLayout,
    key: K,
) -> Option<DictValue> {
    let count = records.len() / layout.record_size;
    let (mut lo, mut hi) = (0usize, count);
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let offset = mid * layout.record_size;
        let k = K::read_le(&records[offset..]);
        match k.cmp(&key) {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => {
                return Some(LittleEndian::read_u64(
                    &records[offset + layout.value_offset..],
                ));
            }
        }
    }
    None
}

/// Index of the block that may hold `key`.
fn locate_block<K: DictionaryKey>(block_index: &[K], key: K) -> Option<usize> {
    let block = block_index.partition_point(|&last| last < key);
    if block < block_index.len() {
        Some(block)
    } else {
        None
    }
}

/// Tiered dictionary reader over an in-memory (or mapped) file.
pub struct TieredDictionaryReader<K: DictionaryKey> {
    source: ReadOnlySource,
    layout: DictionaryLayout,
    block_index: Vec<K>,
}

impl<K: DictionaryKey> TieredDictionaryReader<K> {
    pub fn open(source: ReadOnlySource) -> Result<Self> {
        let bytes = source.as_slice();
        let len = bytes.len();
        let trailer = &bytes[len.saturating_sub(DICTIONARY_TRAILER_SIZE)..];
        let layout = DictionaryLayout::tiered(K::WIDTH).parse("tiered", len, trailer)?;
        check_block_count("tiered", &layout)?;
        let block_index = read_block_index(&bytes[layout.records_len()..], layout.index_count);
        Ok(TieredDictionaryReader {
            source,
            layout,
            block_index,
        })
    }
}

impl<K: DictionaryKey> DictionaryReader for TieredDictionaryReader<K> {
    fn lookup(&self, key: DictKey) -> Result<Option<DictValue>> {
        let k = match K::from_dict_key(key) {
            Ok(k) => k,
            Err(_) => return Ok(None),
        };
        let block = match locate_block(&self.block_index, k) {
            Some(b) => b,
            None => return Ok(None),
        };
        let start = block * ITEM_COUNT_PER_BLOCK;
        let end = min(start + ITEM_COUNT_PER_BLOCK, self.layout.item_count);
        let records = &self.source.as_slice()
            [start * self.layout.record_size..end * self.layout.record_size];
        Ok(search_records(records, &self.layout, k))
    }

    fn item_count(&self) -> usize {
        self.layout.item_count
    }

    fn create_iterator(&self) -> Result<Box<dyn DictionaryIterator>> {
        let records = self.source.slice(0, self.layout.records_len())?;
        Ok(Box::new(InMemoryDictionaryIterator::<K>::new(
            records,
            self.layout,
        )))
    }
}

/// Tiered dictionary reader that only keeps the block index in memory and
/// reads the one candidate block per lookup.
pub struct BlockedTieredDictionaryReader<K: DictionaryKey> {
    directory: DirectoryRc,
    name: String,
    input: Mutex<Box<dyn IndexInput>>,
    layout: DictionaryLayout,
    block_index: Vec<K>,
}

impl<K: DictionaryKey> BlockedTieredDictionaryReader<K> {
    pub fn open(directory: DirectoryRc, name: &str) -> Result<Self> {
        let mut input = directory.open_input(name)?;
        let len = input.len() as usize;
        let mut trailer = [0u8; DICTIONARY_TRAILER_SIZE];
        if len >= DICTIONARY_TRAILER_SIZE {
            input.seek((len - DICTIONARY_TRAILER_SIZE) as u64)?;
            input.read_bytes(&mut trailer, 0, DICTIONARY_TRAILER_SIZE)?;
        }
        let layout = DictionaryLayout::tiered(K::WIDTH).parse(name, len, &trailer)?;
        check_block_count(name, &layout)?;

        let mut index_bytes = vec![0u8; layout.index_count * K::WIDTH];
        input.seek(layout.records_len() as u64)?;
        let index_len = index_bytes.len();
        input.read_bytes(&mut index_bytes, 0, index_len)?;
        let block_index = read_block_index(&index_bytes, layout.index_count);
        Ok(BlockedTieredDictionaryReader {
            directory,
            name: name.to_string(),
            input: Mutex::new(input),
            layout,
            block_index,
        })
    }
}

impl<K: DictionaryKey> DictionaryReader for BlockedTieredDictionaryReader<K> {
    fn lookup(&self, key: DictKey) -> Result<Option<DictValue>> {
        let k = match K::from_dict_key(key) {
            Ok(k) => k,
            Err(_) => return Ok(None),
        };
        let block = match locate_block(&self.block_index, k) {
            Some(b) => b,
            None => return Ok(None),
        };
        let start = block * ITEM_COUNT_PER_BLOCK;
        let end = min(start + ITEM_COUNT_PER_BLOCK, self.layout.item_count);
        let mut records = vec![0u8; (end - start) * self.layout.record_size];
        {
            let mut input = self.input.lock()?;
            input.seek((start * self.layout.record_size) as u64)?;
            let records_len = records.len();
            input.read_bytes(&mut records, 0, records_len)?;
        }
        Ok(search_records(&records, &self.layout, k))
    }

    fn item_count(&self) -> usize {
        self.layout.item_count
    }

    fn create_iterator(&self) -> Result<Box<dyn DictionaryIterator>> {
        let input = self.directory.open_input(&self.name)?;
        Ok(Box::new(DiskDictionaryIterator::<K>::open(
            input,
            DictionaryLayout::tiered(K::WIDTH),
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::directory::{Directory, RAMDirectory};

    use std::sync::Arc;

    fn write_items(dir: &dyn Directory, count: u64) {
        let mut writer = TieredDictionaryWriter::<u32>::new(dir.create_output("dict").unwrap());
        for i in 0..count {
            writer.add_item(i * 3, i + 100).unwrap();
        }
        writer.close().unwrap();
    }

    #[test]
    fn test_tiered_layout() {
        let dir = RAMDirectory::new();
        write_items(&dir, 129);
        let bytes = dir.open_source("dict").unwrap().as_slice().to_vec();
        // 129 records, 2 block keys, count and magic
        assert_eq!(bytes.len(), 129 * 12 + 2 * 4 + 8);
        let index = &bytes[129 * 12..];
        assert_eq!(LittleEndian::read_u32(index), 127 * 3);
        assert_eq!(LittleEndian::read_u32(&index[4..]), 128 * 3);
        assert_eq!(LittleEndian::read_u32(&index[8..]), 2);
        assert_eq!(LittleEndian::read_u32(&index[12..]), DICTIONARY_MAGIC_NUMBER);
    }

    #[test]
    fn test_empty_dictionary() {
        let dir = RAMDirectory::new();
        write_items(&dir, 0);
        assert_eq!(dir.file_length("dict").unwrap(), 8);
        let reader = TieredDictionaryReader::<u32>::open(dir.open_source("dict").unwrap()).unwrap();
        assert_eq!(reader.item_count(), 0);
        assert_eq!(reader.lookup(0).unwrap(), None);
        assert_eq!(reader.create_iterator().unwrap().next().unwrap(), None);
    }

    #[test]
    fn test_blocked_reader() {
        let dir = Arc::new(RAMDirectory::new());
        write_items(dir.as_ref(), 1000);
        let reader = BlockedTieredDictionaryReader::<u32>::open(dir.clone(), "dict").unwrap();
        assert_eq!(reader.item_count(), 1000);
        for i in 0..1000u64 {
            assert_eq!(reader.lookup(i * 3).unwrap(), Some(i + 100));
            assert_eq!(reader.lookup(i * 3 + 1).unwrap(), None);
        }
        assert_eq!(reader.lookup(1 << 40).unwrap(), None);

        let mut iter = reader.create_iterator().unwrap();
        let mut count = 0;
        while let Some((k, v)) = iter.next().unwrap() {
            assert_eq!(k, count * 3);
            assert_eq!(v, count + 100);
            count += 1;
        }
        assert_eq!(count, 1000);
    }
}
