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
    InMemoryDictionaryIterator, DICTIONARY_MAGIC_NUMBER, DICTIONARY_TRAILER_SIZE,
};
use crate::core::store::io::{DataOutput, IndexOutput, ReadOnlySource};
use crate::core::util::math::next_prime;
use crate::core::util::{DictKey, DictValue};
use crate::error::ErrorKind::{FileIO, IllegalArgument, InconsistentState};
use crate::error::Result;

use byteorder::{ByteOrder, LittleEndian};

/// Terminates a bucket chain.
pub const HASH_CHAIN_END: u32 = u32::MAX;
/// Bucket count used while the final item count is unknown.
pub const DEFAULT_HASH_BUCKET_COUNT: u64 = 1024;
pub const MIN_HASH_LOAD_FACTOR: f64 = 0.2;
pub const MAX_HASH_LOAD_FACTOR: f64 = 1.2;

struct HashRecord<K> {
    key: K,
    next: u32,
    value: DictValue,
}

/// Writes `(key, next, value)` records chained per bucket, followed by the
/// bucket heads.
///
/// Opened with a known item count the records go straight to the output.
/// Otherwise they are buffered and the buckets are rebuilt at close when the
/// load factor ends up outside `[MIN_HASH_LOAD_FACTOR, MAX_HASH_LOAD_FACTOR]`.
pub struct HashDictionaryWriter<K: DictionaryKey> {
    output: Box<dyn IndexOutput>,
    buckets: Vec<u32>,
    // None when writing directly to output
    pending: Option<Vec<HashRecord<K>>>,
    item_count: usize,
    last_key: Option<K>,
    closed: bool,
}

impl<K: DictionaryKey> HashDictionaryWriter<K> {
    pub fn new(output: Box<dyn IndexOutput>, item_count: Option<usize>) -> Self {
        let (bucket_count, pending) = match item_count {
            Some(count) => (next_prime(count as u64), None),
            None => (next_prime(DEFAULT_HASH_BUCKET_COUNT), Some(Vec::new())),
        };
        HashDictionaryWriter {
            output,
            buckets: vec![HASH_CHAIN_END; bucket_count as usize],
            pending,
            item_count: 0,
            last_key: None,
            closed: false,
        }
    }

    fn bucket_of(key: K, bucket_count: usize) -> usize {
        (key.to_dict_key() % bucket_count as u64) as usize
    }

    fn rehash(records: &mut [HashRecord<K>], bucket_count: usize) -> Vec<u32> {
        let mut buckets = vec![HASH_CHAIN_END; bucket_count];
        for (i, record) in records.iter_mut().enumerate() {
            let bucket = Self::bucket_of(record.key, bucket_count);
            record.next = buckets[bucket];
            buckets[bucket] = i as u32;
        }
        buckets
    }

    fn write_record(&mut self, key: K, next: u32, value: DictValue) -> Result<()> {
        key.write_to(self.output.as_mut())?;
        self.output.write_int(next)?;
        self.output.write_long(value)
    }
}

impl<K: DictionaryKey> DictionaryWriter for HashDictionaryWriter<K> {
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
        if self.item_count >= HASH_CHAIN_END as usize {
            bail!(IllegalArgument(format!(
                "hash dictionary {} is full",
                self.output.name()
            )));
        }

        let bucket = Self::bucket_of(k, self.buckets.len());
        let next = self.buckets[bucket];
        self.buckets[bucket] = self.item_count as u32;
        match self.pending.as_mut() {
            Some(records) => records.push(HashRecord {
                key: k,
                next,
                value,
            }),
            None => self.write_record(k, next, value)?,
        }
        self.item_count += 1;
        self.last_key = Some(k);
        Ok(())
    }

    fn item_count(&self) -> usize {
        self.item_count
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if let Some(mut records) = self.pending.take() {
            let load_factor = self.item_count as f64 / self.buckets.len() as f64;
            if load_factor < MIN_HASH_LOAD_FACTOR || load_factor > MAX_HASH_LOAD_FACTOR {
                let bucket_count = next_prime(self.item_count as u64) as usize;
                debug!(
                    "rehash dictionary {} from {} to {} buckets for {} items",
                    self.output.name(),
                    self.buckets.len(),
                    bucket_count,
                    self.item_count
                );
                self.buckets = Self::rehash(&mut records, bucket_count);
            }
            for record in records {
                self.write_record(record.key, record.next, record.value)?;
            }
        } else if self.item_count as u64 > self.buckets.len() as u64 * 2 {
            warn!(
                "hash dictionary {} holds {} items in {} buckets",
                self.output.name(),
                self.item_count,
                self.buckets.len()
            );
        }
        for i in 0..self.buckets.len() {
            let head = self.buckets[i];
            self.output.write_int(head)?;
        }
        self.output.write_int(self.buckets.len() as u32)?;
        self.output.write_int(DICTIONARY_MAGIC_NUMBER)?;
        self.output.close()?;
        self.closed = true;
        Ok(())
    }
}

/// Hash dictionary reader over an in-memory (or mapped) file.
pub struct HashDictionaryReader<K: DictionaryKey> {
    source: ReadOnlySource,
    layout: DictionaryLayout,
    _key: ::std::marker::PhantomData<K>,
}

impl<K: DictionaryKey> HashDictionaryReader<K> {
    pub fn open(source: ReadOnlySource) -> Result<Self> {
        let bytes = source.as_slice();
        let len = bytes.len();
        let trailer = &bytes[len.saturating_sub(DICTIONARY_TRAILER_SIZE)..];
        let layout = DictionaryLayout::hash(K::WIDTH).parse("hash", len, trailer)?;
        if layout.index_count == 0 && layout.item_count > 0 {
            bail!(FileIO(format!(
                "hash dictionary holds {} items without buckets",
                layout.item_count
            )));
        }
        Ok(HashDictionaryReader {
            source,
            layout,
            _key: ::std::marker::PhantomData,
        })
    }

    fn bucket_head(&self, bucket: usize) -> u32 {
        let offset = self.layout.records_len() + bucket * 4;
        LittleEndian::read_u32(&self.source.as_slice()[offset..])
    }
}

impl<K: DictionaryKey> DictionaryReader for HashDictionaryReader<K> {
    fn lookup(&self, key: DictKey) -> Result<Option<DictValue>> {
        let k = match K::from_dict_key(key) {
            Ok(k) => k,
            Err(_) => return Ok(None),
        };
        let bucket_count = self.layout.index_count;
        if bucket_count == 0 {
            return Ok(None);
        }
        let bytes = self.source.as_slice();
        let record_size = self.layout.record_size;
        let mut cursor = self.bucket_head((key % bucket_count as u64) as usize);
        let mut steps = 0;
        while cursor != HASH_CHAIN_END {
            let index = cursor as usize;
            if index >= self.layout.item_count || steps > self.layout.item_count {
                bail!(FileIO(format!(
                    "broken hash chain at record {} of {}",
                    index, self.layout.item_count
                )));
            }
            let record = &bytes[index * record_size..(index + 1) * record_size];
            if K::read_le(record) == k {
                return Ok(Some(LittleEndian::read_u64(
                    &record[self.layout.value_offset..],
                )));
            }
            cursor = LittleEndian::read_u32(&record[K::WIDTH..]);
            steps += 1;
        }
        Ok(None)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::directory::{Directory, RAMDirectory};

    fn bucket_count_of(dir: &RAMDirectory) -> u32 {
        let bytes = dir.open_source("dict").unwrap().as_slice().to_vec();
        LittleEndian::read_u32(&bytes[bytes.len() - 8..])
    }

    #[test]
    fn test_direct_write_bucket_count() {
        let dir = RAMDirectory::new();
        let mut writer =
            HashDictionaryWriter::<u64>::new(dir.create_output("dict").unwrap(), Some(10));
        for i in 0..10u64 {
            writer.add_item(i * 11, i).unwrap();
        }
        writer.close().unwrap();
        assert_eq!(bucket_count_of(&dir), 11);
        assert_eq!(dir.file_length("dict").unwrap(), 10 * 20 + 11 * 4 + 8);

        let reader = HashDictionaryReader::<u64>::open(dir.open_source("dict").unwrap()).unwrap();
        // all keys collide in bucket 0
        for i in 0..10u64 {
            assert_eq!(reader.lookup(i * 11).unwrap(), Some(i));
        }
        assert_eq!(reader.lookup(1).unwrap(), None);
    }

    #[test]
    fn test_buffered_write_rehash() {
        let dir = RAMDirectory::new();
        let mut writer = HashDictionaryWriter::<u32>::new(dir.create_output("dict").unwrap(), None);
        for i in 0..5000u64 {
            writer.add_item(i * 2, i).unwrap();
        }
        writer.close().unwrap();
        assert_eq!(bucket_count_of(&dir), next_prime(5000) as u32);

        let dir = RAMDirectory::new();
        let mut writer = HashDictionaryWriter::<u32>::new(dir.create_output("dict").unwrap(), None);
        for i in 0..1000u64 {
            writer.add_item(i, i).unwrap();
        }
        writer.close().unwrap();
        // load factor inside bounds, initial buckets kept
        assert_eq!(bucket_count_of(&dir), next_prime(DEFAULT_HASH_BUCKET_COUNT) as u32);

        let reader = HashDictionaryReader::<u32>::open(dir.open_source("dict").unwrap()).unwrap();
        for i in 0..1000u64 {
            assert_eq!(reader.lookup(i).unwrap(), Some(i));
        }
    }

    #[test]
    fn test_broken_chain() {
        let dir = RAMDirectory::new();
        let mut writer =
            HashDictionaryWriter::<u64>::new(dir.create_output("dict").unwrap(), Some(2));
        writer.add_item(5, 1).unwrap();
        writer.close().unwrap();
        let mut bytes = dir.open_source("dict").unwrap().as_slice().to_vec();
        // bucket 1 (5 % 2) points past the records
        LittleEndian::write_u32(&mut bytes[20 + 4..], 7);
        let reader = HashDictionaryReader::<u64>::open(ReadOnlySource::from_vec(bytes)).unwrap();
        assert!(reader.lookup(5).is_err());
    }
}
