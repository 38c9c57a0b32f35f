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

//! Term dictionaries mapping a term key to its dictionary value.
//!
//! Two on-disk layouts share one trailer convention, the last eight bytes
//! hold a u32 count followed by `DICTIONARY_MAGIC_NUMBER`:
//!
//! * tiered: `[records (key, value)][block index keys][block count][magic]`
//! * hash: `[records (key, next, value)][buckets][bucket count][magic]`

mod tiered;

pub use self::tiered::*;

mod hash;

pub use self::hash::*;

mod iterator;

pub use self::iterator::*;

use crate::core::codec::{DictKeyType, IndexFormatOption};
use crate::core::store::directory::Directory;
use crate::core::store::io::{DataOutput, IndexOutput, ReadOnlySource};
use crate::core::util::{DictKey, DictValue};
use crate::error::ErrorKind::{FileIO, IllegalArgument};
use crate::error::Result;

use byteorder::{ByteOrder, LittleEndian};
use num_traits::{NumCast, PrimInt, Unsigned};

use std::fmt::Debug;

pub const DICTIONARY_MAGIC_NUMBER: u32 = 0x9876_5432;
pub const DICTIONARY_TRAILER_SIZE: usize = 8;
/// Records per block of a tiered dictionary.
pub const ITEM_COUNT_PER_BLOCK: usize = 128;

/// Fixed width unsigned integer a dictionary stores its keys as.
pub trait DictionaryKey: PrimInt + Unsigned + Debug + Send + Sync + 'static {
    const WIDTH: usize;

    fn read_le(bytes: &[u8]) -> Self;

    fn write_to<O: DataOutput + ?Sized>(self, output: &mut O) -> Result<()>;

    fn to_dict_key(self) -> DictKey;

    /// Narrows `key`, failing when it does not fit the width.
    fn from_dict_key(key: DictKey) -> Result<Self> {
        match <Self as NumCast>::from(key) {
            Some(k) => Ok(k),
            None => bail!(IllegalArgument(format!(
                "key {} does not fit a {} byte dictionary key",
                key,
                Self::WIDTH
            ))),
        }
    }
}

impl DictionaryKey for u8 {
    const WIDTH: usize = 1;

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write_to<O: DataOutput + ?Sized>(self, output: &mut O) -> Result<()> {
        output.write_byte(self)
    }

    fn to_dict_key(self) -> DictKey {
        <DictKey as From<u8>>::from(self)
    }
}

impl DictionaryKey for u16 {
    const WIDTH: usize = 2;

    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_u16(bytes)
    }

    fn write_to<O: DataOutput + ?Sized>(self, output: &mut O) -> Result<()> {
        output.write_short(self)
    }

    fn to_dict_key(self) -> DictKey {
        <DictKey as From<u16>>::from(self)
    }
}

impl DictionaryKey for u32 {
    const WIDTH: usize = 4;

    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_u32(bytes)
    }

    fn write_to<O: DataOutput + ?Sized>(self, output: &mut O) -> Result<()> {
        output.write_int(self)
    }

    fn to_dict_key(self) -> DictKey {
        <DictKey as From<u32>>::from(self)
    }
}

impl DictionaryKey for u64 {
    const WIDTH: usize = 8;

    fn read_le(bytes: &[u8]) -> Self {
        LittleEndian::read_u64(bytes)
    }

    fn write_to<O: DataOutput + ?Sized>(self, output: &mut O) -> Result<()> {
        output.write_long(self)
    }

    fn to_dict_key(self) -> DictKey {
        self
    }
}

/// Write side of a dictionary, keys must be added in strictly increasing
/// order.
pub trait DictionaryWriter: Send {
    fn add_item(&mut self, key: DictKey, value: DictValue) -> Result<()>;

    fn item_count(&self) -> usize;

    /// Writes the index part and trailer, then closes the output.
    fn close(&mut self) -> Result<()>;
}

pub trait DictionaryReader: Send + Sync {
    fn lookup(&self, key: DictKey) -> Result<Option<DictValue>>;

    fn item_count(&self) -> usize;

    fn create_iterator(&self) -> Result<Box<dyn DictionaryIterator>>;
}

/// Iterates the records of a dictionary in file order.
pub trait DictionaryIterator: Send {
    fn next(&mut self) -> Result<Option<(DictKey, DictValue)>>;
}

/// Where records and their parts sit inside a dictionary file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DictionaryLayout {
    pub key_width: usize,
    pub record_size: usize,
    pub value_offset: usize,
    pub index_entry_size: usize,
    pub item_count: usize,
    pub index_count: usize,
}

impl DictionaryLayout {
    pub fn tiered(key_width: usize) -> Self {
        DictionaryLayout {
            key_width,
            record_size: key_width + 8,
            value_offset: key_width,
            index_entry_size: key_width,
            item_count: 0,
            index_count: 0,
        }
    }

    pub fn hash(key_width: usize) -> Self {
        DictionaryLayout {
            key_width,
            record_size: key_width + 12,
            value_offset: key_width + 4,
            index_entry_size: 4,
            item_count: 0,
            index_count: 0,
        }
    }

    pub fn records_len(&self) -> usize {
        self.item_count * self.record_size
    }

    /// Validates the trailer of a `file_len` bytes dictionary, `trailer` is
    /// its last eight bytes.
    pub fn parse(mut self, name: &str, file_len: usize, trailer: &[u8]) -> Result<Self> {
        if file_len < DICTIONARY_TRAILER_SIZE || trailer.len() < DICTIONARY_TRAILER_SIZE {
            bail!(FileIO(format!(
                "dictionary {} is too short: {} bytes",
                name, file_len
            )));
        }
        let index_count = LittleEndian::read_u32(&trailer[0..4]) as usize;
        let magic = LittleEndian::read_u32(&trailer[4..8]);
        if magic != DICTIONARY_MAGIC_NUMBER {
            bail!(FileIO(format!(
                "dictionary {} has bad magic number {:#x}",
                name, magic
            )));
        }
        let index_len = index_count * self.index_entry_size;
        if index_len + DICTIONARY_TRAILER_SIZE > file_len {
            bail!(FileIO(format!(
                "dictionary {} is truncated, index of {} entries in {} bytes",
                name, index_count, file_len
            )));
        }
        let records_len = file_len - DICTIONARY_TRAILER_SIZE - index_len;
        if records_len % self.record_size != 0 {
            bail!(FileIO(format!(
                "dictionary {} has a partial record: {} bytes of records",
                name, records_len
            )));
        }
        self.item_count = records_len / self.record_size;
        self.index_count = index_count;
        Ok(self)
    }
}

/// Picks the dictionary writer for `format`. `item_count`, when known,
/// lets a hash dictionary write records straight to `output`.
pub fn create_dictionary_writer(
    format: &IndexFormatOption,
    output: Box<dyn IndexOutput>,
    item_count: Option<usize>,
) -> Box<dyn DictionaryWriter> {
    macro_rules! writer {
        ($key:ty) => {
            if format.hash_typed_dictionary {
                Box::new(HashDictionaryWriter::<$key>::new(output, item_count))
                    as Box<dyn DictionaryWriter>
            } else {
                Box::new(TieredDictionaryWriter::<$key>::new(output))
            }
        };
    }
    match format.dict_key_type {
        DictKeyType::U8 => writer!(u8),
        DictKeyType::U16 => writer!(u16),
        DictKeyType::U32 => writer!(u32),
        DictKeyType::U64 => writer!(u64),
    }
}

/// Opens an integrated reader over the whole dictionary file.
pub fn open_dictionary_reader(
    format: &IndexFormatOption,
    source: ReadOnlySource,
) -> Result<Box<dyn DictionaryReader>> {
    macro_rules! reader {
        ($key:ty) => {
            if format.hash_typed_dictionary {
                Box::new(HashDictionaryReader::<$key>::open(source)?) as Box<dyn DictionaryReader>
            } else {
                Box::new(TieredDictionaryReader::<$key>::open(source)?)
            }
        };
    }
    let reader = match format.dict_key_type {
        DictKeyType::U8 => reader!(u8),
        DictKeyType::U16 => reader!(u16),
        DictKeyType::U32 => reader!(u32),
        DictKeyType::U64 => reader!(u64),
    };
    Ok(reader)
}

/// Opens a streaming iterator over `name`, the file is never loaded as a
/// whole.
pub fn open_disk_dictionary_iterator(
    format: &IndexFormatOption,
    directory: &dyn Directory,
    name: &str,
) -> Result<Box<dyn DictionaryIterator>> {
    let input = directory.open_input(name)?;
    let width = format.dict_key_type.width();
    let layout = if format.hash_typed_dictionary {
        DictionaryLayout::hash(width)
    } else {
        DictionaryLayout::tiered(width)
    };
    let iter: Box<dyn DictionaryIterator> = match format.dict_key_type {
        DictKeyType::U8 => Box::new(DiskDictionaryIterator::<u8>::open(input, layout)?),
        DictKeyType::U16 => Box::new(DiskDictionaryIterator::<u16>::open(input, layout)?),
        DictKeyType::U32 => Box::new(DiskDictionaryIterator::<u32>::open(input, layout)?),
        DictKeyType::U64 => Box::new(DiskDictionaryIterator::<u64>::open(input, layout)?),
    };
    Ok(iter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::PostingFormatOption;
    use crate::core::store::directory::RAMDirectory;

    use rand::{thread_rng, Rng};

    fn random_keys(count: usize, max: DictKey) -> Vec<DictKey> {
        let mut rng = thread_rng();
        let mut keys: Vec<DictKey> = (0..count * 2).map(|_| rng.gen_range(0..max)).collect();
        keys.sort();
        keys.dedup();
        keys.truncate(count);
        keys
    }

    fn write_dictionary(
        dir: &RAMDirectory,
        format: &IndexFormatOption,
        items: &[(DictKey, DictValue)],
        known_count: bool,
    ) {
        let output = dir.create_output("dictionary").unwrap();
        let count = if known_count { Some(items.len()) } else { None };
        let mut writer = create_dictionary_writer(format, output, count);
        for &(k, v) in items {
            writer.add_item(k, v).unwrap();
        }
        assert_eq!(writer.item_count(), items.len());
        writer.close().unwrap();
    }

    fn check_round_trip(format: &IndexFormatOption, count: usize, known_count: bool) {
        let max: DictKey = match format.dict_key_type.width() {
            8 => 1 << 40,
            width => 1 << (8 * width),
        };
        let keys = random_keys(count, max);
        let items: Vec<(DictKey, DictValue)> =
            keys.iter().map(|&k| (k, k.wrapping_mul(31) + 7)).collect();

        let dir = RAMDirectory::new();
        write_dictionary(&dir, format, &items, known_count);

        let reader =
            open_dictionary_reader(format, dir.open_source("dictionary").unwrap()).unwrap();
        assert_eq!(reader.item_count(), items.len());
        for &(k, v) in &items {
            assert_eq!(reader.lookup(k).unwrap(), Some(v), "key {}", k);
        }
        if let Some(&(last, _)) = items.last() {
            if last + 1 < max {
                assert_eq!(reader.lookup(last + 1).unwrap(), None);
            }
        }

        let mut iter = reader.create_iterator().unwrap();
        let mut disk_iter = open_disk_dictionary_iterator(format, &dir, "dictionary").unwrap();
        for &(k, v) in &items {
            assert_eq!(iter.next().unwrap(), Some((k, v)));
            assert_eq!(disk_iter.next().unwrap(), Some((k, v)));
        }
        assert_eq!(iter.next().unwrap(), None);
        assert_eq!(disk_iter.next().unwrap(), None);
    }

    #[test]
    fn test_dictionary_round_trip() {
        let sizes = [0, 1, 127, 128, 129, 256 * 128 - 1, 256 * 128, 256 * 128 + 1];
        for &hash in &[false, true] {
            for &key_type in &[DictKeyType::U32, DictKeyType::U64] {
                let format = IndexFormatOption::new(PostingFormatOption::default(), key_type, hash);
                for &size in &sizes {
                    check_round_trip(&format, size, false);
                }
            }
        }
        let format = IndexFormatOption::new(PostingFormatOption::default(), DictKeyType::U64, true);
        for &size in &sizes {
            check_round_trip(&format, size, true);
        }
    }

    #[test]
    fn test_small_key_width() {
        let format =
            IndexFormatOption::new(PostingFormatOption::default(), DictKeyType::U16, false);
        check_round_trip(&format, 300, false);

        let dir = RAMDirectory::new();
        let output = dir.create_output("dictionary").unwrap();
        let mut writer = create_dictionary_writer(&format, output, None);
        assert!(writer.add_item(1 << 16, 0).is_err());

        let format = IndexFormatOption::new(PostingFormatOption::default(), DictKeyType::U32, true);
        check_round_trip(&format, 1000, false);
        let output = dir.create_output("wide").unwrap();
        let mut writer = create_dictionary_writer(&format, output, None);
        writer.add_item((1 << 32) - 1, 0).unwrap();
        assert!(writer.add_item(1 << 32, 0).is_err());
    }

    #[test]
    fn test_out_of_order_keys_rejected() {
        for &hash in &[false, true] {
            let format =
                IndexFormatOption::new(PostingFormatOption::default(), DictKeyType::U64, hash);
            let dir = RAMDirectory::new();
            let output = dir.create_output("dictionary").unwrap();
            let mut writer = create_dictionary_writer(&format, output, None);
            writer.add_item(10, 1).unwrap();
            assert!(writer.add_item(10, 2).is_err());
            assert!(writer.add_item(3, 2).is_err());
            writer.add_item(11, 2).unwrap();
            assert_eq!(writer.item_count(), 2);
        }
    }

    #[test]
    fn test_corrupted_dictionary() {
        let format = IndexFormatOption::default();
        let dir = RAMDirectory::new();
        write_dictionary(&dir, &format, &[(1, 1), (2, 2)], false);
        let mut bytes = dir.open_source("dictionary").unwrap().as_slice().to_vec();

        let short = ReadOnlySource::from_vec(bytes[..4].to_vec());
        assert!(open_dictionary_reader(&format, short).is_err());

        let truncated = ReadOnlySource::from_vec(bytes[3..].to_vec());
        assert!(open_dictionary_reader(&format, truncated).is_err());

        let len = bytes.len();
        bytes[len - 1] = 0;
        assert!(open_dictionary_reader(&format, ReadOnlySource::from_vec(bytes)).is_err());
    }
}
