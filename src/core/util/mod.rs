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

pub type DocId = i32;

/// Marks a deleted document in a reclaim map and an exhausted posting.
pub const INVALID_DOCID: DocId = -1;

pub type DictKey = u64;
pub type DictValue = u64;

pub mod buffer_pool;
pub mod math;
pub mod varint;

pub use self::buffer_pool::BufferPool;
