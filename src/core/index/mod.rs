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

mod config;

pub use self::config::*;

mod reclaim_map;

pub use self::reclaim_map::*;

mod segment_data;

pub use self::segment_data::*;

mod index_data_writer;

pub use self::index_data_writer::*;

mod segment_writer;

pub use self::segment_writer::*;

mod segment_reader;

pub use self::segment_reader::*;

pub mod merge;
