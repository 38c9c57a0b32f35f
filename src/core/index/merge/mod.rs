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

mod output_resource;

pub use self::output_resource::*;

mod segment_term_info;

pub use self::segment_term_info::*;

mod one_doc_merger;

pub use self::one_doc_merger::*;

mod multi_segment_posting_writer;

pub use self::multi_segment_posting_writer::*;

mod posting_merger;

pub use self::posting_merger::*;

mod truncate_index_writer;

pub use self::truncate_index_writer::*;

mod adaptive_bitmap_writer;

pub use self::adaptive_bitmap_writer::*;

mod term_extender;

pub use self::term_extender::*;

mod index_merger;

pub use self::index_merger::*;
