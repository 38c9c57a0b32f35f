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

use std::sync::PoisonError;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }
    errors {
        Poisoned {
            description("a thread holding the locked panicked and poisoned the lock")
        }

        /// A bounded encode or decode ran past the caller provided buffer.
        BufferOverflow(desc: String) {
            description(desc)
            display("Buffer overflow: {}", desc)
        }

        /// Programming contract violation, never retried.
        InconsistentState(desc: String) {
            description(desc)
            display("Inconsistent state: {}", desc)
        }

        /// Decoded posting data disagrees with itself.
        IndexCollapsed(desc: String) {
            description(desc)
            display("Index collapsed: {}", desc)
        }

        /// Truncated file or magic number mismatch.
        FileIO(desc: String) {
            description(desc)
            display("File IO error: {}", desc)
        }

        IllegalArgument(desc: String) {
            description(desc)
            display("Illegal argument: {}", desc)
        }

        UnexpectedEOF(errmsg: String) {
            description(errmsg)
            display("Unexpected EOF: {}", errmsg)
        }
    }

    foreign_links {
        IoError(::std::io::Error);
        SerdeJsonError(::serde_json::Error);
    }
}

impl<Guard> From<PoisonError<Guard>> for Error {
    fn from(_: PoisonError<Guard>) -> Error {
        ErrorKind::Poisoned.into()
    }
}
