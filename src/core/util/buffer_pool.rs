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

/// Recycles byte buffers handed out to per-term writers.
///
/// Buffers are given back with `recycle` once a term is dumped, and `reset`
/// drops whatever the pool still retains, so the memory held between terms
/// never exceeds what the largest single term needed.
pub struct BufferPool {
    name: &'static str,
    free: Vec<Vec<u8>>,
    max_retained: usize,
    // bytes currently lent out
    used_bytes: usize,
    peak_bytes: usize,
    allocated: usize,
}

impl BufferPool {
    pub const DEFAULT_MAX_RETAINED: usize = 64;

    pub fn new(name: &'static str) -> Self {
        Self::with_max_retained(name, Self::DEFAULT_MAX_RETAINED)
    }

    pub fn with_max_retained(name: &'static str, max_retained: usize) -> Self {
        BufferPool {
            name,
            free: Vec::new(),
            max_retained,
            used_bytes: 0,
            peak_bytes: 0,
            allocated: 0,
        }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns an empty buffer, reusing a recycled allocation when one is free.
    pub fn acquire(&mut self) -> Vec<u8> {
        match self.free.pop() {
            Some(buf) => buf,
            None => {
                self.allocated += 1;
                Vec::new()
            }
        }
    }

    pub fn recycle(&mut self, mut buf: Vec<u8>) {
        self.used_bytes += buf.capacity();
        if self.used_bytes > self.peak_bytes {
            self.peak_bytes = self.used_bytes;
        }
        if self.free.len() < self.max_retained {
            buf.clear();
            self.free.push(buf);
        }
    }

    /// Releases every retained buffer, called after each term.
    pub fn reset(&mut self) {
        self.free.clear();
        self.used_bytes = 0;
    }

    pub fn retained_bytes(&self) -> usize {
        self.free.iter().map(|b| b.capacity()).sum()
    }

    /// Largest number of bytes returned between two resets.
    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes
    }

    pub fn allocated_buffers(&self) -> usize {
        self.allocated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recycle_and_reset() {
        let mut pool = BufferPool::new("test");
        let mut buf = pool.acquire();
        buf.extend_from_slice(&[1u8; 100]);
        let cap = buf.capacity();
        pool.recycle(buf);
        assert_eq!(pool.retained_bytes(), cap);

        let again = pool.acquire();
        assert!(again.is_empty());
        assert_eq!(again.capacity(), cap);
        assert_eq!(pool.allocated_buffers(), 1);
        pool.recycle(again);

        pool.reset();
        assert_eq!(pool.retained_bytes(), 0);
        assert!(pool.peak_bytes() >= cap);
        let fresh = pool.acquire();
        assert_eq!(fresh.capacity(), 0);
        assert_eq!(pool.allocated_buffers(), 2);
    }

    #[test]
    fn test_max_retained() {
        let mut pool = BufferPool::with_max_retained("test", 1);
        pool.recycle(vec![0u8; 10]);
        pool.recycle(vec![0u8; 10]);
        assert_eq!(pool.retained_bytes(), 10);
    }
}
