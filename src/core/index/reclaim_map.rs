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

use crate::core::util::{DocId, INVALID_DOCID};
use crate::error::ErrorKind::IllegalArgument;
use crate::error::Result;

/// Maps the doc ids of the merged sources to the doc ids of the target
/// segments.
///
/// Old ids are global over the sources (segment base + local id), new ids
/// are global over the targets. Deleted documents map to `INVALID_DOCID`.
#[derive(Clone, Debug)]
pub struct ReclaimMap {
    old_to_new: Vec<DocId>,
    target_base_doc_ids: Vec<DocId>,
    new_doc_count: usize,
}

impl ReclaimMap {
    /// `target_base_doc_ids` holds the first new id of every target segment,
    /// it starts at 0 and never decreases.
    pub fn new(old_to_new: Vec<DocId>, target_base_doc_ids: Vec<DocId>) -> Result<ReclaimMap> {
        let new_doc_count = old_to_new.iter().filter(|&&id| id != INVALID_DOCID).count();
        let mut seen = vec![false; new_doc_count];
        for (old, &new) in old_to_new.iter().enumerate() {
            if new == INVALID_DOCID {
                continue;
            }
            if new < 0 || new as usize >= new_doc_count || seen[new as usize] {
                bail!(IllegalArgument(format!(
                    "doc {} maps to bad or duplicated doc {}",
                    old, new
                )));
            }
            seen[new as usize] = true;
        }
        if target_base_doc_ids.first().map_or(false, |&b| b != 0)
            || target_base_doc_ids.windows(2).any(|w| w[0] > w[1])
            || target_base_doc_ids
                .last()
                .map_or(false, |&b| b as usize > new_doc_count)
        {
            bail!(IllegalArgument(format!(
                "bad target base doc ids {:?} for {} docs",
                target_base_doc_ids, new_doc_count
            )));
        }
        Ok(ReclaimMap {
            old_to_new,
            target_base_doc_ids,
            new_doc_count,
        })
    }

    /// Numbers the surviving documents in source order and splits them as
    /// evenly as possible across `target_segment_count` targets.
    /// `deleted_docs[i]` lists the deleted local ids of source segment `i`.
    pub fn from_deletions(
        segment_doc_counts: &[usize],
        deleted_docs: &[Vec<DocId>],
        target_segment_count: usize,
    ) -> Result<ReclaimMap> {
        if target_segment_count == 0 {
            bail!(IllegalArgument("no target segment".into()));
        }
        let mut old_to_new = Vec::with_capacity(segment_doc_counts.iter().sum());
        let mut next_id: DocId = 0;
        for (i, &count) in segment_doc_counts.iter().enumerate() {
            let mut deleted = vec![false; count];
            if let Some(list) = deleted_docs.get(i) {
                for &d in list {
                    if d < 0 || d as usize >= count {
                        bail!(IllegalArgument(format!(
                            "deleted doc {} outside segment {} of {} docs",
                            d, i, count
                        )));
                    }
                    deleted[d as usize] = true;
                }
            }
            for is_deleted in deleted {
                if is_deleted {
                    old_to_new.push(INVALID_DOCID);
                } else {
                    old_to_new.push(next_id);
                    next_id += 1;
                }
            }
        }
        let live = next_id as usize;
        let per_target = (live + target_segment_count - 1) / target_segment_count;
        let target_base_doc_ids = (0..target_segment_count)
            .map(|i| (i * per_target).min(live) as DocId)
            .collect();
        ReclaimMap::new(old_to_new, target_base_doc_ids)
    }

    pub fn old_doc_count(&self) -> usize {
        self.old_to_new.len()
    }

    pub fn new_doc_count(&self) -> usize {
        self.new_doc_count
    }

    pub fn deleted_doc_count(&self) -> usize {
        self.old_to_new.len() - self.new_doc_count
    }

    pub fn target_segment_count(&self) -> usize {
        self.target_base_doc_ids.len()
    }

    pub fn target_base_doc_id(&self, target: usize) -> DocId {
        self.target_base_doc_ids[target]
    }

    pub fn target_doc_count(&self, target: usize) -> usize {
        let end = self
            .target_base_doc_ids
            .get(target + 1)
            .map_or(self.new_doc_count as DocId, |&b| b);
        (end - self.target_base_doc_ids[target]) as usize
    }

    /// New global id of `old_doc_id`, `INVALID_DOCID` when deleted.
    pub fn get_new_id(&self, old_doc_id: DocId) -> DocId {
        if old_doc_id < 0 {
            return INVALID_DOCID;
        }
        self.old_to_new
            .get(old_doc_id as usize)
            .copied()
            .unwrap_or(INVALID_DOCID)
    }

    /// Target segment index and local id of a new global id.
    pub fn get_local_id(&self, new_doc_id: DocId) -> (usize, DocId) {
        debug_assert!(new_doc_id >= 0 && (new_doc_id as usize) < self.new_doc_count);
        let target = self
            .target_base_doc_ids
            .partition_point(|&base| base <= new_doc_id)
            .saturating_sub(1);
        (target, new_doc_id - self.target_base_doc_ids[target])
    }

    /// Target and local id of a surviving old document.
    pub fn get_new_local_id(&self, old_doc_id: DocId) -> Option<(usize, DocId)> {
        match self.get_new_id(old_doc_id) {
            INVALID_DOCID => None,
            new_id => Some(self.get_local_id(new_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_deletions() {
        // 3 + 2 docs, doc 1 of the first segment deleted
        let map = ReclaimMap::from_deletions(&[3, 2], &[vec![1], vec![]], 1).unwrap();
        assert_eq!(map.old_doc_count(), 5);
        assert_eq!(map.new_doc_count(), 4);
        assert_eq!(map.deleted_doc_count(), 1);
        assert_eq!(map.get_new_id(0), 0);
        assert_eq!(map.get_new_id(1), INVALID_DOCID);
        assert_eq!(map.get_new_id(2), 1);
        assert_eq!(map.get_new_id(4), 3);
        assert_eq!(map.get_new_id(5), INVALID_DOCID);
        assert_eq!(map.get_new_local_id(1), None);
        assert_eq!(map.get_new_local_id(3), Some((0, 2)));
    }

    #[test]
    fn test_split_targets() {
        let map = ReclaimMap::from_deletions(&[5], &[], 2).unwrap();
        assert_eq!(map.target_segment_count(), 2);
        assert_eq!(map.target_base_doc_id(1), 3);
        assert_eq!(map.target_doc_count(0), 3);
        assert_eq!(map.target_doc_count(1), 2);
        assert_eq!(map.get_local_id(2), (0, 2));
        assert_eq!(map.get_local_id(3), (1, 0));
        assert_eq!(map.get_new_local_id(4), Some((1, 1)));
    }

    #[test]
    fn test_bad_maps() {
        assert!(ReclaimMap::new(vec![0, 0], vec![0]).is_err());
        assert!(ReclaimMap::new(vec![0, 2], vec![0]).is_err());
        assert!(ReclaimMap::new(vec![1, 0], vec![1]).is_err());
        assert!(ReclaimMap::new(vec![1, 0], vec![0, 3]).is_err());
        assert!(ReclaimMap::from_deletions(&[2], &[vec![2]], 1).is_err());
        assert!(ReclaimMap::from_deletions(&[2], &[], 0).is_err());

        let reversed = ReclaimMap::new(vec![2, INVALID_DOCID, 1, 0], vec![0]).unwrap();
        assert_eq!(reversed.new_doc_count(), 3);
        assert_eq!(reversed.get_new_id(0), 2);
    }
}
