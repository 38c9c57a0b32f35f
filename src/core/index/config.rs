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

use crate::core::codec::IndexFormatOption;
use crate::core::util::DictKey;
use crate::error::ErrorKind::IllegalArgument;
use crate::error::Result;

use std::collections::{BTreeSet, HashSet};

/// Whether a high frequency term keeps its normal posting next to the
/// bitmap one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HighFrequencyTermPostingType {
    Both,
    BitmapOnly,
}

impl Default for HighFrequencyTermPostingType {
    fn default() -> Self {
        HighFrequencyTermPostingType::Both
    }
}

/// Terms that get a bitmap posting at build time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighFrequencyConfig {
    pub vocabulary: BTreeSet<DictKey>,
    pub posting_type: HighFrequencyTermPostingType,
}

impl HighFrequencyConfig {
    pub fn new<I: IntoIterator<Item = DictKey>>(
        vocabulary: I,
        posting_type: HighFrequencyTermPostingType,
    ) -> Self {
        HighFrequencyConfig {
            vocabulary: vocabulary.into_iter().collect(),
            posting_type,
        }
    }

    pub fn contains(&self, key: DictKey) -> bool {
        self.vocabulary.contains(&key)
    }

    pub fn is_bitmap_only(&self) -> bool {
        self.posting_type == HighFrequencyTermPostingType::BitmapOnly
    }
}

/// How a truncate index picks the documents it keeps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TruncateSortRule {
    /// Largest doc payload first, ties by doc id.
    DocPayloadDesc,
    /// Smallest doc ids first.
    DocIdAsc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruncateConfig {
    pub name: String,
    /// Terms with a doc frequency above this get truncated.
    pub df_threshold: u32,
    /// Documents kept per truncated term.
    pub limit: usize,
    pub sort_rule: TruncateSortRule,
}

impl TruncateConfig {
    pub fn new(name: &str, df_threshold: u32, limit: usize, sort_rule: TruncateSortRule) -> Self {
        TruncateConfig {
            name: name.to_string(),
            df_threshold,
            limit,
            sort_rule,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptiveBitmapRule {
    /// Terms with at least this many documents.
    DocFrequency(u32),
    /// Terms found in at least this percentage of the merged documents.
    Percent(u32),
}

/// Terms promoted to bitmap postings while merging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdaptiveBitmapConfig {
    pub rule: AdaptiveBitmapRule,
    #[serde(default)]
    pub posting_type: HighFrequencyTermPostingType,
}

impl AdaptiveBitmapConfig {
    pub fn new(rule: AdaptiveBitmapRule, posting_type: HighFrequencyTermPostingType) -> Self {
        AdaptiveBitmapConfig { rule, posting_type }
    }

    pub fn is_bitmap_only(&self) -> bool {
        self.posting_type == HighFrequencyTermPostingType::BitmapOnly
    }
}

/// Schema of one inverted index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub index_name: String,
    #[serde(default)]
    pub format: IndexFormatOption,
    #[serde(default)]
    pub high_frequency: Option<HighFrequencyConfig>,
    #[serde(default)]
    pub truncate: Vec<TruncateConfig>,
    #[serde(default)]
    pub adaptive_bitmap: Option<AdaptiveBitmapConfig>,
}

impl IndexConfig {
    pub fn new(index_name: &str, format: IndexFormatOption) -> Self {
        IndexConfig {
            index_name: index_name.to_string(),
            format,
            high_frequency: None,
            truncate: Vec::new(),
            adaptive_bitmap: None,
        }
    }

    pub fn from_json(json: &str) -> Result<IndexConfig> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        if self.index_name.is_empty() {
            bail!(IllegalArgument("index name is empty".into()));
        }
        self.format.posting_format_option.check()?;
        let mut names = HashSet::new();
        for truncate in &self.truncate {
            if truncate.limit == 0 {
                bail!(IllegalArgument(format!(
                    "truncate index {} keeps no document",
                    truncate.name
                )));
            }
            if truncate.name.is_empty() || !names.insert(truncate.name.as_str()) {
                bail!(IllegalArgument(format!(
                    "bad or duplicated truncate name '{}'",
                    truncate.name
                )));
            }
        }
        if let Some(AdaptiveBitmapConfig {
            rule: AdaptiveBitmapRule::Percent(p),
            ..
        }) = self.adaptive_bitmap
        {
            if p > 100 {
                bail!(IllegalArgument(format!("adaptive bitmap percent {}", p)));
            }
        }
        Ok(())
    }

    pub fn is_high_frequency_term(&self, key: DictKey) -> bool {
        self.high_frequency
            .as_ref()
            .map_or(false, |hf| hf.contains(key))
    }

    /// Name of the sibling index holding the `truncate_name` truncated lists.
    pub fn truncate_index_name(&self, truncate_name: &str) -> String {
        format!("{}_{}", self.index_name, truncate_name)
    }
}

/// Knobs of one merge run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergerConfig {
    /// Count the distinct keys of all sources first, so that hash
    /// dictionaries are written with a known size.
    pub preload_dict_key_count: bool,
    pub io_buffer_size: usize,
}

impl Default for MergerConfig {
    fn default() -> Self {
        MergerConfig {
            preload_dict_key_count: false,
            io_buffer_size: 8192,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::DictKeyType;

    #[test]
    fn test_index_config_from_json() {
        let json = r#"{
            "index_name": "title",
            "format": {
                "posting_format_option": {"has_doc_payload": true},
                "dict_key_type": "U32",
                "hash_typed_dictionary": true
            },
            "high_frequency": {"vocabulary": [3, 1], "posting_type": "BitmapOnly"},
            "truncate": [
                {"name": "top", "df_threshold": 10, "limit": 5, "sort_rule": "DocPayloadDesc"}
            ],
            "adaptive_bitmap": {"rule": {"Percent": 50}}
        }"#;
        let config = IndexConfig::from_json(json).unwrap();
        assert_eq!(config.format.dict_key_type, DictKeyType::U32);
        assert!(config.format.posting_format_option.has_doc_payload);
        assert!(config.format.posting_format_option.has_term_frequency);
        assert!(config.is_high_frequency_term(3));
        assert!(!config.is_high_frequency_term(2));
        assert!(config.high_frequency.as_ref().unwrap().is_bitmap_only());
        assert_eq!(config.truncate_index_name("top"), "title_top");
        let adaptive = config.adaptive_bitmap.unwrap();
        assert_eq!(adaptive.rule, AdaptiveBitmapRule::Percent(50));
        assert!(!adaptive.is_bitmap_only());
    }

    #[test]
    fn test_bad_index_config() {
        let mut config = IndexConfig::new("body", IndexFormatOption::default());
        config.check().unwrap();
        config.truncate.push(TruncateConfig::new("t", 1, 1, TruncateSortRule::DocIdAsc));
        config.truncate.push(TruncateConfig::new("t", 1, 1, TruncateSortRule::DocIdAsc));
        assert!(config.check().is_err());

        let config = IndexConfig::new("", IndexFormatOption::default());
        assert!(config.check().is_err());

        let json = r#"{"index_name": "a", "adaptive_bitmap": {"rule": {"Percent": 101}}}"#;
        assert!(IndexConfig::from_json(json).is_err());
    }
}
