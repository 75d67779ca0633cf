// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;

use jieba_rs::Jieba;
use once_cell::sync::Lazy;

/// 名词类词性标记集
///
/// 属性名通常落在这些词性之内
static NOMINAL_TAGS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "n", "nb", "nba", "nbc", "nbp", "nf", "ng", "nh", "nhd", "nhm", "ni", "nic", "nis",
        "nit", "nl", "nm", "nmc", "nn", "nnd", "nnt", "nr", "nr1", "nr2", "nrf", "nrfg", "nrj",
        "nrt", "ns", "nsf", "nt", "ntc", "ntcb", "ntcf", "ntch", "nth", "nto", "nts", "ntu",
        "nx", "nz",
    ]
    .into_iter()
    .collect()
});

/// 带词性标记的切分结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedToken {
    pub word: String,
    pub tag: String,
}

/// 分词器接口
///
/// 人名识别和名词判定都建立在该接口之上；
/// 切分与标注的正确性由具体实现负责，本系统不做保证
pub trait Segmenter: Send + Sync {
    /// 切分文本并标注词性
    fn tag(&self, text: &str) -> Vec<TaggedToken>;

    /// 文本是否恰好切分为一个人名词
    fn is_single_person_name(&self, text: &str) -> bool {
        let tokens = self.tag(text);
        tokens.len() == 1 && tokens[0].tag.starts_with("nr")
    }

    /// 文本是否含有名词类词
    fn has_nominal_token(&self, text: &str) -> bool {
        self.tag(text)
            .iter()
            .any(|t| NOMINAL_TAGS.contains(t.tag.as_str()))
    }

    /// 词性序列串，供方向判别的词类特征使用
    fn pos_sequence(&self, text: &str) -> String {
        self.tag(text)
            .iter()
            .map(|t| t.tag.as_str())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// 基于jieba的分词器实现
pub struct JiebaSegmenter {
    jieba: Jieba,
}

impl JiebaSegmenter {
    pub fn new() -> Self {
        Self { jieba: Jieba::new() }
    }
}

impl Default for JiebaSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for JiebaSegmenter {
    fn tag(&self, text: &str) -> Vec<TaggedToken> {
        self.jieba
            .tag(text, true)
            .into_iter()
            .map(|t| TaggedToken {
                word: t.word.to_string(),
                tag: t.tag.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// 确定性的测试桩：以词表驱动，避免依赖jieba词典的细节
    pub struct StubSegmenter {
        names: HashSet<String>,
        nouns: HashSet<String>,
    }

    impl StubSegmenter {
        pub fn new(names: &[&str], nouns: &[&str]) -> Self {
            Self {
                names: names.iter().map(|s| s.to_string()).collect(),
                nouns: nouns.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl Segmenter for StubSegmenter {
        fn tag(&self, text: &str) -> Vec<TaggedToken> {
            let text = text.trim();
            if text.is_empty() {
                return Vec::new();
            }
            if self.names.contains(text) {
                return vec![TaggedToken {
                    word: text.to_string(),
                    tag: "nr".to_string(),
                }];
            }
            if self.nouns.contains(text) {
                return vec![TaggedToken {
                    word: text.to_string(),
                    tag: "n".to_string(),
                }];
            }
            // 未知文本按字符拆分为未定词
            text.chars()
                .map(|c| TaggedToken {
                    word: c.to_string(),
                    tag: "x".to_string(),
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StubSegmenter;
    use super::*;

    #[test]
    fn stub_recognizes_configured_names() {
        let seg = StubSegmenter::new(&["张三"], &["职业"]);
        assert!(seg.is_single_person_name("张三"));
        assert!(!seg.is_single_person_name("张三李四和别人"));
        assert!(seg.has_nominal_token("职业"));
        assert!(!seg.has_nominal_token("!!"));
    }

    #[test]
    fn jieba_tags_common_noun() {
        let seg = JiebaSegmenter::new();
        assert!(seg.has_nominal_token("职业"));
    }
}
