// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_HYPERLINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?|ftp|file)://[-A-Za-z0-9+&@#/%?=~_|!:,.;]+[-A-Za-z0-9+&@#/%=~_|]$")
        .expect("static regex")
});
static RE_PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\W]*$").expect("static regex"));
static RE_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[一-龥A-Za-z0-9]+$").expect("static regex"));
static RE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([\$\x{FFE5}]?)(-?)(\d+)(\.\d+)?([一-龥%]?)$").expect("static regex")
});
static RE_NUM_NON_POSITIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((-\d+(\.\d+)?)|(0+(\.0+)?))$").expect("static regex"));
static RE_NUM_ZERO_TO_ONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0(\.\d+)?$").expect("static regex"));
static RE_NUM_AT_LEAST_ONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(([1-9]\d+)|[1-9])(\.\d*)?$").expect("static regex"));
static RE_CHINESE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[一-龥]+$").expect("static regex"));
static RE_ENGLISH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]+$").expect("static regex"));
static RE_ENG_UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]+$").expect("static regex"));
static RE_ENG_LOWER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]+$").expect("static regex"));

/// 单元格内容类型
///
/// 固定的层次类型树：
/// 根 → {超链接, 图片, 标点, 其他, 字符和数字}
/// 字符和数字 → {数字 → {≤0, 0–1, ≥1}, 字符 → {中文, 英文 → {大写, 小写, 混合}}}
/// `Number`/`Character`/`English` 同时充当可赋值的回退类型和树的内部结点。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Hyperlink,
    Image,
    Punctuation,
    Other,
    AlphaNumeric,
    Number,
    NumberNonPositive,
    NumberZeroToOne,
    NumberAtLeastOne,
    Character,
    Chinese,
    English,
    EnglishUpper,
    EnglishLower,
    EnglishMixed,
}

impl ContentType {
    /// 单级联分类，首个命中即定型：
    /// 图片 > 超链接 > 标点 > 数字区间/字符类别 > 其他
    pub fn classify(content: &str, has_image: bool) -> ContentType {
        if has_image {
            return ContentType::Image;
        }
        let content = content.trim();
        if RE_HYPERLINK.is_match(content) {
            return ContentType::Hyperlink;
        }
        if RE_PUNCTUATION.is_match(content) {
            return ContentType::Punctuation;
        }
        if RE_ALNUM.is_match(content) {
            if RE_NUMBER.is_match(content) {
                if RE_NUM_NON_POSITIVE.is_match(content) {
                    return ContentType::NumberNonPositive;
                }
                if RE_NUM_ZERO_TO_ONE.is_match(content) {
                    return ContentType::NumberZeroToOne;
                }
                if RE_NUM_AT_LEAST_ONE.is_match(content) {
                    return ContentType::NumberAtLeastOne;
                }
                return ContentType::Number;
            }
            if RE_CHINESE.is_match(content) {
                return ContentType::Chinese;
            }
            if RE_ENGLISH.is_match(content) {
                if RE_ENG_UPPER.is_match(content) {
                    return ContentType::EnglishUpper;
                }
                if RE_ENG_LOWER.is_match(content) {
                    return ContentType::EnglishLower;
                }
                return ContentType::EnglishMixed;
            }
            return ContentType::Character;
        }
        ContentType::Other
    }

    /// 树中的父结点，根结点的孩子返回None
    fn parent(self) -> Option<ContentType> {
        use ContentType::*;
        match self {
            Hyperlink | Image | Punctuation | Other | AlphaNumeric => None,
            Number | Character => Some(AlphaNumeric),
            NumberNonPositive | NumberZeroToOne | NumberAtLeastOne => Some(Number),
            Chinese | English => Some(Character),
            EnglishUpper | EnglishLower | EnglishMixed => Some(English),
        }
    }

    fn depth(self) -> u32 {
        match self.parent() {
            Some(p) => p.depth() + 1,
            None => 1,
        }
    }

    /// 两个类型在树上的差异距离：
    /// 先把较深者提升到同层（每步+1），再同步上移到汇合（每层+2）
    pub fn distance(self, other: ContentType) -> u32 {
        if self == other {
            return 0;
        }
        let mut a = self;
        let mut b = other;
        let mut distance = 0;
        let mut depth_a = a.depth();
        let mut depth_b = b.depth();
        while depth_a > depth_b {
            match a.parent() {
                Some(p) => a = p,
                None => break,
            }
            distance += 1;
            depth_a -= 1;
        }
        while depth_b > depth_a {
            match b.parent() {
                Some(p) => b = p,
                None => break,
            }
            distance += 1;
            depth_b -= 1;
        }
        while a != b {
            match (a.parent(), b.parent()) {
                (Some(pa), Some(pb)) => {
                    a = pa;
                    b = pb;
                    distance += 2;
                }
                // 已到根层仍不同：双方都是根的孩子
                _ => {
                    distance += 2;
                    break;
                }
            }
        }
        distance
    }

    /// 是否属于字符类族（属性名通常是字符类）
    pub fn is_character_family(self) -> bool {
        use ContentType::*;
        matches!(
            self,
            Character | Chinese | English | EnglishUpper | EnglishLower | EnglishMixed
        )
    }
}
