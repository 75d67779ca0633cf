// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 人名与其链接
///
/// 同一实体的两次提及通过链接判定：链接相等，或一方是另一方的子串。
/// 子串规则使得 `/item/a` 与 `/item/a/123` 可以融合为同一实体。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameAndUrl {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl NameAndUrl {
    pub fn new(name: impl Into<String>, url: Option<String>) -> Self {
        Self {
            name: name.into(),
            url: url.filter(|u| !u.is_empty()),
        }
    }

    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    /// 共指判定
    pub fn same_entity(&self, other: &NameAndUrl) -> bool {
        match (&self.url, &other.url) {
            (Some(a), Some(b)) => a == b || a.contains(b.as_str()) || b.contains(a.as_str()),
            // 无链接时退化为同名判定
            _ => !self.name.is_empty() && self.name == other.name,
        }
    }
}

/// 实体记录
///
/// 抽取产物，构造后不再修改（共指融合产生新记录）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub who: NameAndUrl,
    pub properties: BTreeMap<String, String>,
}

impl EntityRecord {
    pub fn new(who: NameAndUrl) -> Self {
        Self {
            who,
            properties: BTreeMap::new(),
        }
    }

    /// 合并另一条记录的属性，已有属性保持不变
    pub fn absorb(&mut self, other: EntityRecord) {
        if self.who.url.is_none() {
            self.who.url = other.who.url.clone();
        }
        for (k, v) in other.properties {
            self.properties.entry(k).or_insert(v);
        }
    }
}

/// 关系三元组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipTriple {
    pub subject: NameAndUrl,
    pub relation: String,
    pub object: NameAndUrl,
}

/// 单页抽取回放包，供界面复查使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    pub url: String,
    /// 规范化后的表格内容转储，每张表一个二维字符串网格
    pub tables: Vec<Vec<Vec<String>>>,
    pub entities: Vec<EntityRecord>,
    pub relationships: Vec<RelationshipTriple>,
}
