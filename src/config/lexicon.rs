// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// 站点表格发现规则
///
/// 非标准表格（列表式表格）按站点配置的class模式定位
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainTableRule {
    /// 容器元素class的匹配模式
    pub class: String,
}

/// 词表
///
/// 外部维护的JSON词集，启动时加载一次。
/// `person_properties` 是自学习词表：个人信息表判定成功后把表内
/// 属性名融合进来，并写回磁盘，使下一次判定更准确。
pub struct Lexicon {
    person_info_path: Option<PathBuf>,
    /// 个人信息表第一个属性名的别名集（如 中文名 / 本名）
    pub self_name_aliases: HashSet<String>,
    person_properties: RwLock<HashSet<String>>,
    /// 属性关系词，顺序即优先级
    pub relational_terms: Vec<String>,
    /// 标题关系词
    pub caption_relation_terms: Vec<String>,
    /// 人名列识别词
    pub person_name_terms: Vec<String>,
    /// 站点 → 非标准表格规则
    pub table_rules: HashMap<String, DomainTableRule>,
}

impl Lexicon {
    /// 内置词表，文件缺失时的回退，也供测试使用
    pub fn builtin() -> Self {
        let to_set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<HashSet<_>>();
        let to_vec = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mut table_rules = HashMap::new();
        table_rules.insert(
            "baike.baidu.com".to_string(),
            DomainTableRule {
                class: "basic-info".to_string(),
            },
        );
        Self {
            person_info_path: None,
            self_name_aliases: to_set(&["中文名", "本名"]),
            person_properties: RwLock::new(to_set(&[
                "中文名", "本名", "别名", "国籍", "民族", "出生日期", "逝世日期", "出生地",
                "职业", "毕业院校", "代表作品", "主要成就", "字", "号", "所处时代", "信仰",
            ])),
            relational_terms: to_vec(&["关系", "辈分", "亲属关系"]),
            caption_relation_terms: to_vec(&["家庭成员", "亲属", "家族成员", "主要亲属"]),
            person_name_terms: to_vec(&["姓名", "名字", "人物", "成员", "中文名", "本名"]),
            table_rules,
        }
    }

    /// 从目录加载词表，缺失的文件退回内置默认值
    pub fn load(dir: &Path) -> Self {
        let mut lex = Self::builtin();
        lex.person_info_path = Some(dir.join("person_info.json"));

        if let Some(words) = read_word_list(&dir.join("person_info.json")) {
            *lex.person_properties.write() = words.into_iter().collect();
        }
        if let Some(words) = read_word_list(&dir.join("self_name.json")) {
            lex.self_name_aliases = words.into_iter().collect();
        }
        if let Some(words) = read_word_list(&dir.join("property_relationship.json")) {
            lex.relational_terms = words;
        }
        if let Some(words) = read_word_list(&dir.join("caption_relationship.json")) {
            lex.caption_relation_terms = words;
        }
        if let Some(words) = read_word_list(&dir.join("person_name.json")) {
            lex.person_name_terms = words;
        }
        match fs::read_to_string(dir.join("table_rules.json")) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, DomainTableRule>>(&raw) {
                Ok(rules) => lex.table_rules = rules,
                Err(e) => warn!("invalid table_rules.json: {}", e),
            },
            Err(_) => {}
        }
        lex
    }

    /// 表属性名与个人属性词表的重叠比例
    pub fn person_property_overlap(&self, property_names: &[String]) -> f64 {
        let table_set: HashSet<&str> = property_names
            .iter()
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
            .collect();
        if table_set.is_empty() {
            return 0.0;
        }
        let known = self.person_properties.read();
        let hits = table_set.iter().filter(|p| known.contains(**p)).count();
        hits as f64 / table_set.len() as f64
    }

    /// 融合新的个人属性名并持久化，使后续判定更精确
    pub fn absorb_person_properties<I>(&self, names: I)
    where
        I: IntoIterator<Item = String>,
    {
        {
            let mut known = self.person_properties.write();
            for name in names {
                if !name.trim().is_empty() {
                    known.insert(name);
                }
            }
        }
        if let Some(path) = &self.person_info_path {
            let mut words: Vec<String> = self.person_properties.read().iter().cloned().collect();
            words.sort();
            if let Err(e) = write_word_list(path, &words) {
                warn!("failed to persist person property vocabulary: {}", e);
            }
        }
    }

    pub fn is_self_name(&self, name: &str) -> bool {
        self.self_name_aliases.contains(name.trim())
    }

    /// 关系词的优先级序号，越小优先级越高
    pub fn relation_rank(&self, property_name: &str) -> Option<usize> {
        self.relational_terms
            .iter()
            .position(|t| t == property_name.trim())
    }

    pub fn is_caption_relation(&self, caption: &str) -> bool {
        self.caption_relation_terms
            .iter()
            .any(|t| caption.contains(t.as_str()))
    }

    /// 属性名是否包含人名列识别词
    pub fn is_person_name_property(&self, property_name: &str) -> bool {
        self.person_name_terms
            .iter()
            .any(|t| property_name.contains(t.as_str()))
    }

    pub fn rule_for_domain(&self, domain: &str) -> Option<&DomainTableRule> {
        self.table_rules.get(domain)
    }
}

fn read_word_list(path: &Path) -> Option<Vec<String>> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(words) => Some(words),
        Err(e) => {
            warn!("invalid word list {}: {}", path.display(), e);
            None
        }
    }
}

fn write_word_list(path: &Path, words: &[String]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(words).expect("word list serializes");
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_knows_self_names() {
        let lex = Lexicon::builtin();
        assert!(lex.is_self_name("中文名"));
        assert!(lex.is_self_name(" 本名 "));
        assert!(!lex.is_self_name("职业"));
    }

    #[test]
    fn overlap_counts_distinct_properties() {
        let lex = Lexicon::builtin();
        let props = vec!["中文名".to_string(), "职业".to_string(), "未知属性".to_string()];
        let overlap = lex.person_property_overlap(&props);
        assert!((overlap - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(lex.person_property_overlap(&[]), 0.0);
    }

    #[test]
    fn absorb_updates_vocabulary_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut lex = Lexicon::builtin();
        lex.person_info_path = Some(dir.path().join("person_info.json"));
        lex.absorb_person_properties(vec!["爱好".to_string(), "  ".to_string()]);
        let overlap = lex.person_property_overlap(&["爱好".to_string()]);
        assert!((overlap - 1.0).abs() < 1e-9);

        let reloaded = Lexicon::load(dir.path());
        let overlap = reloaded.person_property_overlap(&["爱好".to_string()]);
        assert!((overlap - 1.0).abs() < 1e-9);
    }

    #[test]
    fn relation_rank_follows_list_order() {
        let lex = Lexicon::builtin();
        assert_eq!(lex.relation_rank("关系"), Some(0));
        assert_eq!(lex.relation_rank("辈分"), Some(1));
        assert_eq!(lex.relation_rank("职业"), None);
    }
}
