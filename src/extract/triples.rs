// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::lexicon::Lexicon;
use crate::domain::models::triple::{EntityRecord, NameAndUrl, RelationshipTriple};
use crate::extract::table::{Table, TableError, TableRole, UnfoldDirection};

/// 各式括号及其内容，人名和关系里的注释全部剥掉
static RE_BRACKETS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"（[^）]*）|\([^)]*\)|\{[^}]*\}|\[[^\]]*\]|【[^】]*】|<[^>]*>")
        .expect("static regex")
});
static RE_PUNCT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[\s+\-.!/_,$%^*("']+|[——！，。？?、~@#￥%…&*（）：:；;]+"#).expect("static regex")
});

/// 清洗人名：剥括号后取第一个分隔段，去标点，超长即弃
pub fn clean_person_name(raw: &str, max_len: usize) -> Option<String> {
    let no_brackets = RE_BRACKETS.replace_all(raw, "");
    let first = no_brackets
        .split(['/', '、', '，', ','])
        .find(|s| !s.trim().is_empty())?;
    let name = RE_PUNCT.replace_all(first, "").trim().to_string();
    (!name.is_empty() && name.chars().count() <= max_len).then_some(name)
}

/// 清洗关系词等普通成分
fn clean_component(raw: &str) -> String {
    let no_brackets = RE_BRACKETS.replace_all(raw, "");
    RE_PUNCT.replace_all(&no_brackets, "").trim().to_string()
}

/// 把一条实体记录融合进已有列表：命中共指则吸收，否则追加
pub fn merge_entity(records: &mut Vec<EntityRecord>, record: EntityRecord) {
    if let Some(existing) = records.iter_mut().find(|r| r.who.same_entity(&record.who)) {
        existing.absorb(record);
    } else {
        records.push(record);
    }
}

/// 三元组抽取器
///
/// 输入一律是已展开、方向归一为Row、清洗过的表格。
/// 先按优先级判定角色：个人信息表 → 属性关系表 → 标题关系表 →
/// 实体关系表 → 其他，再按角色抽取实体与关系。
pub struct TripleExtractor {
    lexicon: Arc<Lexicon>,
    overlap_threshold: f64,
    max_name_len: usize,
}

impl TripleExtractor {
    pub fn new(lexicon: Arc<Lexicon>, overlap_threshold: f64, max_name_len: usize) -> Self {
        Self {
            lexicon,
            overlap_threshold,
            max_name_len,
        }
    }

    /// 判定表格角色，结果缓存在表上
    pub fn classify_role(&self, table: &mut Table) -> Result<TableRole, TableError> {
        if let Some(role) = table.role {
            return Ok(role);
        }
        let names = table.property_names()?;
        let role = if self.is_person_info(table, &names) {
            TableRole::PersonInfo
        } else if names
            .iter()
            .any(|n| self.lexicon.relation_rank(n).is_some())
        {
            TableRole::PropertyRelationship
        } else if table
            .name
            .as_deref()
            .is_some_and(|n| self.lexicon.is_caption_relation(n))
        {
            TableRole::CaptionRelationship
        } else if names.iter().any(|n| self.lexicon.is_person_name_property(n)) {
            TableRole::EntityRelationship
        } else {
            TableRole::Other
        };
        table.role = Some(role);
        Ok(role)
    }

    /// 个人信息表：属性一行 + 取值一行的两行表，
    /// 首属性是本名别名，或属性名与个人属性词表重叠过半。
    /// 判定成功时把表内属性名融入词表，自学习。
    fn is_person_info(&self, table: &Table, names: &[String]) -> bool {
        if table.direction != Some(UnfoldDirection::Row) || table.row_count() != 2 {
            return false;
        }
        let matched = names
            .first()
            .is_some_and(|first| self.lexicon.is_self_name(first))
            || self.lexicon.person_property_overlap(names) >= self.overlap_threshold;
        if matched {
            self.lexicon
                .absorb_person_properties(names.iter().cloned());
        }
        matched
    }

    /// 按角色抽取单张表的实体与关系
    pub fn extract(
        &self,
        table: &mut Table,
    ) -> Result<(Vec<EntityRecord>, Vec<RelationshipTriple>), TableError> {
        match self.classify_role(table)? {
            TableRole::PersonInfo | TableRole::EntityRelationship => {
                Ok((self.extract_entities(table)?, Vec::new()))
            }
            TableRole::PropertyRelationship => {
                let relationships = self.property_relationships(table)?;
                // 关系列删掉后表格可能退化，实体能抽多少算多少
                let entities = self.extract_entities(table).unwrap_or_default();
                Ok((entities, relationships))
            }
            TableRole::CaptionRelationship => {
                let relationships = self.caption_relationships(table)?;
                let entities = self.extract_entities(table).unwrap_or_default();
                Ok((entities, relationships))
            }
            TableRole::Other => Ok((Vec::new(), Vec::new())),
        }
    }

    /// 实体抽取：人名列为主键，其余属性列作键值对
    fn extract_entities(&self, table: &mut Table) -> Result<Vec<EntityRecord>, TableError> {
        let names = table.property_names()?;
        let line = table.discriminate_property_lines()?;
        let Some(person_idx) = names
            .iter()
            .position(|n| self.lexicon.is_person_name_property(n))
        else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for i in line..table.row_count() {
            let row = table.row_at(i)?;
            let person_cell = &row[person_idx];
            let Some(who) = clean_person_name(&person_cell.content, self.max_name_len) else {
                continue;
            };
            let url = person_cell.entity_link().map(|s| s.to_string());
            let mut record = EntityRecord::new(NameAndUrl::new(who, url));
            for (j, key) in names.iter().enumerate() {
                if j == person_idx || key.is_empty() {
                    continue;
                }
                let value = row[j].content.trim();
                if value.is_empty() {
                    continue;
                }
                record.properties.insert(key.clone(), value.to_string());
            }
            merge_entity(&mut records, record);
        }
        Ok(records)
    }

    /// 属性关系表：标题前缀主语 -[关系列取值]-> 人名列取值
    ///
    /// 多个关系列时按词表顺序留优先级最高的一列，其余删除；
    /// 用过的关系列也删掉，免得再被当作实体属性。
    fn property_relationships(
        &self,
        table: &mut Table,
    ) -> Result<Vec<RelationshipTriple>, TableError> {
        let names = table.property_names()?;
        let mut relation_cols: Vec<(usize, usize, String)> = names
            .iter()
            .enumerate()
            .filter_map(|(idx, n)| {
                self.lexicon
                    .relation_rank(n)
                    .map(|rank| (rank, idx, n.clone()))
            })
            .collect();
        if relation_cols.is_empty() {
            return Ok(Vec::new());
        }
        relation_cols.sort();
        let keep_name = relation_cols[0].2.clone();
        let mut drop: Vec<usize> = relation_cols[1..].iter().map(|c| c.1).collect();
        drop.sort_unstable_by(|a, b| b.cmp(a));
        for idx in drop {
            table.delete_col(idx)?;
        }

        let Some(subject) = table.prefix_subject.clone() else {
            return Ok(Vec::new());
        };
        let names = table.property_names()?;
        let line = table.discriminate_property_lines()?;
        let Some(person_idx) = names
            .iter()
            .position(|n| self.lexicon.is_person_name_property(n))
        else {
            return Ok(Vec::new());
        };
        let Some(relation_idx) = names.iter().position(|n| *n == keep_name) else {
            return Ok(Vec::new());
        };

        let mut triples = Vec::new();
        for i in line..table.row_count() {
            let row = table.row_at(i)?;
            if let Some(triple) = self.make_triple(&subject, &row[relation_idx].content, &row[person_idx])
            {
                triples.push(triple);
            }
        }
        table.delete_col(relation_idx)?;
        Ok(triples)
    }

    /// 标题关系表：标题前缀主语 -[表名]-> 人名列取值
    fn caption_relationships(
        &self,
        table: &mut Table,
    ) -> Result<Vec<RelationshipTriple>, TableError> {
        let Some(caption) = table.name.clone() else {
            return Ok(Vec::new());
        };
        let Some(subject) = table.prefix_subject.clone() else {
            return Ok(Vec::new());
        };
        let names = table.property_names()?;
        let line = table.discriminate_property_lines()?;
        let Some(person_idx) = names
            .iter()
            .position(|n| self.lexicon.is_person_name_property(n))
        else {
            return Ok(Vec::new());
        };

        let mut triples = Vec::new();
        for i in line..table.row_count() {
            let row = table.row_at(i)?;
            if let Some(triple) = self.make_triple(&subject, &caption, &row[person_idx]) {
                triples.push(triple);
            }
        }
        Ok(triples)
    }

    /// 组装一条三元组，任一成分清洗后为空或超长即整条丢弃
    fn make_triple(
        &self,
        subject: &str,
        relation: &str,
        object_cell: &crate::extract::cell::TableCell,
    ) -> Option<RelationshipTriple> {
        let subject = clean_person_name(subject, self.max_name_len)?;
        let relation = clean_component(relation);
        if relation.is_empty() || relation.chars().count() > self.max_name_len {
            return None;
        }
        let object = clean_person_name(&object_cell.content, self.max_name_len)?;
        let url = object_cell.entity_link().map(|s| s.to_string());
        Some(RelationshipTriple {
            subject: NameAndUrl::bare(subject),
            relation,
            object: NameAndUrl::new(object, url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::cell::TableCell;

    fn extractor() -> TripleExtractor {
        TripleExtractor::new(Arc::new(Lexicon::builtin()), 0.5, 7)
    }

    fn row_table(grid: &[&[&str]]) -> Table {
        let rows = grid
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .enumerate()
                    .map(|(j, content)| TableCell::new(*content, i, j))
                    .collect()
            })
            .collect();
        let mut table = Table::from_rows(rows);
        table.direction = Some(UnfoldDirection::Row);
        table
    }

    #[test]
    fn two_by_two_person_info_yields_one_entity() {
        let mut table = row_table(&[&["中文名", "职业"], &["张三", "教师"]]);
        let ex = extractor();
        assert_eq!(ex.classify_role(&mut table).unwrap(), TableRole::PersonInfo);
        let (entities, relationships) = ex.extract(&mut table).unwrap();
        assert!(relationships.is_empty());
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].who.name, "张三");
        assert_eq!(entities[0].properties["职业"], "教师");
    }

    #[test]
    fn three_row_table_with_person_column_is_entity_relationship() {
        let mut table = row_table(&[
            &["中文名", "职业"],
            &["张三", "教师"],
            &["李四", "医生"],
        ]);
        let ex = extractor();
        assert_eq!(
            ex.classify_role(&mut table).unwrap(),
            TableRole::EntityRelationship
        );
        let (entities, _) = ex.extract(&mut table).unwrap();
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn relation_column_priority_and_prefix_subject() {
        let mut table = row_table(&[
            &["姓名", "辈分", "关系"],
            &["李四", "长辈", "父亲"],
            &["王五", "长辈", "母亲"],
        ]);
        table.prefix_subject = Some("张三".to_string());
        let ex = extractor();
        assert_eq!(
            ex.classify_role(&mut table).unwrap(),
            TableRole::PropertyRelationship
        );
        let (_, relationships) = ex.extract(&mut table).unwrap();
        // 词表里"关系"优先于"辈分"
        assert_eq!(relationships.len(), 2);
        assert_eq!(relationships[0].subject.name, "张三");
        assert_eq!(relationships[0].relation, "父亲");
        assert_eq!(relationships[0].object.name, "李四");
        assert_eq!(relationships[1].relation, "母亲");
    }

    #[test]
    fn caption_relation_pairs_caption_with_each_person() {
        let mut table = row_table(&[&["姓名", "备注"], &["李四", "x"], &["王五", "y"]]);
        table.name = Some("家庭成员".to_string());
        table.prefix_subject = Some("张三".to_string());
        let ex = extractor();
        assert_eq!(
            ex.classify_role(&mut table).unwrap(),
            TableRole::CaptionRelationship
        );
        let (_, relationships) = ex.extract(&mut table).unwrap();
        assert_eq!(relationships.len(), 2);
        assert!(relationships
            .iter()
            .all(|t| t.relation == "家庭成员" && t.subject.name == "张三"));
    }

    #[test]
    fn overlong_relation_is_rejected() {
        let mut table = row_table(&[
            &["姓名", "关系"],
            &["李四", "这是一个超过七个字的关系"],
        ]);
        table.prefix_subject = Some("张三".to_string());
        let ex = extractor();
        let (_, relationships) = ex.extract(&mut table).unwrap();
        assert!(relationships.is_empty());
    }

    #[test]
    fn bracketed_person_names_are_cleaned() {
        assert_eq!(clean_person_name("李四（注）", 7).as_deref(), Some("李四"));
        assert_eq!(clean_person_name("张三/李四", 7).as_deref(), Some("张三"));
        assert_eq!(clean_person_name("——", 7), None);
        assert_eq!(clean_person_name("超过七个字的长长人名", 7), None);
    }

    #[test]
    fn entity_fusion_by_url_substring() {
        let mut table = row_table(&[
            &["姓名", "职业"],
            &["张三", "教师"],
            &["张三", "校长"],
        ]);
        // 两行同名无链接：按名字共指融合，先到的属性保留
        let ex = extractor();
        let (entities, _) = ex.extract(&mut table).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].properties["职业"], "教师");
    }

    #[test]
    fn missing_person_column_yields_nothing() {
        let mut table = row_table(&[&["科目", "成绩"], &["数学", "90"], &["语文", "85"]]);
        let ex = extractor();
        assert_eq!(ex.classify_role(&mut table).unwrap(), TableRole::Other);
        let (entities, relationships) = ex.extract(&mut table).unwrap();
        assert!(entities.is_empty());
        assert!(relationships.is_empty());
    }
}
