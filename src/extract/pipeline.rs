// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::lexicon::Lexicon;
use crate::config::settings::ExtractSettings;
use crate::domain::models::triple::PageExtraction;
use crate::extract::locate::TableLocator;
use crate::extract::table::{Table, UnfoldDirection};
use crate::extract::triples::{merge_entity, TripleExtractor};
use crate::nlp::Segmenter;

/// 单页表格抽取流水线
///
/// 定位 → 展开 → 方向归一（Col翻转为Row）→ 清洗 → 角色判定 →
/// 抽取。单张表的结构错误只丢弃该表，页面的其余表格照常处理。
/// 同页各表的实体做共指融合。
pub struct TableExtractPipeline {
    locator: TableLocator,
    extractor: TripleExtractor,
    segmenter: Arc<dyn Segmenter>,
}

impl TableExtractPipeline {
    pub fn new(lexicon: Arc<Lexicon>, segmenter: Arc<dyn Segmenter>, limits: ExtractSettings) -> Self {
        let locator = TableLocator::new(lexicon.clone(), segmenter.clone(), limits.clone());
        let extractor =
            TripleExtractor::new(lexicon, limits.person_info_overlap, limits.max_name_len);
        Self {
            locator,
            extractor,
            segmenter,
        }
    }

    /// 处理一个已抓取页面，产出回放包
    pub fn process_page(&self, url: &str, html: &str) -> PageExtraction {
        let mut bundle = PageExtraction {
            url: url.to_string(),
            tables: Vec::new(),
            entities: Vec::new(),
            relationships: Vec::new(),
        };
        for table in self.locator.locate(url, html) {
            match self.process_table(table) {
                Ok(Some((grid, entities, relationships))) => {
                    bundle.tables.push(grid);
                    for entity in entities {
                        merge_entity(&mut bundle.entities, entity);
                    }
                    bundle.relationships.extend(relationships);
                }
                Ok(None) => {}
                Err(e) => {
                    // 单表失败不拖累整页
                    warn!(url, error = %e, "table skipped");
                }
            }
        }
        debug!(
            url,
            tables = bundle.tables.len(),
            entities = bundle.entities.len(),
            relationships = bundle.relationships.len(),
            "page processed"
        );
        bundle
    }

    #[allow(clippy::type_complexity)]
    fn process_table(
        &self,
        mut table: Table,
    ) -> Result<
        Option<(
            Vec<Vec<String>>,
            Vec<crate::domain::models::triple::EntityRecord>,
            Vec<crate::domain::models::triple::RelationshipTriple>,
        )>,
        crate::extract::table::TableError,
    > {
        table.expand_spans();
        if !(table.is_normal() && table.is_regular()) {
            return Ok(None);
        }
        let direction = table.unfold_direction(self.segmenter.as_ref())?;
        let mut table = if direction == UnfoldDirection::Col {
            table.flip()?
        } else {
            table
        };
        table.clean()?;
        if !(table.is_normal() && table.is_regular()) {
            return Ok(None);
        }
        let grid = table.to_grid();
        let (entities, relationships) = self.extractor.extract(&mut table)?;
        Ok(Some((grid, entities, relationships)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::testing::StubSegmenter;

    fn pipeline() -> TableExtractPipeline {
        let lexicon = Arc::new(Lexicon::builtin());
        let segmenter = Arc::new(StubSegmenter::new(
            &["张三", "李四", "王五"],
            &["中文名", "职业", "姓名", "关系", "本名"],
        ));
        TableExtractPipeline::new(lexicon, segmenter, limits())
    }

    fn limits() -> ExtractSettings {
        ExtractSettings {
            queue_capacity: 200,
            idle_ticks: 100,
            replay_cache_size: 32,
            max_name_len: 7,
            link_ratio: 0.5,
            max_nested_tables: 3,
            max_scripts: 1,
            image_ratio: 0.5,
            person_info_overlap: 0.5,
        }
    }

    const PAGE: &str = "https://baike.example.com/item/%E5%BC%A0%E4%B8%89";

    #[test]
    fn vertical_person_info_table_round_trips() {
        // 属性在左列的纵向表：方向判为Col后翻转再抽取
        let html = r#"<table>
            <tr><th>中文名</th><td>张三</td></tr>
            <tr><th>本名</th><td>张三</td></tr>
            <tr><th>职业</th><td>教师</td></tr>
            <tr><th>国籍</th><td>某国</td></tr>
            <tr><th>民族</th><td>某族</td></tr>
            <tr><th>出生地</th><td>某地</td></tr>
        </table>"#;
        let bundle = pipeline().process_page(PAGE, html);
        assert_eq!(bundle.entities.len(), 1);
        assert_eq!(bundle.entities[0].who.name, "张三");
        assert_eq!(bundle.entities[0].properties["职业"], "教师");
        assert!(bundle.relationships.is_empty());
    }

    #[test]
    fn relationship_table_with_prefix_title_produces_triples() {
        let html = r#"<div>
            <div class="module-title"><span class="prefix">张三</span>人物关系</div>
            <table>
              <tr><th>姓名</th><th>关系</th></tr>
              <tr><td>李四</td><td>父亲</td></tr>
              <tr><td>王五</td><td>母亲</td></tr>
            </table>
        </div>"#;
        let bundle = pipeline().process_page(PAGE, html);
        assert_eq!(bundle.relationships.len(), 2);
        assert_eq!(bundle.relationships[0].subject.name, "张三");
        assert_eq!(bundle.relationships[0].relation, "父亲");
        assert_eq!(bundle.relationships[0].object.name, "李四");
    }

    #[test]
    fn entities_from_different_tables_fuse_by_link() {
        let html = r#"<body>
            <table>
              <tr><th>姓名</th><th>职业</th></tr>
              <tr><td><a href="/item/a">李四</a></td><td>教师</td></tr>
              <tr><td>王五</td><td>医生</td></tr>
            </table>
            <table>
              <tr><th>姓名</th><th>国籍</th></tr>
              <tr><td><a href="/item/a/123">李四</a></td><td>某国</td></tr>
            </table>
        </body>"#;
        let bundle = pipeline().process_page(PAGE, html);
        // /item/a 与 /item/a/123 是同一实体
        assert_eq!(bundle.entities.len(), 2);
        let merged = bundle
            .entities
            .iter()
            .find(|e| e.who.name == "李四")
            .unwrap();
        assert_eq!(merged.properties["职业"], "教师");
        assert_eq!(merged.properties["国籍"], "某国");
    }

    #[test]
    fn pages_without_tables_produce_empty_bundles() {
        let bundle = pipeline().process_page(PAGE, "<html><body><p>正文</p></body></html>");
        assert!(bundle.tables.is_empty());
        assert!(bundle.entities.is_empty());
        assert!(bundle.relationships.is_empty());
    }
}
