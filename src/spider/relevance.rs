// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashSet;
use std::sync::Arc;

use scraper::{Html, Selector};
use url::Url;

use crate::nlp::Segmenter;
use crate::utils::url_utils;

/// 链接相关度过滤器
///
/// 对页面内的每个锚点打分：判别路径下最后一个非数字路径段
/// 恰好识别为一个人名时记1.0，否则记0.0。
/// 达到阈值的进主通道；未达到但仍在判别路径下且无文件扩展名的
/// 进低置信度通道；其余全部丢弃。
/// 主通道收严、探索通道放宽是有意的不对称。
pub struct LinkRelevanceFilter {
    link_head: Url,
    discriminant_path: String,
    threshold: f64,
    segmenter: Arc<dyn Segmenter>,
}

impl LinkRelevanceFilter {
    pub fn new(
        link_head: &str,
        discriminant_path: &str,
        threshold: f64,
        segmenter: Arc<dyn Segmenter>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            link_head: Url::parse(link_head)?,
            discriminant_path: discriminant_path.to_string(),
            threshold,
            segmenter,
        })
    }

    /// 对整页HTML分类所有锚点链接
    pub fn classify(&self, html: &str) -> (HashSet<String>, HashSet<String>) {
        let document = Html::parse_document(html);
        let selector = Selector::parse("a[href]").expect("static selector");

        let mut relevant = HashSet::new();
        let mut low_confidence = HashSet::new();
        for anchor in document.select(&selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
                continue;
            }
            let Some(path) = self.site_path(href) else {
                continue;
            };
            let Some(absolute) = self.absolute(&path) else {
                continue;
            };
            if self.correlation(&path) >= self.threshold {
                relevant.insert(absolute);
            } else if self.is_possible(&path) {
                low_confidence.insert(absolute);
            }
        }
        (relevant, low_confidence)
    }

    /// 计算相关度：恰好识别为单个人名的路径段记1.0
    pub fn correlation(&self, path: &str) -> f64 {
        let Some(rest) = path.strip_prefix(self.discriminant_path.as_str()) else {
            return 0.0;
        };
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        let name = match segments.as_slice() {
            [] => return 0.0,
            [only] => *only,
            [.., prev, last] => {
                // 词条链接常以数字ID结尾，名字在上一段
                if last.chars().all(|c| c.is_ascii_digit()) {
                    *prev
                } else {
                    *last
                }
            }
        };
        let name = url_utils::decode_segment(name);
        if self.segmenter.is_single_person_name(&name) {
            1.0
        } else {
            0.0
        }
    }

    /// 宽松保留条件：判别路径下且最后一段无文件扩展名
    fn is_possible(&self, path: &str) -> bool {
        let Some(rest) = path.strip_prefix(self.discriminant_path.as_str()) else {
            return false;
        };
        let last = rest.rsplit('/').find(|s| !s.is_empty()).unwrap_or("");
        if last.is_empty() {
            return false;
        }
        !url_utils::has_file_extension(&url_utils::decode_segment(last))
    }

    /// 站内路径：相对路径原样返回，绝对链接要求与链接头同域
    fn site_path(&self, href: &str) -> Option<String> {
        if href.starts_with("http://") || href.starts_with("https://") {
            let parsed = Url::parse(href).ok()?;
            if parsed.host_str() != self.link_head.host_str() {
                return None;
            }
            return Some(parsed.path().to_string());
        }
        Some(href.to_string())
    }

    fn absolute(&self, path: &str) -> Option<String> {
        url_utils::resolve_url(&self.link_head, path)
            .ok()
            .map(|u| u.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::testing::StubSegmenter;

    fn filter() -> LinkRelevanceFilter {
        let segmenter = Arc::new(StubSegmenter::new(&["张三", "岳飞"], &["职业"]));
        LinkRelevanceFilter::new("https://baike.example.com", "/item/", 0.8, segmenter).unwrap()
    }

    #[test]
    fn person_item_links_are_relevant() {
        let f = filter();
        assert_eq!(f.correlation("/item/张三"), 1.0);
        // 数字尾段是词条ID，名字取上一段
        assert_eq!(f.correlation("/item/%E5%B2%B3%E9%A3%9E/127844"), 1.0);
        assert_eq!(f.correlation("/item/不是人名的词条"), 0.0);
        assert_eq!(f.correlation("/other/张三"), 0.0);
    }

    fn absolute(path: &str) -> String {
        Url::parse("https://baike.example.com")
            .unwrap()
            .join(path)
            .unwrap()
            .to_string()
    }

    #[test]
    fn classify_splits_three_ways() {
        let f = filter();
        let html = r##"<html><body>
            <a href="/item/张三">张三</a>
            <a href="/item/某个条目">条目</a>
            <a href="/item/logo.png">图</a>
            <a href="/news/today">新闻</a>
            <a href="#">锚</a>
            <a href="https://elsewhere.com/item/张三">外站</a>
        </body></html>"##;
        let (relevant, low) = f.classify(html);
        assert_eq!(relevant, [absolute("/item/张三")].into());
        assert_eq!(low, [absolute("/item/某个条目")].into());
    }

    #[test]
    fn same_host_absolute_links_count() {
        let f = filter();
        let html = r#"<a href="https://baike.example.com/item/%E5%BC%A0%E4%B8%89">x</a>"#;
        let (relevant, _) = f.classify(html);
        assert_eq!(relevant.len(), 1);
    }
}
