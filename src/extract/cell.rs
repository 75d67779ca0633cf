// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

use crate::extract::content_type::ContentType;

/// 单元格来源标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellTag {
    /// th 单元格
    Header,
    /// td 单元格
    Data,
}

/// 表格单元格
///
/// 记录来源坐标、跨度与展开后的绝对坐标。
/// 超链接按 文字 → 绝对URL 存放，图片只留地址。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableCell {
    pub content: String,
    pub row_origin: usize,
    pub col_origin: usize,
    pub row_span: usize,
    pub col_span: usize,
    pub absolute_row: usize,
    pub absolute_col: usize,
    pub hyperlinks: Vec<(String, String)>,
    pub images: Vec<String>,
    pub content_type: ContentType,
    pub tag: CellTag,
}

impl TableCell {
    pub fn new(content: impl Into<String>, row: usize, col: usize) -> Self {
        let content = content.into();
        let content_type = ContentType::classify(&content, false);
        Self {
            content,
            row_origin: row,
            col_origin: col,
            row_span: 1,
            col_span: 1,
            absolute_row: row,
            absolute_col: col,
            hyperlinks: Vec::new(),
            images: Vec::new(),
            content_type,
            tag: CellTag::Data,
        }
    }

    pub fn header(content: impl Into<String>, row: usize, col: usize) -> Self {
        let mut cell = Self::new(content, row, col);
        cell.tag = CellTag::Header;
        cell
    }

    /// 展开时的占位空格
    pub fn blank(row: usize, col: usize) -> Self {
        Self::new("", row, col)
    }

    pub fn with_span(mut self, row_span: usize, col_span: usize) -> Self {
        self.row_span = row_span.max(1);
        self.col_span = col_span.max(1);
        self
    }

    /// 按当前内容和图片重算内容类型
    pub fn reclassify(&mut self) {
        self.content_type = ContentType::classify(self.content.trim(), !self.images.is_empty());
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    pub fn is_header(&self) -> bool {
        self.tag == CellTag::Header
    }

    /// 单元格内的实体链接：优先取文字与内容一致的链接，否则取第一个
    pub fn entity_link(&self) -> Option<&str> {
        let content = self.content.trim();
        self.hyperlinks
            .iter()
            .find(|(label, _)| label.trim() == content)
            .or_else(|| self.hyperlinks.first())
            .map(|(_, url)| url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_cell_is_classified_immediately() {
        let cell = TableCell::new("张三", 0, 0);
        assert_eq!(cell.content_type, ContentType::Chinese);
        assert_eq!(cell.tag, CellTag::Data);
        assert_eq!((cell.row_span, cell.col_span), (1, 1));
    }

    #[test]
    fn reclassify_accounts_for_images() {
        let mut cell = TableCell::new("张三", 0, 0);
        cell.images.push("https://x/p.png".to_string());
        cell.reclassify();
        assert_eq!(cell.content_type, ContentType::Image);
    }

    #[test]
    fn entity_link_prefers_matching_label() {
        let mut cell = TableCell::new("张三", 1, 0);
        cell.hyperlinks
            .push(("注释".to_string(), "https://x/note".to_string()));
        cell.hyperlinks
            .push(("张三".to_string(), "https://x/item/a".to_string()));
        assert_eq!(cell.entity_link(), Some("https://x/item/a"));
    }
}
