// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::lexicon::Lexicon;
use crate::config::settings::ExtractSettings;
use crate::extract::cell::TableCell;
use crate::extract::table::{Table, TableRole, UnfoldDirection};
use crate::nlp::Segmenter;

static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("static regex"));
static RE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").expect("static regex"));
static RE_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b.*?</style>").expect("static regex"));
static RE_ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<article\b.*?</article>").expect("static regex"));
static RE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<code\b.*?</code>").expect("static regex"));
/// 词条页里的脚注上标，形如 [1] 或 [2-4]
static RE_FOOTNOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\d+(-\d+)?\]").expect("static regex"));

static SEL_TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("static selector"));
static SEL_TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("static selector"));
static SEL_CAPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("caption").expect("static selector"));
static SEL_ANCHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector"));
static SEL_IMG: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[src]").expect("static selector"));
static SEL_SCRIPT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("static selector"));
static SEL_DT: Lazy<Selector> = Lazy::new(|| Selector::parse("dt").expect("static selector"));
static SEL_DD: Lazy<Selector> = Lazy::new(|| Selector::parse("dd").expect("static selector"));

/// 表格定位器
///
/// 三条启发规则筛选正文里的数据表格：
/// R1 形状（至少两行，前两行至少各两格）；
/// R2 噪声比例（链接、嵌套表格、脚本、图片不过量）；
/// R3 语义（头部两行或头部两列出现名词类词）。
/// 另按站点规则把列表式排版的信息框还原成 N×2 纵向表。
pub struct TableLocator {
    lexicon: Arc<Lexicon>,
    segmenter: Arc<dyn Segmenter>,
    limits: ExtractSettings,
}

impl TableLocator {
    pub fn new(lexicon: Arc<Lexicon>, segmenter: Arc<dyn Segmenter>, limits: ExtractSettings) -> Self {
        Self {
            lexicon,
            segmenter,
            limits,
        }
    }

    /// 定位页面中全部候选表格
    pub fn locate(&self, page_url: &str, html: &str) -> Vec<Table> {
        let cleaned = pre_treat(html);
        let document = Html::parse_document(&cleaned);
        let base = Url::parse(page_url).ok();

        let mut tables = Vec::new();
        for element in document.select(&SEL_TABLE) {
            // 嵌套表格由外层整体处理
            if !is_outermost_table(element) {
                continue;
            }
            if !self.passes_rules(element) {
                continue;
            }
            if let Some(table) = self.build_table(element, base.as_ref()) {
                tables.push(table);
            }
        }
        tables.extend(self.nonstandard_tables(&document, base.as_ref()));
        debug!(url = page_url, count = tables.len(), "tables located");
        tables
    }

    fn passes_rules(&self, element: ElementRef<'_>) -> bool {
        let rows: Vec<ElementRef<'_>> = element
            .select(&SEL_TR)
            .filter(|tr| closest_table(*tr).map(|t| t.id()) == Some(element.id()))
            .collect();
        // R1 形状
        if rows.len() < 2 {
            return false;
        }
        if rows[..2].iter().any(|r| row_cells(*r).len() < 2) {
            return false;
        }

        // R2 噪声比例，格数按 行数×首行宽 粗估
        let cells = (rows.len() * row_cells(rows[0]).len()) as f64;
        let links = element.select(&SEL_ANCHOR).count() as f64;
        if links > cells * self.limits.link_ratio {
            return false;
        }
        let nested = element
            .select(&SEL_TABLE)
            .filter(|t| t.id() != element.id())
            .count();
        if nested > self.limits.max_nested_tables {
            return false;
        }
        if element.select(&SEL_SCRIPT).count() > self.limits.max_scripts {
            return false;
        }
        let images = element.select(&SEL_IMG).count() as f64;
        if images > cells * self.limits.image_ratio {
            return false;
        }

        // R3 语义：头部两行或头部两列含名词类词
        let mut head_cells: Vec<ElementRef<'_>> = Vec::new();
        for row in rows.iter().take(2) {
            head_cells.extend(row_cells(*row));
        }
        for row in &rows {
            head_cells.extend(row_cells(*row).into_iter().take(2));
        }
        head_cells
            .iter()
            .any(|c| self.segmenter.has_nominal_token(&cell_text(*c)))
    }

    fn build_table(&self, element: ElementRef<'_>, base: Option<&Url>) -> Option<Table> {
        let mut rows = Vec::new();
        for (i, tr) in element
            .select(&SEL_TR)
            .filter(|tr| closest_table(*tr).map(|t| t.id()) == Some(element.id()))
            .enumerate()
        {
            let mut row = Vec::new();
            for (j, cell_el) in row_cells(tr).into_iter().enumerate() {
                row.push(build_cell(cell_el, i, j, base));
            }
            if !row.is_empty() {
                rows.push(row);
            }
        }
        if rows.is_empty() {
            return None;
        }
        let (name, prefix_subject) = self.caption_of(element);
        let mut table = Table::from_rows(rows);
        table.name = name;
        table.prefix_subject = prefix_subject;
        Some(table)
    }

    /// 表名：caption元素优先，否则在前邻元素里找标题
    ///
    /// 前邻元素带 title 类时取其文字为表名，其中 prefix 类的部分
    /// 拆出来作为标题前缀主语；否则前邻的短文本直接作表名。
    fn caption_of(&self, element: ElementRef<'_>) -> (Option<String>, Option<String>) {
        if let Some(caption) = element.select(&SEL_CAPTION).next() {
            let text = cell_text(caption);
            if !text.is_empty() {
                return (Some(text), None);
            }
        }
        let Some(prev) = element.prev_siblings().filter_map(ElementRef::wrap).next() else {
            return (None, None);
        };
        if let Some(title) = find_class_substr(prev, "title") {
            let title_text = cell_text(title);
            let prefix = find_class_substr(title, "prefix")
                .map(|p| cell_text(p))
                .filter(|p| !p.is_empty());
            let name = match &prefix {
                Some(p) => title_text.replace(p.as_str(), "").trim().to_string(),
                None => title_text,
            };
            let name = (!name.is_empty()).then_some(name);
            return (name, prefix);
        }
        let text = cell_text(prev);
        let chars = text.chars().count();
        if chars > 0 && chars < 8 {
            (Some(text), None)
        } else {
            (None, None)
        }
    }

    /// 站点规则指定的列表式信息框，还原为 N×2 纵向个人信息表
    fn nonstandard_tables(&self, document: &Html, base: Option<&Url>) -> Vec<Table> {
        let Some(domain) = base.and_then(|u| u.host_str().map(|h| h.to_string())) else {
            return Vec::new();
        };
        let Some(rule) = self.lexicon.rule_for_domain(&domain) else {
            return Vec::new();
        };
        let Ok(selector) = Selector::parse(&format!("[class*=\"{}\"]", rule.class)) else {
            return Vec::new();
        };

        let mut tables = Vec::new();
        for container in document.select(&selector) {
            let labels: Vec<ElementRef<'_>> = container.select(&SEL_DT).collect();
            let values: Vec<ElementRef<'_>> = container.select(&SEL_DD).collect();
            if labels.is_empty() || labels.len() != values.len() {
                continue;
            }
            let mut rows = Vec::with_capacity(labels.len());
            for (i, (dt, dd)) in labels.iter().zip(&values).enumerate() {
                let mut label = build_cell(*dt, i, 0, base);
                label.tag = crate::extract::cell::CellTag::Header;
                let value = build_cell(*dd, i, 1, base);
                rows.push(vec![label, value]);
            }
            let mut table = Table::from_rows(rows);
            table.direction = Some(UnfoldDirection::Col);
            table.role = Some(TableRole::PersonInfo);
            tables.push(table);
        }
        tables
    }
}

/// 解析前的正则清扫：去掉注释、脚本、样式等与表格无关的块
fn pre_treat(html: &str) -> String {
    let html = RE_COMMENT.replace_all(html, "");
    let html = RE_SCRIPT.replace_all(&html, "");
    let html = RE_STYLE.replace_all(&html, "");
    let html = RE_ARTICLE.replace_all(&html, "");
    let html = RE_CODE.replace_all(&html, "");
    html.replace(['\r', '\t', '\n'], "")
}

fn closest_table(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
}

fn is_outermost_table(el: ElementRef<'_>) -> bool {
    closest_table(el).is_none()
}

/// 行的直接子单元格（不含嵌套表格里的格子）
fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "th" | "td"))
        .collect()
}

/// 元素文字，换行标签换成斜杠分隔，脚注和不间断空格去掉
fn text_with_breaks(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) if e.name() == "br" => out.push('/'),
            _ => {}
        }
    }
    out
}

fn cell_text(el: ElementRef<'_>) -> String {
    let raw = text_with_breaks(el).replace('\u{a0}', " ");
    RE_FOOTNOTE.replace_all(&raw, "").trim().to_string()
}

fn build_cell(el: ElementRef<'_>, row: usize, col: usize, base: Option<&Url>) -> TableCell {
    let mut cell = TableCell::new(cell_text(el), row, col);
    cell.row_span = span_attr(el, "rowspan");
    cell.col_span = span_attr(el, "colspan");
    if el.value().name() == "th" {
        cell.tag = crate::extract::cell::CellTag::Header;
    }
    for anchor in el.select(&SEL_ANCHOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let target = match base {
            Some(base) => match base.join(href) {
                Ok(url) => url.to_string(),
                Err(_) => continue,
            },
            None => href.to_string(),
        };
        cell.hyperlinks.push((cell_text(anchor), target));
    }
    for img in el.select(&SEL_IMG) {
        if let Some(src) = img.value().attr("src") {
            cell.images.push(src.to_string());
        }
    }
    cell.reclassify();
    cell
}

fn span_attr(el: ElementRef<'_>, name: &str) -> usize {
    el.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(1)
}

/// 自身或后代里class包含给定子串的第一个元素
fn find_class_substr<'a>(root: ElementRef<'a>, class_substr: &str) -> Option<ElementRef<'a>> {
    root.descendants().filter_map(ElementRef::wrap).find(|el| {
        el.value()
            .attr("class")
            .is_some_and(|c| c.contains(class_substr))
    })
}
