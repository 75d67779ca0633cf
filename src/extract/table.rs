// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::cell::TableCell;
use crate::extract::content_type::ContentType;
use crate::nlp::Segmenter;

/// 表格结构错误
#[derive(Error, Debug)]
pub enum TableError {
    #[error("行索引{0}超出表格范围")]
    RowOutOfRange(usize),
    #[error("列索引{0}超出表格范围")]
    ColOutOfRange(usize),
    #[error("表格不规整，无法进行结构查询")]
    NotRegular,
    #[error("表格行列数不足，无法进行结构查询")]
    NotNormal,
    #[error("表格方向未定")]
    DirectionUnknown,
}

/// 表格展开方向
///
/// Row：属性占头部若干行，记录按行排布；
/// Col：属性占头部若干列，记录按列排布
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnfoldDirection {
    Row,
    Col,
}

impl UnfoldDirection {
    pub fn flipped(self) -> UnfoldDirection {
        match self {
            UnfoldDirection::Row => UnfoldDirection::Col,
            UnfoldDirection::Col => UnfoldDirection::Row,
        }
    }
}

/// 表格在抽取中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableRole {
    PersonInfo,
    PropertyRelationship,
    CaptionRelationship,
    EntityRelationship,
    Other,
}

/// 方向判别里长度特征与类型特征的权重
const LENGTH_WEIGHT: f64 = 0.5;
const TYPE_WEIGHT: f64 = 0.5;
/// 行列悬殊到该倍数时直接按窄轴定方向
const ASPECT_RATIO: usize = 3;

/// 结构化表格
///
/// 单元格按行存放。跨行跨列的表格先经 `expand_spans` 展开成
/// 规整网格，之后的结构查询（按行/列取数、方向判别、清洗）
/// 只在 规整∧正规 的表格上有效，否则返回 [`TableError`]。
pub struct Table {
    rows: Vec<Vec<TableCell>>,
    row_count: usize,
    col_count: usize,
    /// 表名（caption或临近标题）
    pub name: Option<String>,
    /// 标题前缀的主语（通常是页面主体人物）
    pub prefix_subject: Option<String>,
    pub direction: Option<UnfoldDirection>,
    property_line_count: Option<usize>,
    pub role: Option<TableRole>,
    regular: bool,
    normal: bool,
}

impl Table {
    pub fn from_rows(rows: Vec<Vec<TableCell>>) -> Self {
        let mut table = Self {
            rows,
            row_count: 0,
            col_count: 0,
            name: None,
            prefix_subject: None,
            direction: None,
            property_line_count: None,
            role: None,
            regular: false,
            normal: false,
        };
        table.recompute_layout();
        table
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn col_count(&self) -> usize {
        self.col_count
    }

    pub fn is_regular(&self) -> bool {
        self.regular
    }

    pub fn is_normal(&self) -> bool {
        self.normal
    }

    /// 结构查询的前置检查
    pub fn structural_check(&self) -> Result<(), TableError> {
        if !self.normal {
            return Err(TableError::NotNormal);
        }
        if !self.regular {
            return Err(TableError::NotRegular);
        }
        Ok(())
    }

    pub fn row_at(&self, index: usize) -> Result<&[TableCell], TableError> {
        self.structural_check()?;
        self.rows
            .get(index)
            .map(|r| r.as_slice())
            .ok_or(TableError::RowOutOfRange(index))
    }

    pub fn col_at(&self, index: usize) -> Result<Vec<&TableCell>, TableError> {
        self.structural_check()?;
        if index >= self.col_count {
            return Err(TableError::ColOutOfRange(index));
        }
        Ok(self.rows.iter().map(|r| &r[index]).collect())
    }

    /// 一次自上而下、自左而右的扫描重排绝对坐标，
    /// 同时维护仍在生效的跨行跨度；顺带刷新行宽与规整标志
    fn recompute_layout(&mut self) {
        // (剩余行数, 列跨度)
        let mut open: Vec<(usize, usize)> = Vec::new();
        let mut widths = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.iter_mut().enumerate() {
            let inherited: usize = open.iter().map(|o| o.1).sum();
            let mut width = inherited;
            let mut spanned_before = 0;
            for (j, cell) in row.iter_mut().enumerate() {
                let col_start: usize = open.iter().map(|o| o.1).sum();
                cell.absolute_row = i;
                cell.absolute_col = col_start + j - spanned_before;
                width += cell.col_span;
                if cell.row_span > 1 || cell.col_span > 1 {
                    open.push((cell.row_span, cell.col_span));
                    spanned_before += 1;
                }
            }
            widths.push(width);
            open.retain_mut(|o| {
                if o.0 > 1 {
                    o.0 -= 1;
                    true
                } else {
                    false
                }
            });
        }
        self.row_count = self.rows.len();
        self.col_count = widths.iter().copied().max().unwrap_or(0);
        self.regular = !widths.is_empty() && widths.iter().all(|w| *w == self.col_count);
        self.normal = self.row_count >= 2 && self.col_count >= 2;
    }

    /// 把每个跨行跨列的单元格深拷贝展开为单位格
    ///
    /// 展开后表格成为规整网格，没有被任何单元格覆盖的位置
    /// 补空白格。对已展开的表格是恒等操作。
    pub fn expand_spans(&mut self) {
        self.recompute_layout();
        let target_rows = self
            .rows
            .iter()
            .flatten()
            .map(|c| c.absolute_row + c.row_span)
            .max()
            .unwrap_or(0)
            .max(self.row_count);
        let width = self.col_count;
        if target_rows == 0 || width == 0 {
            return;
        }
        let mut grid: Vec<Vec<Option<TableCell>>> = vec![vec![None; width]; target_rows];
        for cell in self.rows.drain(..).flatten() {
            let row_end = (cell.absolute_row + cell.row_span).min(target_rows);
            let col_end = (cell.absolute_col + cell.col_span).min(width);
            for r in cell.absolute_row..row_end {
                for c in cell.absolute_col..col_end {
                    if grid[r][c].is_none() {
                        let mut dup = cell.clone();
                        dup.row_span = 1;
                        dup.col_span = 1;
                        dup.row_origin = r;
                        dup.col_origin = c;
                        dup.absolute_row = r;
                        dup.absolute_col = c;
                        grid[r][c] = Some(dup);
                    }
                }
            }
        }
        self.rows = grid
            .into_iter()
            .enumerate()
            .map(|(r, row)| {
                row.into_iter()
                    .enumerate()
                    .map(|(c, cell)| cell.unwrap_or_else(|| TableCell::blank(r, c)))
                    .collect()
            })
            .collect();
        self.recompute_layout();
    }

    /// 转置出新表，方向随之翻转，其余元信息保留
    pub fn flip(&self) -> Result<Table, TableError> {
        self.structural_check()?;
        let mut rows = Vec::with_capacity(self.col_count);
        for j in 0..self.col_count {
            let mut row = Vec::with_capacity(self.row_count);
            for (i, src_row) in self.rows.iter().enumerate() {
                let mut cell = src_row[j].clone();
                cell.row_origin = j;
                cell.col_origin = i;
                cell.absolute_row = j;
                cell.absolute_col = i;
                row.push(cell);
            }
            rows.push(row);
        }
        let mut flipped = Table::from_rows(rows);
        flipped.name = self.name.clone();
        flipped.prefix_subject = self.prefix_subject.clone();
        flipped.direction = self.direction.map(UnfoldDirection::flipped);
        flipped.property_line_count = self.property_line_count;
        flipped.role = self.role;
        Ok(flipped)
    }

    pub fn delete_row(&mut self, index: usize) -> Result<(), TableError> {
        self.structural_check()?;
        if index >= self.row_count {
            return Err(TableError::RowOutOfRange(index));
        }
        self.rows.remove(index);
        self.recompute_layout();
        Ok(())
    }

    pub fn delete_col(&mut self, index: usize) -> Result<(), TableError> {
        self.structural_check()?;
        if index >= self.col_count {
            return Err(TableError::ColOutOfRange(index));
        }
        for row in &mut self.rows {
            row.remove(index);
        }
        self.recompute_layout();
        Ok(())
    }

    /// 判别展开方向
    ///
    /// 依次尝试：独占的th头部轴；行列数悬殊时的窄轴；
    /// 长度特征与类型特征各半加权后取低分轴；
    /// 打平时退到词类特征，再平则默认Row。
    /// 结果缓存，只判别一次。
    pub fn unfold_direction(&mut self, seg: &dyn Segmenter) -> Result<UnfoldDirection, TableError> {
        if let Some(d) = self.direction {
            return Ok(d);
        }
        self.structural_check()?;
        let first_row_headers = self.rows[0].iter().all(|c| c.is_header());
        let first_col_headers = self.rows.iter().all(|r| r[0].is_header());
        let direction = if first_row_headers && !first_col_headers {
            UnfoldDirection::Row
        } else if first_col_headers && !first_row_headers {
            UnfoldDirection::Col
        } else if self.row_count >= ASPECT_RATIO * self.col_count {
            UnfoldDirection::Col
        } else if self.col_count >= ASPECT_RATIO * self.row_count {
            UnfoldDirection::Row
        } else {
            let (len_row, len_col) = self.length_character();
            let (type_row, type_col) = self.type_character();
            let row_score = LENGTH_WEIGHT * len_row + TYPE_WEIGHT * type_row;
            let col_score = LENGTH_WEIGHT * len_col + TYPE_WEIGHT * type_col;
            if (row_score - col_score).abs() < f64::EPSILON {
                let (word_row, word_col) = self.word_class_character(seg);
                if word_col < word_row {
                    UnfoldDirection::Col
                } else {
                    UnfoldDirection::Row
                }
            } else if row_score < col_score {
                UnfoldDirection::Row
            } else {
                UnfoldDirection::Col
            }
        };
        self.direction = Some(direction);
        Ok(direction)
    }

    /// 长度特征：同一属性的取值长度相近。
    /// 行分值取各列内长度标准差的均值，列分值对称；两者归一化
    fn length_character(&self) -> (f64, f64) {
        let lengths: Vec<Vec<f64>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(|c| c.content.chars().count() as f64).collect())
            .collect();
        let row_raw = mean(
            (0..self.col_count)
                .map(|j| population_std(&lengths.iter().map(|r| r[j]).collect::<Vec<_>>())),
        );
        let col_raw = mean(lengths.iter().map(|r| population_std(r)));
        normalize_pair(row_raw, col_raw)
    }

    /// 类型特征：末行/末列当作数据样本，度量其余各线与它的
    /// 类型树距离均值；距离越小说明该轴方向上的线都是数据
    fn type_character(&self) -> (f64, f64) {
        let last_row: Vec<ContentType> = self.rows[self.row_count - 1]
            .iter()
            .map(|c| c.content_type)
            .collect();
        let row_raw = mean((0..self.row_count - 1).map(|i| {
            mean(
                self.rows[i]
                    .iter()
                    .zip(&last_row)
                    .map(|(c, t)| c.content_type.distance(*t) as f64),
            )
        }));
        let last_col: Vec<ContentType> = self
            .rows
            .iter()
            .map(|r| r[self.col_count - 1].content_type)
            .collect();
        let col_raw = mean((0..self.col_count - 1).map(|j| {
            mean(
                self.rows
                    .iter()
                    .zip(&last_col)
                    .map(|(r, t)| r[j].content_type.distance(*t) as f64),
            )
        }));
        normalize_pair(row_raw, col_raw)
    }

    /// 词类特征：与长度特征同构，只是把单元格换成词性序列长度
    fn word_class_character(&self, seg: &dyn Segmenter) -> (f64, f64) {
        let lengths: Vec<Vec<f64>> = self
            .rows
            .iter()
            .map(|r| {
                r.iter()
                    .map(|c| seg.pos_sequence(c.content.trim()).chars().count() as f64)
                    .collect()
            })
            .collect();
        let row_raw = mean(
            (0..self.col_count)
                .map(|j| population_std(&lengths.iter().map(|r| r[j]).collect::<Vec<_>>())),
        );
        let col_raw = mean(lengths.iter().map(|r| population_std(r)));
        normalize_pair(row_raw, col_raw)
    }

    /// 判别属性线条数
    ///
    /// 先数独占th的头部线；数目可疑（0、超过2或吞掉整轴）时
    /// 改数全字符类型的头部线；仍不可信则回落为1。
    /// 结果恒小于轴长，且缓存。
    pub fn discriminate_property_lines(&mut self) -> Result<usize, TableError> {
        if let Some(n) = self.property_line_count {
            return Ok(n);
        }
        self.structural_check()?;
        let direction = self.direction.ok_or(TableError::DirectionUnknown)?;
        let axis_len = match direction {
            UnfoldDirection::Row => self.row_count,
            UnfoldDirection::Col => self.col_count,
        };
        let mut n = self.count_leading_lines(direction, |c| c.is_header());
        if n == 0 || n > 2 || n >= axis_len {
            n = self.count_leading_lines(direction, |c| c.content_type.is_character_family());
            if n == 0 || n >= axis_len {
                n = 1;
            }
        }
        self.property_line_count = Some(n);
        Ok(n)
    }

    fn count_leading_lines<F>(&self, direction: UnfoldDirection, pred: F) -> usize
    where
        F: Fn(&TableCell) -> bool,
    {
        let axis_len = match direction {
            UnfoldDirection::Row => self.row_count,
            UnfoldDirection::Col => self.col_count,
        };
        let mut count = 0;
        for line in 0..axis_len {
            let all = match direction {
                UnfoldDirection::Row => self.rows[line].iter().all(&pred),
                UnfoldDirection::Col => self.rows.iter().all(|r| pred(&r[line])),
            };
            if all {
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    /// 属性名列表：取最后一条属性线上的内容
    pub fn property_names(&mut self) -> Result<Vec<String>, TableError> {
        let line = self.discriminate_property_lines()?;
        let direction = self.direction.ok_or(TableError::DirectionUnknown)?;
        let names = match direction {
            UnfoldDirection::Row => self.rows[line - 1]
                .iter()
                .map(|c| c.content.trim().to_string())
                .collect(),
            UnfoldDirection::Col => self
                .rows
                .iter()
                .map(|r| r[line - 1].content.trim().to_string())
                .collect(),
        };
        Ok(names)
    }

    /// 清洗表格
    ///
    /// 删掉序号线、末尾空白行和参考资料行，把纯标点格抹空；
    /// 最后重算所有单元格类型。清洗中若表格退化到不正规则提前收手。
    pub fn clean(&mut self) -> Result<(), TableError> {
        self.structural_check()?;
        let direction = self.direction.ok_or(TableError::DirectionUnknown)?;

        let names = self.property_names()?;
        if let Some(idx) = names.iter().position(|n| n == "序" || n == "序号") {
            match direction {
                UnfoldDirection::Row => self.delete_col(idx)?,
                UnfoldDirection::Col => self.delete_row(idx)?,
            }
        }

        if self.normal {
            let last_blank = self.rows[self.row_count - 1]
                .iter()
                .all(|c| c.content.chars().count() <= 1 || c.content.trim().is_empty());
            if last_blank {
                self.delete_row(self.row_count - 1)?;
            }
        }

        if self.normal {
            let reference_row = self.rows[self.row_count - 1]
                .first()
                .is_some_and(|c| c.content.contains("参考资料"));
            if reference_row {
                self.delete_row(self.row_count - 1)?;
            }
        }

        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if cell.content_type == ContentType::Punctuation {
                    cell.content.clear();
                }
                cell.reclassify();
            }
        }
        Ok(())
    }

    /// 内容网格转储，供回放缓存使用
    pub fn to_grid(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| r.iter().map(|c| c.content.clone()).collect())
            .collect()
    }
}

fn mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values {
        sum += v;
        n += 1;
    }
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn normalize_pair(a: f64, b: f64) -> (f64, f64) {
    let sum = a + b;
    if sum == 0.0 {
        (a, b)
    } else {
        (a / sum, b / sum)
    }
}
