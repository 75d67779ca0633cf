// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 边疆通道
///
/// 相关链接走主通道，低置信度链接走探索通道。
/// 两条通道各自拥有独立的内存队列和数据库溢出表。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lane {
    /// 人名识别判定为相关的链接
    Relevant,
    /// 未通过相关度阈值、但符合宽松保留条件的链接
    LowConfidence,
}

impl Lane {
    /// 对应的数据库溢出表名
    pub fn table_name(&self) -> &'static str {
        match self {
            Lane::Relevant => "pending_url",
            Lane::LowConfidence => "low_confidence_url",
        }
    }
}
