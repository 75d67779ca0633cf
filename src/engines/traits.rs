// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use thiserror::Error;

/// 抓取错误类型
///
/// 所有变体都在工作器内部就地恢复：记录日志、跳过页面、继续运行
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("请求超时")]
    Timeout,

    #[error("HTTP状态异常: {0}")]
    Http(u16),

    #[error("连接失败: {0}")]
    Connection(String),

    #[error("其他抓取错误: {0}")]
    Other(String),
}

/// 抓取引擎接口
///
/// 一次HTTP GET：超时、User-Agent轮换由实现负责，返回解码后的页面
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// 抓取单个URL，返回解码后的HTML
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}
