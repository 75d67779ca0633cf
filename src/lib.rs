// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和词表加载
pub mod config;

/// 领域模块
///
/// 包含核心业务实体：边疆条目、页面、三元组
pub mod domain;

/// 引擎模块
///
/// 实现网页抓取引擎
pub mod engines;

/// 表格抽取模块
///
/// 表格定位、规范化、方向判别和三元组抽取
pub mod extract;

/// 基础设施模块
///
/// 提供外部服务集成：持久化队列存储、抽取结果下游
pub mod infrastructure;

/// 分词模块
///
/// 中文分词和词性标注的接口与实现
pub mod nlp;

/// 队列模块
///
/// 实现有界内存URL队列
pub mod queue;

/// 爬虫模块
///
/// URL去重和链接相关度过滤
pub mod spider;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现后台任务处理和工作器管理
pub mod workers;
