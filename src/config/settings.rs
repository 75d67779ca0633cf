// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含爬虫、抓取、数据库和表格抽取的所有配置项。
/// 启动时构造一次，之后以只读引用传递给各组件。
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 爬虫配置
    pub spider: SpiderSettings,
    /// 抓取配置
    pub fetch: FetchSettings,
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 表格抽取配置
    pub extract: ExtractSettings,
}

/// 爬虫配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SpiderSettings {
    /// 主通道抓取工作器数量
    pub worker_count: usize,
    /// 单条通道的内存队列容量
    pub queue_capacity: usize,
    /// 最大抓取次数，0 表示不限
    pub max_fetches: u64,
    /// 队列持续为空多少个轮询周期后工作器退出
    pub idle_ticks: u32,
    /// 种子链接文件路径（每行一个URL）
    pub seed_path: String,
    /// 布隆过滤器持久化路径
    pub bloom_path: String,
    /// 布隆过滤器误判率
    pub bloom_error_rate: f64,
    /// 布隆过滤器预估容量
    pub bloom_capacity: usize,
    /// 链接头，用于把相对路径合并为绝对URL
    pub link_head: String,
    /// 判别路径前缀，词条链接都在该前缀下
    pub discriminant_path: String,
    /// 相关度阈值，经验值，未做推导
    pub relevance_threshold: f64,
    /// 批量落库的批大小
    pub flush_batch_size: usize,
    /// 批量落库的最长等待间隔（毫秒）
    pub flush_interval_ms: u64,
    /// 词表目录
    pub lexicon_dir: String,
}

/// 抓取配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct FetchSettings {
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
    /// 轮换使用的 User-Agent 池
    pub user_agents: Vec<String>,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: u32,
}

/// 表格抽取配置设置
///
/// 噪声比例阈值来自原型系统的经验值，保留为可配置项
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractSettings {
    /// 抽取工作器的内存页面队列容量
    pub queue_capacity: usize,
    /// 页面持续为空多少个轮询周期后工作器退出
    pub idle_ticks: u32,
    /// 回放缓存保留的最近页面数
    pub replay_cache_size: usize,
    /// 人名、关系名的最大字符数
    pub max_name_len: usize,
    /// 超链接数与单元格数之比的上限
    pub link_ratio: f64,
    /// 嵌套表格数上限
    pub max_nested_tables: usize,
    /// 脚本标签数上限
    pub max_scripts: usize,
    /// 图片数与单元格数之比的上限
    pub image_ratio: f64,
    /// 个人信息表判定所需的属性重叠比例
    pub person_info_overlap: f64,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从默认值、可选配置文件和环境变量加载
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            .set_default("spider.worker_count", 4)?
            .set_default("spider.queue_capacity", 500)?
            .set_default("spider.max_fetches", 10_000)?
            .set_default("spider.idle_ticks", 100)?
            .set_default("spider.seed_path", "data/seeds.txt")?
            .set_default("spider.bloom_path", "data/url_bloom.json")?
            .set_default("spider.bloom_error_rate", 0.001)?
            .set_default("spider.bloom_capacity", 100_000)?
            .set_default("spider.link_head", "https://baike.baidu.com")?
            .set_default("spider.discriminant_path", "/item/")?
            .set_default("spider.relevance_threshold", 0.8)?
            .set_default("spider.flush_batch_size", 64)?
            .set_default("spider.flush_interval_ms", 500)?
            .set_default("spider.lexicon_dir", "config/lexicon")?
            .set_default("fetch.timeout_secs", 1)?
            .set_default(
                "fetch.user_agents",
                vec![
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
                    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15".to_string(),
                    "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
                ],
            )?
            .set_default("database.url", "sqlite://data/tableminer.db?mode=rwc")?
            .set_default("database.max_connections", 8)?
            .set_default("extract.queue_capacity", 200)?
            .set_default("extract.idle_ticks", 100)?
            .set_default("extract.replay_cache_size", 32)?
            .set_default("extract.max_name_len", 7)?
            .set_default("extract.link_ratio", 0.5)?
            .set_default("extract.max_nested_tables", 3)?
            .set_default("extract.max_scripts", 1)?
            .set_default("extract.image_ratio", 0.5)?
            .set_default("extract.person_info_overlap", 0.5)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("TABLEMINER").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_files() {
        let settings = Settings::new().expect("defaults should build");
        assert_eq!(settings.fetch.timeout_secs, 1);
        assert!((settings.spider.relevance_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(settings.spider.queue_capacity, 500);
        assert_eq!(settings.extract.max_name_len, 7);
        assert!(!settings.fetch.user_agents.is_empty());
    }
}
