// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use growable_bloom_filter::GrowableBloom;
use tracing::warn;

/// URL去重集
///
/// 可扩容布隆过滤器：无漏判，误判率有界。
/// 一个URL一旦写入就永远不会再次入队。
/// 调用方负责串行化写入（单写者），每处理完一页持久化一次，
/// 崩溃最多丢失一页的去重状态。
pub struct UrlDedup {
    bloom: GrowableBloom,
    path: Option<PathBuf>,
}

impl UrlDedup {
    /// 仅内存，不持久化（测试用）
    pub fn in_memory(error_rate: f64, capacity: usize) -> Self {
        Self {
            bloom: GrowableBloom::new(error_rate, capacity),
            path: None,
        }
    }

    /// 从磁盘恢复；文件缺失或损坏时重新开始
    pub fn load_or_create(path: &Path, error_rate: f64, capacity: usize) -> Self {
        let bloom = match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<GrowableBloom>(&raw) {
                Ok(bloom) => bloom,
                Err(e) => {
                    warn!("corrupt bloom file {}, starting fresh: {}", path.display(), e);
                    GrowableBloom::new(error_rate, capacity)
                }
            },
            Err(_) => GrowableBloom::new(error_rate, capacity),
        };
        Self {
            bloom,
            path: Some(path.to_path_buf()),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.bloom.contains(url)
    }

    /// 过滤出尚未见过的URL，并把它们写入过滤器
    pub fn filter_new<I>(&mut self, urls: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut fresh = Vec::new();
        for url in urls {
            if !self.bloom.contains(&url) {
                self.bloom.insert(&url);
                fresh.push(url);
            }
        }
        fresh
    }

    /// 原子持久化：先写临时文件再重命名
    pub fn persist(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&self.bloom)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_filtered_out() {
        let mut dedup = UrlDedup::in_memory(0.001, 100);
        let fresh = dedup.filter_new(vec!["a".to_string(), "b".to_string(), "a".to_string()]);
        assert_eq!(fresh, vec!["a".to_string(), "b".to_string()]);

        // 再次提交已见过的URL，幂等：什么都不会出来
        let fresh = dedup.filter_new(vec!["a".to_string(), "b".to_string()]);
        assert!(fresh.is_empty());
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bloom.json");
        {
            let mut dedup = UrlDedup::load_or_create(&path, 0.001, 100);
            dedup.filter_new(vec!["https://x/item/a".to_string()]);
            dedup.persist().unwrap();
        }
        let dedup = UrlDedup::load_or_create(&path, 0.001, 100);
        assert!(dedup.contains("https://x/item/a"));
        assert!(!dedup.contains("https://x/item/b"));
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bloom.json");
        fs::write(&path, "not json").unwrap();
        let dedup = UrlDedup::load_or_create(&path, 0.001, 100);
        assert!(!dedup.contains("anything"));
    }
}
