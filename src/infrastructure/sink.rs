// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::domain::models::triple::{EntityRecord, PageExtraction, RelationshipTriple};
use crate::infrastructure::store::{FrontierStore, StoreError};

/// 抽取结果下游
///
/// 每处理完一页就向图谱摄取队列写一行JSON，
/// 同时保留最近N页的回放包供界面复查。
pub struct ExtractionSink {
    store: Arc<dyn FrontierStore>,
    replay: Mutex<VecDeque<PageExtraction>>,
    replay_capacity: usize,
}

impl ExtractionSink {
    pub fn new(store: Arc<dyn FrontierStore>, replay_capacity: usize) -> Self {
        Self {
            store,
            replay: Mutex::new(VecDeque::with_capacity(replay_capacity)),
            replay_capacity,
        }
    }

    /// 输出单页抽取结果
    pub async fn emit(&self, bundle: PageExtraction) -> Result<(), StoreError> {
        if !bundle.entities.is_empty() || !bundle.relationships.is_empty() {
            let entities_json = to_json(&bundle.entities);
            let relationships_json = to_json(&bundle.relationships);
            self.store
                .insert_extraction(&bundle.url, &entities_json, &relationships_json)
                .await?;
        }

        let mut replay = self.replay.lock();
        if self.replay_capacity == 0 {
            return Ok(());
        }
        while replay.len() >= self.replay_capacity {
            replay.pop_front();
        }
        replay.push_back(bundle);
        Ok(())
    }

    /// 最近处理的页面回放包，新者在后
    pub fn recent(&self) -> Vec<PageExtraction> {
        self.replay.lock().iter().cloned().collect()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        warn!("extraction serialization failed: {}", e);
        "[]".to_string()
    })
}

// 便于在类型标注处直接使用
pub type Entities = Vec<EntityRecord>;
pub type Relationships = Vec<RelationshipTriple>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::triple::NameAndUrl;
    use crate::infrastructure::store::SqliteStore;

    fn bundle(url: &str, with_entity: bool) -> PageExtraction {
        let entities = if with_entity {
            vec![EntityRecord::new(NameAndUrl::bare("张三"))]
        } else {
            Vec::new()
        };
        PageExtraction {
            url: url.to_string(),
            tables: Vec::new(),
            entities,
            relationships: Vec::new(),
        }
    }

    #[tokio::test]
    async fn replay_cache_is_bounded() {
        let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let sink = ExtractionSink::new(store, 2);
        for i in 0..4 {
            sink.emit(bundle(&format!("https://x/item/{i}"), false))
                .await
                .unwrap();
        }
        let recent = sink.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].url, "https://x/item/2");
        assert_eq!(recent[1].url, "https://x/item/3");
    }

    #[tokio::test]
    async fn empty_results_skip_the_store() {
        let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let sink = ExtractionSink::new(store.clone(), 4);
        sink.emit(bundle("https://x/item/a", false)).await.unwrap();
        sink.emit(bundle("https://x/item/b", true)).await.unwrap();
        // 回放包两页都有，但入库的只有带结果的那页
        assert_eq!(sink.recent().len(), 2);
    }
}
