// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::models::page::FetchedPage;
use crate::extract::pipeline::TableExtractPipeline;
use crate::infrastructure::sink::ExtractionSink;
use crate::infrastructure::store::FrontierStore;

/// 页面队列的轮询间隔，也是停止标志的响应粒度
const POLL_WAIT: Duration = Duration::from_millis(500);

/// 抽取工作器
///
/// 从页面表批量领取已抓取页面，跑表格抽取流水线，把结果交给下游。
/// 页面处理是纯CPU操作，单页失败不影响批内其余页面。
pub struct ExtractWorker {
    store: Arc<dyn FrontierStore>,
    sink: Arc<ExtractionSink>,
    pipeline: TableExtractPipeline,
    queue_capacity: usize,
    idle_ticks: u32,
    running: Arc<AtomicBool>,
}

impl ExtractWorker {
    pub fn new(
        store: Arc<dyn FrontierStore>,
        sink: Arc<ExtractionSink>,
        pipeline: TableExtractPipeline,
        queue_capacity: usize,
        idle_ticks: u32,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            sink,
            pipeline,
            queue_capacity,
            idle_ticks,
            running,
        }
    }

    pub async fn run(self) {
        info!("extract worker started");
        let batch = (self.queue_capacity / 2).max(1);
        let mut pending: VecDeque<FetchedPage> = VecDeque::new();
        let mut idle = 0u32;
        loop {
            // 已领取的页面先处理完，停止时也不丢
            if let Some(page) = pending.pop_front() {
                idle = 0;
                let bundle = self.pipeline.process_page(&page.url, &page.html);
                if let Err(e) = self.sink.emit(bundle).await {
                    warn!(url = page.url, error = %e, "extraction persist failed");
                }
                continue;
            }
            if !self.running.load(Ordering::Relaxed) {
                break;
            }
            match self.store.dequeue_pages(batch as u32).await {
                Ok(pages) => pending.extend(pages),
                Err(e) => warn!(error = %e, "page dequeue failed, will retry"),
            }
            if pending.is_empty() {
                idle += 1;
                if idle >= self.idle_ticks {
                    info!("no more pages, extract worker exiting");
                    break;
                }
                tokio::time::sleep(POLL_WAIT).await;
            }
        }
        info!("extract worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::lexicon::Lexicon;
    use crate::config::settings::ExtractSettings;
    use crate::infrastructure::store::SqliteStore;
    use crate::nlp::testing::StubSegmenter;

    fn limits() -> ExtractSettings {
        ExtractSettings {
            queue_capacity: 8,
            idle_ticks: 1,
            replay_cache_size: 8,
            max_name_len: 7,
            link_ratio: 0.5,
            max_nested_tables: 3,
            max_scripts: 1,
            image_ratio: 0.5,
            person_info_overlap: 0.5,
        }
    }

    #[tokio::test]
    async fn drains_pages_and_emits_bundles() {
        let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let sink = Arc::new(ExtractionSink::new(store.clone(), 8));
        let segmenter = Arc::new(StubSegmenter::new(&["张三"], &["中文名", "职业"]));
        let pipeline =
            TableExtractPipeline::new(Arc::new(Lexicon::builtin()), segmenter, limits());

        let html = r#"<table>
            <tr><th>中文名</th><th>职业</th></tr>
            <tr><td>张三</td><td>教师</td></tr>
        </table>"#;
        store
            .insert_page("https://baike.example.com/item/%E5%BC%A0%E4%B8%89", html)
            .await
            .unwrap();

        let worker = ExtractWorker::new(
            store.clone(),
            sink.clone(),
            pipeline,
            8,
            1,
            Arc::new(AtomicBool::new(true)),
        );
        worker.run().await;

        // 页面表排空，回放缓存拿到结果
        assert!(store.dequeue_pages(10).await.unwrap().is_empty());
        let recent = sink.recent();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].entities.len(), 1);
        assert_eq!(recent[0].entities[0].who.name, "张三");
    }
}
