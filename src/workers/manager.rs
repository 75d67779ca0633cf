// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::lexicon::Lexicon;
use crate::config::settings::Settings;
use crate::domain::models::frontier::Lane;
use crate::engines::traits::FetchEngine;
use crate::extract::pipeline::TableExtractPipeline;
use crate::infrastructure::sink::ExtractionSink;
use crate::infrastructure::store::FrontierStore;
use crate::nlp::Segmenter;
use crate::queue::url_queue::LaneQueues;
use crate::spider::dedup::UrlDedup;
use crate::spider::relevance::LinkRelevanceFilter;
use crate::workers::extract_worker::ExtractWorker;
use crate::workers::fetch_worker::FetchWorker;
use crate::workers::flush_worker::{FlushCommand, FlushWorker};

/// 爬虫管理器
///
/// 装配并启动全部工作器：主通道抓取工作器若干、低置信度通道
/// 抓取工作器一个、落库工作器一个、抽取工作器一个。
/// 停止是协作式的：置停止标志并唤醒所有有界等待。
pub struct SpiderManager {
    settings: Settings,
    store: Arc<dyn FrontierStore>,
    engine: Arc<dyn FetchEngine>,
    segmenter: Arc<dyn Segmenter>,
    lexicon: Arc<Lexicon>,
    sink: Arc<ExtractionSink>,
    queues: Arc<LaneQueues>,
    running: Arc<AtomicBool>,
    fetched: Arc<AtomicU64>,
    handles: Vec<JoinHandle<()>>,
}

impl SpiderManager {
    pub fn new(
        settings: Settings,
        store: Arc<dyn FrontierStore>,
        engine: Arc<dyn FetchEngine>,
        segmenter: Arc<dyn Segmenter>,
        lexicon: Arc<Lexicon>,
        sink: Arc<ExtractionSink>,
    ) -> Self {
        let queues = Arc::new(LaneQueues::new(settings.spider.queue_capacity));
        Self {
            settings,
            store,
            engine,
            segmenter,
            lexicon,
            sink,
            queues,
            running: Arc::new(AtomicBool::new(false)),
            fetched: Arc::new(AtomicU64::new(0)),
            handles: Vec::new(),
        }
    }

    /// 启动全部工作器
    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.running.store(true, Ordering::Relaxed);
        let spider = self.settings.spider.clone();

        let filter = Arc::new(LinkRelevanceFilter::new(
            &spider.link_head,
            &spider.discriminant_path,
            spider.relevance_threshold,
            self.segmenter.clone(),
        )?);
        let mut dedup = UrlDedup::load_or_create(
            Path::new(&spider.bloom_path),
            spider.bloom_error_rate,
            spider.bloom_capacity,
        );

        let (flush_tx, flush_rx) = mpsc::unbounded_channel();

        // 种子进主通道，同时写入去重集，放不下的部分转溢出表
        let seeds = load_seeds(&spider.seed_path);
        let fresh = dedup.filter_new(seeds);
        info!(count = fresh.len(), "seeding frontier");
        let mut overflow = Vec::new();
        for url in fresh {
            if !self.queues.lane(Lane::Relevant).push(url.clone()) {
                overflow.push(url);
            }
        }
        if !overflow.is_empty() {
            let _ = flush_tx.send(FlushCommand {
                lane: Lane::Relevant,
                urls: overflow,
            });
        }
        if let Err(e) = dedup.persist() {
            warn!(error = %e, "bloom persist failed");
        }
        let dedup = Arc::new(Mutex::new(dedup));

        self.handles.push(tokio::spawn(
            FlushWorker::new(
                flush_rx,
                self.store.clone(),
                spider.flush_batch_size,
                Duration::from_millis(spider.flush_interval_ms),
            )
            .run(),
        ));

        let mut id = 0;
        for lane in [Lane::Relevant, Lane::LowConfidence] {
            let count = match lane {
                Lane::Relevant => spider.worker_count,
                Lane::LowConfidence => 1,
            };
            for _ in 0..count {
                let worker = FetchWorker::new(
                    id,
                    lane,
                    self.queues.clone(),
                    self.store.clone(),
                    self.engine.clone(),
                    filter.clone(),
                    dedup.clone(),
                    flush_tx.clone(),
                    self.running.clone(),
                    self.fetched.clone(),
                    spider.max_fetches,
                    spider.idle_ticks,
                );
                self.handles.push(tokio::spawn(worker.run()));
                id += 1;
            }
        }
        // flush_tx的本地份额就此释放，抓取工作器都退出后落库工作器随之收尾
        drop(flush_tx);

        let pipeline = TableExtractPipeline::new(
            self.lexicon.clone(),
            self.segmenter.clone(),
            self.settings.extract.clone(),
        );
        let extract_worker = ExtractWorker::new(
            self.store.clone(),
            self.sink.clone(),
            pipeline,
            self.settings.extract.queue_capacity,
            self.settings.extract.idle_ticks,
            self.running.clone(),
        );
        self.handles.push(tokio::spawn(extract_worker.run()));

        info!(workers = self.handles.len(), "spider manager started");
        Ok(())
    }

    /// 协作式停止：置标志并打断所有有界等待
    pub fn stop(&self) {
        info!("stopping spider manager");
        self.running.store(false, Ordering::Relaxed);
        self.queues.wake_all();
    }

    /// 等待全部工作器退出
    pub async fn join(&mut self) {
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task failed");
            }
        }
        info!("all workers shut down");
    }

    /// 运行到收到停止信号或所有工作器自然结束
    pub async fn wait_for_shutdown(&mut self) {
        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => info!("shutdown signal received"),
                        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
                    }
                    self.stop();
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(500)) => {
                    if self.handles.iter().all(|h| h.is_finished()) {
                        info!("all workers finished");
                        break;
                    }
                }
            }
        }
        self.join().await;
    }

    pub fn fetched_count(&self) -> u64 {
        self.fetched.load(Ordering::Relaxed)
    }
}

/// 种子文件：每行一个URL，#开头的行是注释
fn load_seeds(path: &str) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(raw) => raw
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| l.to_string())
            .collect(),
        Err(e) => {
            warn!(path, error = %e, "seed file unreadable, starting with empty frontier");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::{DatabaseSettings, ExtractSettings, FetchSettings, SpiderSettings};
    use crate::engines::traits::FetchError;
    use crate::infrastructure::store::SqliteStore;
    use crate::nlp::testing::StubSegmenter;
    use async_trait::async_trait;

    struct NoopEngine;

    #[async_trait]
    impl FetchEngine for NoopEngine {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            Err(FetchError::Http(404))
        }

        fn name(&self) -> &'static str {
            "noop"
        }
    }

    fn test_settings(dir: &std::path::Path) -> Settings {
        Settings {
            spider: SpiderSettings {
                worker_count: 1,
                queue_capacity: 16,
                max_fetches: 0,
                idle_ticks: 1,
                seed_path: dir.join("seeds.txt").to_string_lossy().into_owned(),
                bloom_path: dir.join("bloom.json").to_string_lossy().into_owned(),
                bloom_error_rate: 0.001,
                bloom_capacity: 1000,
                link_head: "https://baike.example.com".to_string(),
                discriminant_path: "/item/".to_string(),
                relevance_threshold: 0.8,
                flush_batch_size: 4,
                flush_interval_ms: 50,
                lexicon_dir: dir.join("lexicon").to_string_lossy().into_owned(),
            },
            fetch: FetchSettings {
                timeout_secs: 1,
                user_agents: vec!["test".to_string()],
            },
            database: DatabaseSettings {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            extract: ExtractSettings {
                queue_capacity: 8,
                idle_ticks: 1,
                replay_cache_size: 8,
                max_name_len: 7,
                link_ratio: 0.5,
                max_nested_tables: 3,
                max_scripts: 1,
                image_ratio: 0.5,
                person_info_overlap: 0.5,
            },
        }
    }

    #[tokio::test]
    async fn workers_exit_on_idle_frontier() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let sink = Arc::new(ExtractionSink::new(store.clone(), 4));
        let segmenter = Arc::new(StubSegmenter::new(&[], &[]));
        let mut manager = SpiderManager::new(
            test_settings(dir.path()),
            store,
            Arc::new(NoopEngine),
            segmenter,
            Arc::new(Lexicon::builtin()),
            sink,
        );
        manager.start().await.unwrap();
        // 没有种子：工作器在空闲预算耗尽后自行退出
        manager.join().await;
        assert_eq!(manager.fetched_count(), 0);
    }
}
