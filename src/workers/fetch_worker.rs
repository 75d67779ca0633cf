// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::models::frontier::Lane;
use crate::engines::traits::FetchEngine;
use crate::infrastructure::store::FrontierStore;
use crate::queue::url_queue::LaneQueues;
use crate::spider::dedup::UrlDedup;
use crate::spider::relevance::LinkRelevanceFilter;
use crate::workers::flush_worker::FlushCommand;

/// 出队的有界等待，同时也是停止标志的响应粒度
const POLL_WAIT: Duration = Duration::from_millis(500);

/// 抓取工作器
///
/// 一条通道可有多个实例，共享该通道的内存队列。
/// 循环：队列低水位时从数据库溢出表补充 → 出队 → 抓取 →
/// 页面落库 → 页内链接分类、去重、入队与落库。
/// 页面级错误就地记录并跳过，循环不中断。
pub struct FetchWorker {
    id: usize,
    lane: Lane,
    queues: Arc<LaneQueues>,
    store: Arc<dyn FrontierStore>,
    engine: Arc<dyn FetchEngine>,
    filter: Arc<LinkRelevanceFilter>,
    dedup: Arc<Mutex<UrlDedup>>,
    flush_tx: mpsc::UnboundedSender<FlushCommand>,
    running: Arc<AtomicBool>,
    fetched: Arc<AtomicU64>,
    max_fetches: u64,
    idle_ticks: u32,
}

impl FetchWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        lane: Lane,
        queues: Arc<LaneQueues>,
        store: Arc<dyn FrontierStore>,
        engine: Arc<dyn FetchEngine>,
        filter: Arc<LinkRelevanceFilter>,
        dedup: Arc<Mutex<UrlDedup>>,
        flush_tx: mpsc::UnboundedSender<FlushCommand>,
        running: Arc<AtomicBool>,
        fetched: Arc<AtomicU64>,
        max_fetches: u64,
        idle_ticks: u32,
    ) -> Self {
        Self {
            id,
            lane,
            queues,
            store,
            engine,
            filter,
            dedup,
            flush_tx,
            running,
            fetched,
            max_fetches,
            idle_ticks,
        }
    }

    pub async fn run(self) {
        info!(id = self.id, lane = ?self.lane, engine = self.engine.name(), "fetch worker started");
        let queue = self.queues.lane(self.lane);
        let mut idle = 0u32;
        while self.running.load(Ordering::Relaxed) {
            if queue.needs_refill() {
                self.refill().await;
            }
            let Some(url) = queue.pop_timeout(POLL_WAIT).await else {
                idle += 1;
                if idle >= self.idle_ticks {
                    info!(id = self.id, lane = ?self.lane, "queue stayed empty, fetch worker exiting");
                    break;
                }
                continue;
            };
            idle = 0;
            if self.max_fetches > 0 {
                let n = self.fetched.fetch_add(1, Ordering::SeqCst);
                if n >= self.max_fetches {
                    info!(limit = self.max_fetches, "fetch limit reached, stopping");
                    self.running.store(false, Ordering::Relaxed);
                    self.queues.wake_all();
                    break;
                }
            }
            self.process_url(&url).await;
        }
        info!(id = self.id, lane = ?self.lane, "fetch worker stopped");
    }

    /// 从数据库溢出表补充内存队列
    async fn refill(&self) {
        let queue = self.queues.lane(self.lane);
        let amount = queue.refill_amount();
        if amount == 0 {
            return;
        }
        match self.store.dequeue_urls(self.lane, amount as u32).await {
            Ok(urls) => {
                if !urls.is_empty() {
                    debug!(lane = ?self.lane, count = urls.len(), "queue refilled from store");
                }
                for url in urls {
                    // 刚出队就放不下说明有并发补充者，放回溢出表
                    if !queue.push(url.clone()) {
                        let _ = self.flush_tx.send(FlushCommand {
                            lane: self.lane,
                            urls: vec![url],
                        });
                    }
                }
            }
            Err(e) => warn!(lane = ?self.lane, error = %e, "refill failed, will retry"),
        }
    }

    /// 抓取并处理单个URL
    pub async fn process_url(&self, url: &str) {
        let html = match self.engine.fetch(url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url, error = %e, "fetch failed, page skipped");
                return;
            }
        };
        if let Err(e) = self.store.insert_page(url, &html).await {
            warn!(url, error = %e, "page persist failed");
        }

        let (relevant, low_confidence) = self.filter.classify(&html);
        let (fresh_relevant, fresh_low) = {
            let mut dedup = self.dedup.lock().await;
            let fresh_relevant = dedup.filter_new(relevant);
            let fresh_low = dedup.filter_new(low_confidence);
            if let Err(e) = dedup.persist() {
                warn!(error = %e, "bloom persist failed");
            }
            (fresh_relevant, fresh_low)
        };
        debug!(
            url,
            relevant = fresh_relevant.len(),
            low_confidence = fresh_low.len(),
            "links discovered"
        );
        self.enqueue(Lane::Relevant, fresh_relevant);
        self.enqueue(Lane::LowConfidence, fresh_low);
    }

    /// 新URL先进内存队列，放不下的溢出到数据库表，
    /// 之后由补充流程捞回
    fn enqueue(&self, lane: Lane, urls: Vec<String>) {
        let queue = self.queues.lane(lane);
        let mut overflow = Vec::new();
        for url in urls {
            if !queue.push(url.clone()) {
                overflow.push(url);
            }
        }
        if overflow.is_empty() {
            return;
        }
        if let Err(e) = self.flush_tx.send(FlushCommand {
            lane,
            urls: overflow,
        }) {
            warn!(error = %e, "flush channel closed");
        }
    }
}
