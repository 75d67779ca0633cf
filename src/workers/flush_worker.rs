// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::models::frontier::Lane;
use crate::infrastructure::store::FrontierStore;

/// 待落库的一批新URL
#[derive(Debug)]
pub struct FlushCommand {
    pub lane: Lane,
    pub urls: Vec<String>,
}

/// 落库工作器
///
/// 抓取工作器把新发现的URL发到通道里，这里按通道攒批，
/// 批满或定时器到期时写入数据库溢出表。
/// 写失败保留缓冲，下次继续重试。
pub struct FlushWorker {
    rx: mpsc::UnboundedReceiver<FlushCommand>,
    store: Arc<dyn FrontierStore>,
    batch_size: usize,
    interval: Duration,
}

impl FlushWorker {
    pub fn new(
        rx: mpsc::UnboundedReceiver<FlushCommand>,
        store: Arc<dyn FrontierStore>,
        batch_size: usize,
        interval: Duration,
    ) -> Self {
        Self {
            rx,
            store,
            batch_size,
            interval,
        }
    }

    /// 运行到所有发送端关闭为止，退出前冲洗残留缓冲
    pub async fn run(mut self) {
        info!("flush worker started");
        let mut buffers: HashMap<Lane, Vec<String>> = HashMap::new();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                command = self.rx.recv() => {
                    match command {
                        Some(command) => {
                            let buffer = buffers.entry(command.lane).or_default();
                            buffer.extend(command.urls);
                            if buffer.len() >= self.batch_size {
                                flush_lane(self.store.as_ref(), command.lane, &mut buffers).await;
                            }
                        }
                        None => break,
                    }
                }
                _ = ticker.tick() => {
                    flush_all(self.store.as_ref(), &mut buffers).await;
                }
            }
        }
        flush_all(self.store.as_ref(), &mut buffers).await;
        info!("flush worker stopped");
    }
}

async fn flush_all(store: &dyn FrontierStore, buffers: &mut HashMap<Lane, Vec<String>>) {
    for lane in [Lane::Relevant, Lane::LowConfidence] {
        flush_lane(store, lane, buffers).await;
    }
}

async fn flush_lane(store: &dyn FrontierStore, lane: Lane, buffers: &mut HashMap<Lane, Vec<String>>) {
    let Some(buffer) = buffers.get_mut(&lane) else {
        return;
    };
    if buffer.is_empty() {
        return;
    }
    match store.insert_urls(lane, buffer).await {
        Ok(()) => {
            debug!(lane = ?lane, count = buffer.len(), "urls flushed");
            buffer.clear();
        }
        Err(e) => {
            warn!(lane = ?lane, error = %e, "flush failed, keeping buffer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::SqliteStore;

    #[tokio::test]
    async fn flushes_on_batch_and_on_close() {
        let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = FlushWorker::new(rx, store.clone(), 2, Duration::from_secs(60));
        let handle = tokio::spawn(worker.run());

        tx.send(FlushCommand {
            lane: Lane::Relevant,
            urls: vec!["https://x/item/a".to_string(), "https://x/item/b".to_string()],
        })
        .unwrap();
        tx.send(FlushCommand {
            lane: Lane::LowConfidence,
            urls: vec!["https://x/item/c".to_string()],
        })
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(store.pending_count(Lane::Relevant).await.unwrap(), 2);
        assert_eq!(store.pending_count(Lane::LowConfidence).await.unwrap(), 1);
    }
}
