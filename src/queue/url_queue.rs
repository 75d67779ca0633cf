// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

/// 有界内存URL队列
///
/// 每条通道一个实例，由该通道的全部工作器共享。
/// 队满时入队失败（数据库溢出表仍持有该URL）；
/// 出队只做有界等待，以便及时响应停止标志。
pub struct UrlQueue {
    inner: Mutex<VecDeque<String>>,
    capacity: usize,
    notify: Notify,
}

impl UrlQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            notify: Notify::new(),
        }
    }

    /// 入队，队满时返回false
    pub fn push(&self, url: String) -> bool {
        let mut inner = self.inner.lock();
        if inner.len() >= self.capacity {
            return false;
        }
        inner.push_back(url);
        drop(inner);
        self.notify.notify_one();
        true
    }

    pub fn try_pop(&self) -> Option<String> {
        self.inner.lock().pop_front()
    }

    /// 有界等待出队：等待期满仍无元素则返回None
    pub async fn pop_timeout(&self, wait: Duration) -> Option<String> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(url) = self.try_pop() {
                return Some(url);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let notified = self.notify.notified();
            if tokio::time::timeout(deadline - now, notified).await.is_err() {
                return self.try_pop();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 低于容量1/10时从数据库补充
    pub fn needs_refill(&self) -> bool {
        self.len() < self.capacity / 10
    }

    /// 补充到容量的一半
    pub fn refill_amount(&self) -> usize {
        (self.capacity / 2).saturating_sub(self.len())
    }

    /// 唤醒所有等待者（用于停止时打断有界等待）
    pub fn wake_all(&self) {
        self.notify.notify_waiters();
    }
}

/// 两条通道的队列对
pub struct LaneQueues {
    relevant: UrlQueue,
    low_confidence: UrlQueue,
}

impl LaneQueues {
    pub fn new(capacity: usize) -> Self {
        Self {
            relevant: UrlQueue::new(capacity),
            low_confidence: UrlQueue::new(capacity),
        }
    }

    pub fn lane(&self, lane: crate::domain::models::frontier::Lane) -> &UrlQueue {
        match lane {
            crate::domain::models::frontier::Lane::Relevant => &self.relevant,
            crate::domain::models::frontier::Lane::LowConfidence => &self.low_confidence,
        }
    }

    pub fn wake_all(&self) {
        self.relevant.wake_all();
        self.low_confidence.wake_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_respects_capacity() {
        let q = UrlQueue::new(2);
        assert!(q.push("a".into()));
        assert!(q.push("b".into()));
        assert!(!q.push("c".into()));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn refill_thresholds() {
        let q = UrlQueue::new(500);
        assert!(q.needs_refill());
        assert_eq!(q.refill_amount(), 250);
        for i in 0..50 {
            q.push(format!("u{i}"));
        }
        assert!(!q.needs_refill());
        assert_eq!(q.refill_amount(), 200);
    }

    #[tokio::test]
    async fn pop_timeout_returns_none_when_empty() {
        let q = UrlQueue::new(4);
        assert!(q.pop_timeout(Duration::from_millis(20)).await.is_none());
    }

    #[tokio::test]
    async fn pop_timeout_sees_concurrent_push() {
        let q = std::sync::Arc::new(UrlQueue::new(4));
        let q2 = q.clone();
        let waiter = tokio::spawn(async move { q2.pop_timeout(Duration::from_secs(2)).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        q.push("hello".into());
        assert_eq!(waiter.await.unwrap().as_deref(), Some("hello"));
    }
}
