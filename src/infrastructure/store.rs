// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::config::settings::DatabaseSettings;
use crate::domain::models::frontier::Lane;
use crate::domain::models::page::FetchedPage;

/// 存储错误类型
///
/// 事务失败时放弃本轮补充/排空，下一个循环重试
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
}

/// 持久化边疆存储接口
///
/// 三张逻辑队列表：待抓取URL（按通道分表）、已抓取页面。
/// 出队必须把查询与删除放在同一事务内，避免两个工作器取到相同行。
#[async_trait]
pub trait FrontierStore: Send + Sync {
    /// 批量写入URL到指定通道的溢出表
    async fn insert_urls(&self, lane: Lane, urls: &[String]) -> Result<(), StoreError>;

    /// 原子出队至多 `limit` 个URL（查询+删除在一个事务内）
    async fn dequeue_urls(&self, lane: Lane, limit: u32) -> Result<Vec<String>, StoreError>;

    /// 写入待抽取页面
    async fn insert_page(&self, url: &str, html: &str) -> Result<(), StoreError>;

    /// 原子出队至多 `limit` 个待抽取页面
    async fn dequeue_pages(&self, limit: u32) -> Result<Vec<FetchedPage>, StoreError>;

    /// 写入单页的抽取结果（实体与关系的JSON串）
    async fn insert_extraction(
        &self,
        url: &str,
        entities_json: &str,
        relationships_json: &str,
    ) -> Result<(), StoreError>;
}

/// SQLite边疆存储实现
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// 建立连接池并确保表结构存在
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// 供测试使用的内存库
    pub async fn connect_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        for ddl in [
            "CREATE TABLE IF NOT EXISTS pending_url (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS low_confidence_url (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS person_page (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                html TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS entity_relationship (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL,
                entities TEXT,
                relationships TEXT
            )",
        ] {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// 边疆中尚未抓取的URL数量
    pub async fn pending_count(&self, lane: Lane) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) AS c FROM {}", lane.table_name());
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        Ok(row.get::<i64, _>("c"))
    }
}

#[async_trait]
impl FrontierStore for SqliteStore {
    async fn insert_urls(&self, lane: Lane, urls: &[String]) -> Result<(), StoreError> {
        if urls.is_empty() {
            return Ok(());
        }
        let sql = format!("INSERT INTO {} (url) VALUES (?)", lane.table_name());
        let mut tx = self.pool.begin().await?;
        for url in urls {
            sqlx::query(&sql).bind(url).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn dequeue_urls(&self, lane: Lane, limit: u32) -> Result<Vec<String>, StoreError> {
        let table = lane.table_name();
        let mut tx = self.pool.begin().await?;
        let select = format!("SELECT url FROM {table} ORDER BY id LIMIT ?");
        let rows = sqlx::query(&select)
            .bind(limit as i64)
            .fetch_all(&mut *tx)
            .await?;
        let delete =
            format!("DELETE FROM {table} WHERE id IN (SELECT id FROM {table} ORDER BY id LIMIT ?)");
        sqlx::query(&delete)
            .bind(limit as i64)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("url")).collect())
    }

    async fn insert_page(&self, url: &str, html: &str) -> Result<(), StoreError> {
        if html.is_empty() {
            return Ok(());
        }
        sqlx::query("INSERT INTO person_page (url, html) VALUES (?, ?)")
            .bind(url)
            .bind(html)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn dequeue_pages(&self, limit: u32) -> Result<Vec<FetchedPage>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query("SELECT url, html FROM person_page ORDER BY id LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM person_page WHERE id IN (SELECT id FROM person_page ORDER BY id LIMIT ?)",
        )
        .bind(limit as i64)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rows
            .iter()
            .map(|r| FetchedPage {
                url: r.get::<String, _>("url"),
                html: r.get::<String, _>("html"),
            })
            .collect())
    }

    async fn insert_extraction(
        &self,
        url: &str,
        entities_json: &str,
        relationships_json: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO entity_relationship (url, entities, relationships) VALUES (?, ?, ?)")
            .bind(url)
            .bind(entities_json)
            .bind(relationships_json)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dequeue_removes_claimed_rows() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        let urls: Vec<String> = (0..5).map(|i| format!("https://x/item/{i}")).collect();
        store.insert_urls(Lane::Relevant, &urls).await.unwrap();

        let first = store.dequeue_urls(Lane::Relevant, 3).await.unwrap();
        assert_eq!(first, urls[0..3].to_vec());

        let second = store.dequeue_urls(Lane::Relevant, 10).await.unwrap();
        assert_eq!(second, urls[3..5].to_vec());

        assert!(store.dequeue_urls(Lane::Relevant, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lanes_are_independent() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        store
            .insert_urls(Lane::Relevant, &["https://x/item/a".to_string()])
            .await
            .unwrap();
        store
            .insert_urls(Lane::LowConfidence, &["https://x/item/b".to_string()])
            .await
            .unwrap();

        assert_eq!(store.pending_count(Lane::Relevant).await.unwrap(), 1);
        assert_eq!(store.pending_count(Lane::LowConfidence).await.unwrap(), 1);

        let low = store.dequeue_urls(Lane::LowConfidence, 5).await.unwrap();
        assert_eq!(low, vec!["https://x/item/b".to_string()]);
        assert_eq!(store.pending_count(Lane::Relevant).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn pages_round_trip() {
        let store = SqliteStore::connect_in_memory().await.unwrap();
        store.insert_page("https://x/item/a", "<html></html>").await.unwrap();
        // 空页面不入库
        store.insert_page("https://x/item/b", "").await.unwrap();

        let pages = store.dequeue_pages(10).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "https://x/item/a");
        assert!(store.dequeue_pages(10).await.unwrap().is_empty());
    }
}
