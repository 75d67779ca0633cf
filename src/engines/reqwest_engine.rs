// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::Client;

use crate::config::settings::FetchSettings;
use crate::engines::traits::{FetchEngine, FetchError};

/// 抓取引擎
///
/// 基于reqwest实现的HTTP抓取引擎，带严格超时和User-Agent轮换
pub struct ReqwestEngine {
    client: Client,
    user_agents: Vec<String>,
    timeout: Duration,
}

impl ReqwestEngine {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| FetchError::Other(e.to_string()))?;
        Ok(Self {
            client,
            user_agents: settings.user_agents.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        })
    }

    fn pick_user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::rng())
            .map(|s| s.as_str())
            .unwrap_or("tableminer/0.1")
    }
}

#[async_trait]
impl FetchEngine for ReqwestEngine {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, self.pick_user_agent())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http(status.as_u16()));
        }

        response.text().await.map_err(classify_error)
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

fn classify_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Connection(e.to_string())
    } else if let Some(status) = e.status() {
        FetchError::Http(status.as_u16())
    } else {
        FetchError::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> FetchSettings {
        FetchSettings {
            timeout_secs: 1,
            user_agents: vec!["ua-a".to_string(), "ua-b".to_string()],
        }
    }

    #[test]
    fn engine_builds_and_rotates_agents() {
        let engine = ReqwestEngine::new(&test_settings()).unwrap();
        assert_eq!(engine.name(), "reqwest");
        let ua = engine.pick_user_agent();
        assert!(ua == "ua-a" || ua == "ua-b");
    }

    #[tokio::test]
    async fn connection_errors_are_classified() {
        let engine = ReqwestEngine::new(&test_settings()).unwrap();
        // 保留地址，连接必然失败
        let err = engine.fetch("http://127.0.0.1:1/none").await.unwrap_err();
        match err {
            FetchError::Connection(_) | FetchError::Timeout | FetchError::Other(_) => {}
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
