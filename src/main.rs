// Copyright (c) 2025 tableminer contributors
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use tableminer::config::lexicon::Lexicon;
use tableminer::config::settings::Settings;
use tableminer::engines::reqwest_engine::ReqwestEngine;
use tableminer::engines::traits::FetchEngine;
use tableminer::infrastructure::sink::ExtractionSink;
use tableminer::infrastructure::store::{FrontierStore, SqliteStore};
use tableminer::nlp::{JiebaSegmenter, Segmenter};
use tableminer::utils::telemetry;
use tableminer::workers::manager::SpiderManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_telemetry();
    info!("Starting tableminer...");

    let settings = Settings::new()?;
    let store: Arc<dyn FrontierStore> = Arc::new(SqliteStore::connect(&settings.database).await?);
    let lexicon = Arc::new(Lexicon::load(Path::new(&settings.spider.lexicon_dir)));
    let segmenter: Arc<dyn Segmenter> = Arc::new(JiebaSegmenter::new());
    let engine: Arc<dyn FetchEngine> = Arc::new(ReqwestEngine::new(&settings.fetch)?);
    let sink = Arc::new(ExtractionSink::new(
        store.clone(),
        settings.extract.replay_cache_size,
    ));

    let mut manager = SpiderManager::new(settings, store, engine, segmenter, lexicon, sink);
    manager.start().await?;
    manager.wait_for_shutdown().await;

    info!("tableminer exited cleanly");
    Ok(())
}
