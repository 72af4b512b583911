// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Ember Sandbox
// Drives a resource context through loads, preloads, pooling and a
// visibility change, then prints the final report.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ember_sdk::prelude::*;

const CONFIG: &str = r#"{
    "cache": { "max_size": 32, "default_ttl": 60000 },
    "monitor": { "sample_interval": 250, "memory_ceiling_bytes": 1073741824 },
    "loader": { "retry_count": 2, "retry_delay": 100 }
}"#;

#[derive(Debug)]
struct Asset {
    name: String,
    bytes: Vec<u8>,
}

/// Pretends to download `name`. The first `flaky_attempts` calls fail.
async fn fetch(name: &str, attempts: &AtomicU32, flaky_attempts: u32) -> Result<Asset> {
    let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
    tokio::time::sleep(Duration::from_millis(20 + 5 * name.len() as u64)).await;
    if attempt <= flaky_attempts {
        bail!("connection reset on attempt {attempt}");
    }
    Ok(Asset {
        name: name.to_owned(),
        bytes: name.bytes().cycle().take(256).collect(),
    })
}

type AssetFuture = Pin<Box<dyn Future<Output = Result<Asset, LoadFailure>> + Send>>;

fn asset_loader(
    name: &'static str,
    flaky_attempts: u32,
) -> impl Fn(CancellationToken) -> AssetFuture + Send + Sync + 'static {
    let attempts = Arc::new(AtomicU32::new(0));
    move |_token| {
        let attempts = Arc::clone(&attempts);
        Box::pin(async move {
            let asset = fetch(name, &attempts, flaky_attempts)
                .await
                .with_context(|| format!("fetching '{name}'"))?;
            Ok::<_, LoadFailure>(asset)
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    ember_sdk::init_logging();

    let config = EmberConfig::from_json_str(CONFIG).context("parsing sandbox configuration")?;
    let context: ResourceContext<Asset> = ResourceContext::new(config)?;
    context.monitor().add_listener(|event| log::info!("[Sandbox] {}", event));
    context.start();

    context.loader().update_network(NetworkInfo {
        connection_class: ConnectionClass::Wifi,
        effective_type: EffectiveType::G4,
        downlink_mbps: 25.0,
        ..NetworkInfo::default()
    });

    let logo = context
        .loader()
        .load(
            "logo",
            asset_loader("logo", 0),
            LoadOptions::default().with_priority(LoadPriority::Immediate),
        )
        .await?;
    log::info!("Loaded '{}' ({} bytes).", logo.name, logo.bytes.len());

    let flaky = context
        .loader()
        .load(
            "avatar",
            asset_loader("avatar", 1),
            LoadOptions::default()
                .with_dependencies(["logo"])
                .with_cache_priority(CachePriority::High),
        )
        .await?;
    log::info!("Loaded '{}' after a retry.", flaky.name);

    let again = context
        .loader()
        .load("logo", asset_loader("logo", 0), LoadOptions::default())
        .await?;
    log::info!(
        "Second 'logo' load served from cache: {}.",
        Arc::ptr_eq(&logo, &again)
    );

    for position in [0.0, 120.0, 250.0, 370.0, 500.0] {
        context.loader().record_scroll(position);
    }
    context.loader().record_interaction("gallery");
    let gallery = ["thumb-1", "thumb-2", "thumb-3", "thumb-4", "thumb-5"];
    let items = gallery
        .iter()
        .map(|&name| (name.to_owned(), asset_loader(name, 0)))
        .collect();
    let options = PreloadOptions {
        use_intelligent_priority: true,
        ..PreloadOptions::default()
    };
    match context.loader().preload_if_predicted(items, options).await {
        Some(results) => {
            let loaded = results.iter().filter(|result| result.is_ok()).count();
            log::info!("Preloaded {}/{} gallery thumbnails.", loaded, results.len());
        }
        None => log::info!("No confident prediction, gallery preload skipped."),
    }

    let buffers = context
        .pools()
        .create("scratch", || Vec::<u8>::with_capacity(4096), 8);
    for _ in 0..4 {
        let mut buffer = context.pools().acquire(&buffers);
        buffer.extend_from_slice(&logo.bytes);
        context.pools().release(&buffers, buffer);
    }

    {
        let _timer = context.monitor().time_render("gallery");
        for _ in 0..30 {
            context.monitor().record_frame();
        }
    }

    let background = {
        let loader = context.loader().clone();
        tokio::spawn(async move {
            loader
                .load(
                    "analytics",
                    asset_loader("analytics", 0),
                    LoadOptions::default().with_priority(LoadPriority::Background),
                )
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    context.loader().set_visible(false);
    match background.await? {
        Err(error) if error.is_cancelled() => {
            log::info!("Background load cancelled while hidden.")
        }
        other => log::info!(
            "Background load finished anyway: {:?}.",
            other.map(|asset| asset.name.clone())
        ),
    }
    context.loader().set_visible(true);

    tokio::time::sleep(Duration::from_millis(600)).await;
    println!("{}", context.report_json()?);

    context.stop();
    Ok(())
}
