// src/main.rs
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{info, warn};

use l2feed::config::AppConfig;
use l2feed::feed::MarketDataFeed;
use l2feed::metrics;
use l2feed::sim::SimSource;
use l2feed::source::MarketDataSource;
use l2feed::store::SecurityStore;
use l2feed::types::SecurityId;

fn main() -> anyhow::Result<()> {
    let cfg_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    // Load config before logger to allow JSON formatting choice
    let cfg = AppConfig::load_or_default(&cfg_path)?;

    if cfg.general.json_logs {
        let mut b = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
        b.format(|buf, record| {
            use std::io::Write;
            let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
            writeln!(buf, "{{\"ts\":\"{}\",\"level\":\"{}\",\"target\":\"{}\",\"msg\":\"{}\"}}",
                ts, record.level(), record.target(), record.args().to_string().replace('"', "'"))
        }).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!("loaded config: {:?}", cfg);

    let source = Arc::new(SimSource::new(cfg.sim.clone()));
    let store = Arc::new(SecurityStore::new());
    let feed = Arc::new(MarketDataFeed::new(
        source.clone() as Arc<dyn MarketDataSource>,
        store.clone(),
        cfg.feed.clone(),
    ));

    {
        let feed = feed.clone();
        ctrlc::set_handler(move || {
            info!("shutdown signal received");
            feed.stop();
        })?;
    }

    let metrics_handle = cfg.metrics.as_ref().map(|m| metrics::spawn_http(m.bind.clone()));

    if !feed.start() {
        anyhow::bail!("failed to start market data feed");
    }

    for symbol in &cfg.symbols {
        let id = SecurityId::new(symbol);
        if feed.subscribe(id) {
            info!("subscribed {symbol}");
        } else {
            warn!("failed to subscribe {symbol}");
        }
    }

    while feed.is_running() {
        thread::sleep(Duration::from_millis(cfg.general.stats_interval_ms));

        let stats = feed.statistics();
        use std::sync::atomic::Ordering;
        info!(
            "produced={} consumed={} ring_full={} ring_empty={} yields={} avg_latency_ns={:.0} max_latency_ns={} ring_util={:.3} securities={}",
            stats.messages_produced.load(Ordering::Relaxed),
            stats.messages_consumed.load(Ordering::Relaxed),
            stats.ring_full_events.load(Ordering::Relaxed),
            stats.ring_empty_events.load(Ordering::Relaxed),
            stats.consumer_yields.load(Ordering::Relaxed),
            stats.average_latency_ns(),
            stats.max_latency_ns.load(Ordering::Relaxed),
            feed.ring_utilization(),
            store.size(),
        );
        metrics::publish(stats, feed.ring_utilization(), store.size());
    }

    // Gracefully stop metrics HTTP (poke /shutdown and join)
    if let Some(m) = &cfg.metrics {
        metrics::request_http_shutdown(&m.bind);
    }
    if let Some(h) = metrics_handle {
        let _ = h.join();
    }
    info!("clean shutdown");
    Ok(())
}
