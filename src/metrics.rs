// src/metrics.rs
use once_cell::sync::Lazy;
use prometheus::{Encoder, Gauge, IntGauge, Registry, TextEncoder};
use std::net::ToSocketAddrs;
use std::thread;

use crate::feed::Statistics;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static MESSAGES_PRODUCED: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("feed_messages_produced", "Messages pushed into the ring")
        .expect("feed_messages_produced");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static MESSAGES_CONSUMED: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("feed_messages_consumed", "Messages applied to the store")
        .expect("feed_messages_consumed");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static RING_FULL_EVENTS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("feed_ring_full_events", "Messages dropped on backpressure")
        .expect("feed_ring_full_events");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static RING_EMPTY_EVENTS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("feed_ring_empty_events", "Consumer polls that found no message")
        .expect("feed_ring_empty_events");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static CONSUMER_YIELDS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("feed_consumer_yields", "Consumer sleeps on an empty ring")
        .expect("feed_consumer_yields");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static AVG_LATENCY_NS: Lazy<Gauge> = Lazy::new(|| {
    let g = Gauge::new("feed_avg_latency_ns", "Average produce-to-apply latency")
        .expect("feed_avg_latency_ns");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static MAX_LATENCY_NS: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("feed_max_latency_ns", "Maximum produce-to-apply latency")
        .expect("feed_max_latency_ns");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static RING_UTILIZATION: Lazy<Gauge> = Lazy::new(|| {
    let g = Gauge::new("feed_ring_utilization", "Ring occupancy in [0, 1]")
        .expect("feed_ring_utilization");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static ACTIVE_SECURITIES: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("store_active_securities", "Active slots in the security store")
        .expect("store_active_securities");
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

/// Samples the feed counters into the exported gauges. Called from the
/// stats loop, never from the hot path.
pub fn publish(stats: &Statistics, ring_utilization: f64, active_securities: usize) {
    use std::sync::atomic::Ordering;
    MESSAGES_PRODUCED.set(stats.messages_produced.load(Ordering::Relaxed) as i64);
    MESSAGES_CONSUMED.set(stats.messages_consumed.load(Ordering::Relaxed) as i64);
    RING_FULL_EVENTS.set(stats.ring_full_events.load(Ordering::Relaxed) as i64);
    RING_EMPTY_EVENTS.set(stats.ring_empty_events.load(Ordering::Relaxed) as i64);
    CONSUMER_YIELDS.set(stats.consumer_yields.load(Ordering::Relaxed) as i64);
    AVG_LATENCY_NS.set(stats.average_latency_ns());
    MAX_LATENCY_NS.set(stats.max_latency_ns.load(Ordering::Relaxed) as i64);
    RING_UTILIZATION.set(ring_utilization);
    ACTIVE_SECURITIES.set(active_securities as i64);
}

pub fn spawn_http<A: ToSocketAddrs + Send + 'static>(addr: A) -> thread::JoinHandle<()> {
    let addr_string = addr
        .to_socket_addrs()
        .ok()
        .and_then(|mut it| it.next())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "0.0.0.0:9090".to_string());

    thread::spawn(move || {
        let server = tiny_http::Server::http(&addr_string).expect("start metrics http");
        log::info!("prometheus metrics listening on http://{addr_string}/metrics");
        let encoder = TextEncoder::new();
        loop {
            if let Ok(req) = server.recv() {
                let url = req.url().to_string();
                if url == "/metrics" {
                    let metric_families = REGISTRY.gather();
                    let mut buf = Vec::with_capacity(16 * 1024);
                    encoder.encode(&metric_families, &mut buf).ok();
                    let resp = tiny_http::Response::from_data(buf)
                        .with_status_code(200)
                        .with_header(
                            tiny_http::Header::from_bytes(
                                &b"Content-Type"[..],
                                &b"text/plain; version=0.0.4"[..],
                            )
                            .unwrap(),
                        );
                    let _ = req.respond(resp);
                } else if url == "/live" || url == "/healthz" {
                    let _ =
                        req.respond(tiny_http::Response::from_string("OK").with_status_code(200));
                } else if url == "/ready" {
                    let _ = req
                        .respond(tiny_http::Response::from_string("READY").with_status_code(200));
                } else if url == "/shutdown" {
                    let _ =
                        req.respond(tiny_http::Response::from_string("BYE").with_status_code(200));
                    break;
                } else {
                    let _ = req.respond(tiny_http::Response::empty(404));
                }
            }
        }
    })
}

/// Pokes /shutdown so `spawn_http` returns and can be joined.
pub fn request_http_shutdown(addr: &str) {
    use std::io::Write;
    if let Ok(mut s) = std::net::TcpStream::connect(addr) {
        let _ = s.write_all(b"GET /shutdown HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        let _ = s.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn publish_samples_counters() {
        let stats = Statistics::new();
        stats.messages_produced.store(10, Ordering::Relaxed);
        stats.messages_consumed.store(8, Ordering::Relaxed);
        stats.total_latency_ns.store(800, Ordering::Relaxed);
        stats.max_latency_ns.store(500, Ordering::Relaxed);

        publish(&stats, 0.25, 3);
        assert_eq!(MESSAGES_PRODUCED.get(), 10);
        assert_eq!(MESSAGES_CONSUMED.get(), 8);
        assert_eq!(MAX_LATENCY_NS.get(), 500);
        assert_eq!(ACTIVE_SECURITIES.get(), 3);
        assert!((AVG_LATENCY_NS.get() - 100.0).abs() < 1e-9);
        assert!((RING_UTILIZATION.get() - 0.25).abs() < 1e-9);
    }
}
