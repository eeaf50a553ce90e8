// Streams simulator-generated L2 messages to a UDP destination. Handy for
// feeding downstream consumers or eyeballing the wire format with tcpdump.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use zerocopy::AsBytes;

use l2feed::sim::{SimConfig, SimSource};
use l2feed::source::MarketDataSource;
use l2feed::types::{MarketDataL2Message, SecurityId};
use l2feed::udp::{resolve_destination, UdpSender};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 5 {
        eprintln!("usage: udp_blast <host> <port> <symbol> <seconds> [interval_us]");
        std::process::exit(2);
    }
    let host = &args[1];
    let port: u16 = args[2].parse()?;
    let symbol = &args[3];
    let seconds: u64 = args[4].parse()?;
    let interval_us: u32 = args
        .get(5)
        .and_then(|s| s.parse().ok())
        .unwrap_or(100);

    let dest = resolve_destination(host, port)?;
    let sender = UdpSender::new()?;
    sender.set_send_buffer(1 << 20)?;

    let source = SimSource::new(SimConfig {
        update_interval_us: interval_us,
        ..SimConfig::default()
    });

    let sent = Arc::new(AtomicU64::new(0));
    {
        let sent = sent.clone();
        source.set_callback(Arc::new(move |message: &MarketDataL2Message| {
            if sender.send_to(message.as_bytes(), dest).is_ok() {
                sent.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    if !source.subscribe(SecurityId::new(symbol)) {
        anyhow::bail!("failed to subscribe {symbol}");
    }
    if !source.start() {
        anyhow::bail!("failed to start simulator");
    }

    let start = std::time::Instant::now();
    std::thread::sleep(std::time::Duration::from_secs(seconds));
    source.stop();

    eprintln!(
        "sent {} messages in {:?}",
        sent.load(Ordering::Relaxed),
        start.elapsed()
    );
    Ok(())
}
