// src/udp.rs
// Minimal UDP sending socket. The pipeline core does not depend on this;
// the udp_blast tool uses it to put generated messages on the wire.
use anyhow::Context;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, ToSocketAddrs};

pub struct UdpSender {
    sock: Socket,
}

impl UdpSender {
    pub fn new() -> anyhow::Result<Self> {
        let sock =
            Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket")?;
        Ok(Self { sock })
    }

    pub fn set_send_buffer(&self, bytes: usize) -> anyhow::Result<()> {
        self.sock
            .set_send_buffer_size(bytes)
            .context("set send buffer")
    }

    pub fn enable_reuseaddr(&self) -> anyhow::Result<()> {
        self.sock.set_reuse_address(true).context("set reuseaddr")
    }

    pub fn bind_any(&self, port: u16) -> anyhow::Result<()> {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        self.sock.bind(&addr.into()).context("bind")
    }

    pub fn send_to(&self, buf: &[u8], dst: SocketAddrV4) -> anyhow::Result<usize> {
        self.sock
            .send_to(buf, &SocketAddr::V4(dst).into())
            .context("send_to")
    }
}

/// Numeric IPv4 first, then DNS; IPv4 results only.
pub fn resolve_destination(host: &str, port: u16) -> anyhow::Result<SocketAddrV4> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(SocketAddrV4::new(ip, port));
    }
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("resolve {host}"))?
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .with_context(|| format!("no IPv4 address for {host}"))
}
