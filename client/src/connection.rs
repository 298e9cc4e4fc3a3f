use std::{
    io,
    net::{IpAddr, Ipv4Addr, TcpListener, TcpStream, UdpSocket},
};

use anyhow::Context;
use log::{info, warn};
use termpong_shared::{GameConfig, Peer, Role};

pub const DEFAULT_PORT: u16 = 12345;

/// A connected, greeted peer.
pub struct Connection {
    pub peer: Peer<TcpStream>,
    pub opponent_name: String,
}

/// Waits for exactly one player to join on `port`.
pub fn host(
    port: u16,
    config: &GameConfig,
    local_name: &str,
    local_wins: u32,
) -> anyhow::Result<Connection> {
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
        .with_context(|| format!("failed to listen on port {port}"))?;
    println!("Hosting on {}:{port}", local_ip());
    println!("Waiting for an opponent to join...");
    let (stream, addr) = listener.accept().context("failed to accept an opponent")?;
    info!("opponent connected from {addr}");
    greet(stream, Role::Host, config, local_name, local_wins)
}

pub fn join(
    host: &str,
    port: u16,
    config: &GameConfig,
    local_name: &str,
    local_wins: u32,
) -> anyhow::Result<Connection> {
    println!("Connecting to {host}:{port}...");
    let stream = TcpStream::connect((host, port))
        .with_context(|| format!("failed to connect to {host}:{port}"))?;
    info!("connected to {host}:{port}");
    greet(stream, Role::Client, config, local_name, local_wins)
}

fn greet(
    stream: TcpStream,
    role: Role,
    config: &GameConfig,
    local_name: &str,
    local_wins: u32,
) -> anyhow::Result<Connection> {
    configure(&stream, config).context("failed to configure the connection")?;
    let mut peer = Peer::new(stream, role, Some(local_wins));
    let opponent_name = peer
        .handshake(local_name)
        .context("failed to exchange player names")?;
    info!("playing against {opponent_name} as {role:?}");
    Ok(Connection {
        peer,
        opponent_name,
    })
}

fn configure(stream: &TcpStream, config: &GameConfig) -> io::Result<()> {
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(config.net_timeout))?;
    stream.set_write_timeout(Some(config.net_timeout))
}

/// The address other machines on the LAN can reach us at. Connecting a UDP socket only picks a
/// route, no packet is sent.
fn local_ip() -> IpAddr {
    let probe = || -> io::Result<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(("8.8.8.8", 80))?;
        Ok(socket.local_addr()?.ip())
    };
    probe().unwrap_or_else(|err| {
        warn!("could not determine local address: {err}");
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    })
}
