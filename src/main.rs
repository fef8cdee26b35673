//! ofwire - IPv6 multicast control message inspector
//!
//! Reads raw IPv6 packets from a TCP peer and logs every decoded message.

use clap::{Parser, Subcommand};
use ofwire_protocol::{Icmpv6, Ipv6Packet, Ipv6Payload};
use ofwire_stream::{Ipv6Parser, MessageStream, StreamConfig, StreamError};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ofwire")]
#[command(about = "Decode IPv6, ICMPv6 and MLD messages from a TCP byte stream")]
#[command(version)]
struct Cli {
    /// YAML stream configuration
    #[arg(short, long, env = "OFWIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Stop after this many messages per connection
    #[arg(short = 'n', long)]
    max_messages: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a peer and decode what it sends
    Connect {
        /// Peer address
        addr: SocketAddr,
    },
    /// Accept connections and decode what each peer sends
    Listen {
        /// Bind address
        #[arg(default_value = "127.0.0.1:7600")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration (file first, then env overrides)
    let config = match &cli.config {
        Some(path) => {
            let mut config = StreamConfig::from_file(path).map_err(|e| {
                tracing::error!("Failed to load config: {}", e);
                e
            })?;
            config.apply_env_overrides();
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        None => StreamConfig::load()?,
    };
    tracing::info!(
        "  Read buffer: {} bytes, inbound capacity: {}, max message: {} bytes",
        config.read_buffer_size,
        config.inbound_capacity,
        config.max_message_size
    );

    match cli.command {
        Commands::Connect { addr } => {
            let conn = TcpStream::connect(addr).await?;
            conn.set_nodelay(true).ok();
            tracing::info!("Connected to {}", addr);
            watch(conn, addr, config, cli.max_messages).await;
        }
        Commands::Listen { addr } => {
            let listener = TcpListener::bind(addr).await?;
            tracing::info!("Listening on {}", listener.local_addr()?);
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        let (conn, peer) = accepted?;
                        tracing::info!("Peer connected: {}", peer);
                        let config = config.clone();
                        let max_messages = cli.max_messages;
                        tokio::spawn(async move {
                            watch(conn, peer, config, max_messages).await;
                        });
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Received shutdown signal, stopping");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Logs every message from one connection until it ends.
async fn watch(conn: TcpStream, peer: SocketAddr, config: StreamConfig, limit: Option<usize>) {
    let mut stream = MessageStream::with_config(conn, Ipv6Parser, config);
    let mut count = 0usize;

    while let Some(item) = stream.recv().await {
        match item {
            Ok(packet) => {
                count += 1;
                tracing::info!("[{}] #{} {}", peer, count, describe(&packet));
                if limit.is_some_and(|max| count >= max) {
                    tracing::info!("[{}] Message limit reached", peer);
                    break;
                }
            }
            Err(StreamError::ConnectionClosed) => {
                tracing::info!("[{}] Connection closed", peer);
            }
            Err(e) => {
                tracing::error!("[{}] Stream ended: {}", peer, e);
            }
        }
    }

    stream.close().await;
    tracing::info!("[{}] {} message(s) decoded", peer, count);
}

/// One-line summary of a packet and its payload.
fn describe(packet: &Ipv6Packet) -> String {
    let chain: Vec<String> = packet
        .extensions
        .iter()
        .map(|ext| format!("{:#04x}", ext.code()))
        .collect();
    let payload = match &packet.payload {
        Ipv6Payload::Icmpv6(Icmpv6::Echo(echo)) => format!(
            "ICMPv6 echo {} id={} seq={} ({} bytes)",
            if echo.is_request() { "request" } else { "reply" },
            echo.identifier,
            echo.sequence,
            echo.data.len()
        ),
        Ipv6Payload::Icmpv6(Icmpv6::MldQuery(query)) => format!(
            "MLD query group={} sources={}",
            query.multicast_address(),
            query.sources().len()
        ),
        Ipv6Payload::Icmpv6(Icmpv6::Mld(mld)) => format!(
            "MLD type={} group={}",
            mld.header.icmp_type, mld.multicast_address
        ),
        Ipv6Payload::Icmpv6(Icmpv6::Mldv2Report(report)) => {
            format!("MLDv2 report records={}", report.records.len())
        }
        Ipv6Payload::Icmpv6(Icmpv6::Unknown { header, body }) => format!(
            "ICMPv6 type={} code={} ({} bytes)",
            header.icmp_type,
            header.code,
            body.len()
        ),
        Ipv6Payload::Udp(udp) => format!(
            "UDP {} -> {} ({} bytes)",
            udp.src_port,
            udp.dst_port,
            udp.payload.len()
        ),
        Ipv6Payload::Raw { next_header, data } => {
            format!("protocol {} ({} bytes)", next_header, data.len())
        }
    };
    format!(
        "{} -> {} hop_limit={} chain=[{}] {}",
        packet.source,
        packet.destination,
        packet.hop_limit,
        chain.join(","),
        payload
    )
}
