use clap::Parser;
use std::net::SocketAddr;
use tach_targets::sink;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{error, info, warn, Level};

/// Listens for Graphite (TCP) and StatsD (UDP) traffic and logs every metric.
#[derive(Parser, Debug)]
#[command(name = "metric_sink", version)]
struct Args {
    /// Graphite plaintext listener
    #[arg(long, default_value = "127.0.0.1:2003")]
    graphite: SocketAddr,

    /// StatsD listener
    #[arg(long, default_value = "127.0.0.1:8125")]
    statsd: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let listener = TcpListener::bind(args.graphite).await?;
    let socket = UdpSocket::bind(args.statsd).await?;

    info!("Graphite sink listening on {}", args.graphite);
    info!("StatsD sink listening on {}", args.statsd);

    tokio::select! {
        result = serve_graphite(listener) => result,
        result = serve_statsd(socket) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

async fn serve_graphite(listener: TcpListener) -> anyhow::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!("New connection from {}", peer);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, peer).await {
                        error!("Error handling connection: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr) -> anyhow::Result<()> {
    let mut lines = BufReader::new(stream).lines();
    let mut received = 0u64;

    while let Some(line) = lines.next_line().await? {
        report(peer, &line);
        received += 1;
    }

    info!("Connection from {} closed. Lines received: {}", peer, received);
    Ok(())
}

async fn serve_statsd(socket: UdpSocket) -> anyhow::Result<()> {
    let mut buffer = vec![0u8; 65_535];

    loop {
        let (n, peer) = socket.recv_from(&mut buffer).await?;
        let datagram = String::from_utf8_lossy(&buffer[..n]);
        for line in datagram.lines() {
            report(peer, line);
        }
    }
}

fn report(peer: SocketAddr, line: &str) {
    match sink::parse_line(line) {
        Some(metric) => {
            let metric = serde_json::to_string(&metric).unwrap_or_default();
            info!(%peer, %metric, "Received metric");
        }
        None if line.trim().is_empty() => {}
        None => warn!(%peer, line, "Unrecognised metric line"),
    }
}
