//! Echo backend server.
//!
//! Usage: `backend <PORT>`

use std::net::SocketAddr;

use clap::Parser;
use tcp_balancer::echo::EchoServer;
use tcp_balancer::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "backend")]
#[command(about = "Echo backend with a /health endpoint", long_about = None)]
struct Cli {
    /// Port on which to listen
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init("info");

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let server = EchoServer::bind(addr).await?;
    println!("Backend server listening on port: {}", cli.port);

    server.run().await;
    Ok(())
}
