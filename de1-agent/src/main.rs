mod gatt;
mod server;
mod session;

use clap::Parser;
use log::info;
use tokio::sync::mpsc;

use server::Server;

#[derive(Parser)]
#[command(name = "de1-agent")]
#[command(about = "DE1 simulator radio agent: BLE peripheral driven over TCP")]
struct Cli {
    /// Control link port
    #[arg(short, long, default_value_t = de1_proto::DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    info!("de1-agent v{}", env!("CARGO_PKG_VERSION"));

    let (events_tx, events_rx) = mpsc::channel(64);
    let mut peripheral = gatt::Peripheral::new(events_tx).await?;

    // Advertise from boot, whether or not a controller ever attaches.
    peripheral.advertise().await?;

    let server = Server::bind(cli.port, peripheral, events_rx).await?;
    server.run().await
}
