//! Bridgehlo Client Demo
//!
//! Connects to a bridgehlo server, creates a game, subscribes to its
//! events, and logs what comes back. Meant as a smoke test against a real
//! server, not as a library entry point.

use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use bridgehlo_client::client::BridgeClient;
use bridgehlo_client::config::ClientConfig;
use bridgehlo_client::events::{EventDemultiplexer, EventReceiver};
use bridgehlo_client::transport::{SocketKind, Transport};
use bridgehlo_client::VERSION;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    info!("bridgehlo-client v{}", VERSION);

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "no usable configuration in the environment, exiting");
            return;
        }
    };

    if let Err(e) = demo_game(&config).await {
        warn!(error = %e, "demo run failed");
    }
}

async fn demo_game(config: &ClientConfig) -> bridgehlo_client::Result<()> {
    let ctx = zmq::Context::new();

    info!(endpoint = %config.command_endpoint, "connecting command channel");
    let client = BridgeClient::connect(&ctx, &config.command_endpoint, config.curve_keys.as_ref()).await?;
    info!("handshake complete");

    let game_id = client.game(None, None).await?;
    info!(%game_id, "created game");

    let (event_transport, inbound) =
        Transport::connect(&ctx, SocketKind::Sub, &config.event_endpoint, config.curve_keys.as_ref())?;
    let demux = EventDemultiplexer::new(EventReceiver::new(
        bridgehlo_client::client::ZmqTransport::new(event_transport, inbound),
    ));
    let mut subscriber = demux.subscribe(game_id);

    let (returned_game, position) = client.join(Some(game_id), None, None).await?;
    info!(%returned_game, ?position, "joined game");

    while let Some(event) = subscriber.get_event().await {
        info!(?event, "received event");
    }

    client.close();
    Ok(())
}
