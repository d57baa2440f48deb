use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use url::Url;

use janus_proto::{IceCandidate, Jsep};
use parley_client::{
    ClientConfig, HttpTransport, RoomConnectParams, RoomParameters, SignalingEvents,
    VideoRoomClient,
};

#[derive(Parser, Debug)]
#[command(name = "parley")]
struct Args {
    /// Gateway root endpoint
    #[arg(long, default_value = "http://127.0.0.1:8088/janus")]
    gateway: Url,
    /// Room to join
    #[arg(long, default_value_t = 1234)]
    room: u64,
    /// Display name announced to the room
    #[arg(long, default_value = "parley")]
    display: String,
    /// Echo offers and candidates back locally instead of negotiating
    #[arg(long, default_value = "false")]
    loopback: bool,
}

struct LogEvents;

impl SignalingEvents for LogEvents {
    fn on_connected_to_room(&self, params: &RoomParameters) {
        info!(
            room = params.room,
            publisher = params.publisher_id,
            "connected to room"
        );
    }

    fn on_remote_description(&self, jsep: &Jsep) {
        info!(kind = ?jsep.kind, bytes = jsep.sdp.len(), "remote description");
    }

    fn on_remote_ice_candidate(&self, candidate: &IceCandidate) {
        info!(mid = %candidate.sdp_mid, "remote candidate");
    }

    fn on_channel_error(&self, description: &str) {
        error!(%description, "channel error");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    info!(gateway = %args.gateway, room = args.room, "starting parley");

    let transport = Arc::new(HttpTransport::new(args.gateway)?);
    let client = VideoRoomClient::new(transport, Arc::new(LogEvents), ClientConfig::default());
    client.connect(RoomConnectParams {
        room: args.room,
        display: args.display,
        loopback: args.loopback,
    });

    signal::ctrl_c().await?;
    info!("shutting down");
    client.disconnect();
    Ok(())
}
