use clap::Parser;
use gopen_gateway::{cache, client::HyperTransport, Gopen, GatewayServer};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "gopen-gateway")]
struct Args {
    /// Listen port; falls back to GOPEN_PORT, then the config file.
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long)]
    config: String,
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let gopen = match Gopen::from_file(&args.config) {
        Ok(gopen) => gopen,
        Err(err) => {
            tracing::error!("Failed to load config: {err:#}");
            std::process::exit(1);
        }
    };

    let port = args
        .port
        .or_else(|| std::env::var("GOPEN_PORT").ok().and_then(|p| p.parse().ok()))
        .or(gopen.port)
        .unwrap_or(8080);

    let store = match cache::create_store(gopen.store.as_ref()) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!("Failed to create cache store: {err:#}");
            std::process::exit(1);
        }
    };

    let server = match GatewayServer::new(gopen, Arc::new(HyperTransport::new()), Arc::clone(&store)) {
        Ok(server) => server,
        Err(err) => {
            tracing::error!("Failed to build server: {err:#}");
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = server.run(port) => {
            if let Err(err) = result {
                tracing::error!("Server failed: {err:#}");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            if let Err(err) = store.close() {
                tracing::warn!("Failed to close cache store: {err:#}");
            }
        }
    }
}
