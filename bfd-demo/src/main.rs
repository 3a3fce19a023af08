//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

mod config;

use bfd_engine::{Engine, Notifier, Role};
use clap::Parser;
use config::{Config, LoggingStyle};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "BFD session engine demo")]
struct Cli {
    /// Specify an alternative configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,
}

/// Prints every session notification to stdout, standing in for whatever
/// routing protocol or controller would otherwise react to it.
struct PrintNotifier;

impl Notifier for PrintNotifier {
    fn bfd_session_notify(&self, instance: &str, remote: &str, role: Role) {
        info!(%instance, %remote, %role, "session notification");
    }
}

fn init_tracing(logging: &config::Logging) {
    let env_filter = EnvFilter::builder()
        .with_default_directive("bfd_demo=info,bfd_engine=info".parse().unwrap())
        .from_env_lossy();

    let stdout = logging.stdout.enabled.then(|| {
        let layer = tracing_subscriber::fmt::layer().with_target(false);
        match logging.stdout.style {
            LoggingStyle::Compact => layer.compact().boxed(),
            LoggingStyle::Full => layer.boxed(),
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    init_tracing(&config.logging);

    // Abort the process if any spawned task panics, rather than limping
    // along with a half-running engine.
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    info!("starting up");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime")
        .block_on(run(config));
}

async fn run(config: Config) {
    let engine = Engine::new(config.engine)
        .await
        .expect("failed to bind the engine's listener");

    let peer = &config.peer;
    if let Err(error) = engine
        .admit(
            &peer.remote_ip,
            peer.port,
            peer.tx_interval_us,
            peer.detect_multiplier,
            "bfd-demo",
            std::sync::Arc::new(PrintNotifier),
        )
        .await
    {
        warn!(%error, remote = %peer.remote_ip, "failed to admit peer");
        return;
    }

    info!(remote = %peer.remote_ip, "peer admitted, waiting for ctrl-c");
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
}
