use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use a3s_bridge::cli::Cli;
use a3s_bridge::{Dispatcher, InitGate, McpServer, ResponseCache};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.options.bridge_config();

    // stdout carries the protocol; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    config.validate()?;
    let backend = cli.command.build_backend(&config)?;

    let cache = Arc::new(match config.cache_max_entries {
        Some(max) => ResponseCache::bounded(max),
        None => ResponseCache::new(),
    });
    let gate = Arc::new(
        InitGate::new(backend.clone(), config.init_timeout())
            .with_poll_interval(config.poll_interval()),
    );

    // Fail fast instead of serving a backend that never came up
    gate.await_ready().await?;

    let dispatcher = Arc::new(
        Dispatcher::new(backend, cache, gate.clone()).with_issue_domain(cli.command.issue_domain()),
    );
    let server = McpServer::new(dispatcher);

    let served = server.serve_stdio().await;
    gate.shutdown().await;
    served?;

    Ok(())
}
