use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use phiremock::Dispatcher;
use phiremock::config::{Cli, Config};
use phiremock::loader::{DiskExpectationSource, load_into};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::resolve(Cli::parse())?;
    phiremock::tracing::init_tracing(config.debug);

    let dispatcher = Arc::new(Dispatcher::new());
    if let Some(dir) = &config.expectations_dir {
        let source = DiskExpectationSource::new(dir);
        let loaded = load_into(&source, &dispatcher.expectations)?;
        tracing::info!("loaded {loaded} expectations from {}", dir.display());
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("cannot bind {}", config.bind_addr()))?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    match &config.tls {
        Some(tls) => {
            if tls.cert_passphrase.is_some() {
                tracing::warn!(
                    "encrypted private keys are not supported; cert-passphrase is ignored"
                );
            }
            #[cfg(feature = "tls")]
            phiremock::serve_tls(
                listener,
                dispatcher,
                &tls.certificate,
                &tls.certificate_key,
                shutdown_rx,
            )
            .await?;
            #[cfg(not(feature = "tls"))]
            anyhow::bail!("TLS options require a build with the tls feature");
        }
        None => phiremock::serve(listener, dispatcher, shutdown_rx).await?,
    }
    Ok(())
}
