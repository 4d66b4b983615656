//! synapse-operator
//!
//! Runs the controllers that keep Synapse homeservers, their workers and the
//! Riot web client converged, and serves health endpoints for the kubelet.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use synop_operator::{
    config::Config,
    controller::Operator,
    crds,
    health::{self, HealthState},
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "synapse-operator", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the controllers (default).
    Run(RunArgs),
    /// Print the CustomResourceDefinitions as YAML.
    Crds,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Only watch records in this namespace.
    #[arg(long, env = "SYNOP_WATCH_NAMESPACE")]
    namespace: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Crds => {
            print!("{}", crds::crd_documents()?);
            Ok(())
        }
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = Config::from_env()?;
    if args.namespace.is_some() {
        config.watch_namespace = args.namespace;
    }

    // Initialize tracing (prefer RUST_LOG, fallback to SYNOP_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting synapse operator");
    info!(
        health_addr = %config.health_addr,
        namespace = config.watch_namespace.as_deref().unwrap_or("<all>"),
        "Configuration loaded"
    );

    let client = match kube::Client::try_default().await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(e.into());
        }
    };

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let health_state = HealthState::new();

    let operator = Operator::new(client, config.watch_namespace.clone(), config.retry);
    let mut operator_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        let health_state = health_state.clone();
        async move {
            operator.run(shutdown_rx, health_state).await;
        }
    });

    let app = health::routes(health_state);
    let listener = tokio::net::TcpListener::bind(&config.health_addr).await?;
    info!(addr = %config.health_addr, "Serving health endpoints");

    let mut server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("Health server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => info!("Health server exited"),
                Ok(Err(e)) => error!(error = %e, "Health server error"),
                Err(e) => error!(error = %e, "Health server task panicked"),
            }
        }
        result = &mut operator_handle => {
            if let Err(e) = result {
                error!(error = %e, "Controller task panicked");
            }
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for controllers to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);

    if !operator_handle.is_finished()
        && tokio::time::timeout(shutdown_timeout, operator_handle)
            .await
            .is_err()
    {
        warn!("Controllers did not shut down in time");
    }

    if !server_handle.is_finished()
        && tokio::time::timeout(shutdown_timeout, server_handle)
            .await
            .is_err()
    {
        warn!("Health server did not shut down in time");
    }

    info!("Synapse operator shutdown complete");
    Ok(())
}
