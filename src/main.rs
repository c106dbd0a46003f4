use d_master::metrics::encode_metrics;
use d_master::Error;
use d_master::MasterBuilder;
use d_master::MasterConfig;
use d_master::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    init_observability();

    let config = MasterConfig::new()?.validate()?;
    let report_interval = config.election.heartbeat_interval();

    let master = MasterBuilder::init(config)
        .on_master_start(|epoch| info!("I am the master now (epoch {})", epoch))
        .on_master_stop(|epoch| warn!("I am no longer the master (epoch {})", epoch))
        .build()?;
    master.start()?;
    info!("Candidate {} started. Waiting for CTRL+C signal...", master.id());

    // Initializing Shutdown Signal
    let (graceful_tx, mut graceful_rx) = watch::channel(());
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    let mut report = tokio::time::interval(report_interval);
    loop {
        tokio::select! {
            _ = graceful_rx.changed() => break,
            _ = report.tick() => {
                match master.current_master().await {
                    Ok(Some(holder)) => info!(
                        "current master: {} ({}), is me: {}",
                        holder.holder_id,
                        holder.holder_address,
                        master.is_master()
                    ),
                    Ok(None) => info!("no current master"),
                    Err(e) => warn!("current master unknown: {}", e),
                }
            }
        }
    }

    if let Err(e) = master.stop().await {
        error!("master stops: {:?}", e);
    }
    debug!("final metrics:\n{}", encode_metrics());

    println!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown signal sent");
    Ok(())
}

fn init_observability() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base_subscriber = tracing_subscriber::fmt::layer().with_filter(filter);
    tracing_subscriber::registry().with(base_subscriber).init();
}
