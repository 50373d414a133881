//! Application orchestrator: wires the upload components together.

use std::future::Future;
use std::sync::Arc;

use bkpsync_server::UploadServer;
use bkpsync_transfer::{
    CatalogStore, ContainerCodec, FsCatalogStore, RetentionSweeper, StatusByteCodec,
    TransferTracker, UploadSession,
};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Runs the daemon until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    serve(config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("SIGINT received, shutting down");
    })
    .await
}

/// Runs the daemon until `shutdown` resolves or the server fails.
pub async fn serve(config: Config, shutdown: impl Future<Output = ()>) -> anyhow::Result<()> {
    serve_with_tracker(config, Arc::new(TransferTracker::new()), shutdown).await
}

async fn serve_with_tracker(
    config: Config,
    tracker: Arc<TransferTracker>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    tokio::fs::create_dir_all(&config.upload_root).await?;

    // -- Transfer core --
    let store: Arc<dyn CatalogStore> = Arc::new(FsCatalogStore::new(&config.upload_root));
    let codec: Arc<dyn ContainerCodec> = Arc::new(StatusByteCodec::new(config.status_offset));

    let session = UploadSession::new(
        config.session(),
        Arc::clone(&store),
        codec,
        Arc::clone(&tracker),
        tracing::info_span!("upload_session"),
    );

    // -- Retention --
    // Always runs: with retention disabled it still forgets idle transfers.
    let sweeper = Arc::new(RetentionSweeper::new(
        config.sweeper(),
        Arc::clone(&store),
        Arc::clone(&tracker),
        tracing::info_span!("retention"),
    ));
    if config.retention.enabled {
        tracing::info!(days = config.retention.days, "retention sweeper started");
    } else {
        tracing::info!("retention disabled, sweeping idle transfers only");
    }
    let sweeper_task = sweeper.spawn(cancel.clone());

    // -- WS server --
    let server = UploadServer::new(config.server(), session);
    let server_run = Arc::clone(&server);
    let mut server_task = tokio::spawn(async move { server_run.run().await });

    tokio::pin!(shutdown);
    let finished = tokio::select! {
        joined = &mut server_task => {
            tracing::error!("server stopped unexpectedly");
            Some(joined)
        }
        _ = &mut shutdown => None,
    };

    // -- Graceful shutdown --
    tracing::info!("stopping services...");
    server.shutdown();
    cancel.cancel();

    let joined = match finished {
        Some(joined) => joined,
        None => server_task.await,
    };
    sweeper_task.await?;

    joined??;
    Ok(())
}
