use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat};
use crate::services::{EmbeddingClient, create_backend};

pub async fn handle_status(config: Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    let (embedding_connected, embedding_models) = match EmbeddingClient::new(&config.embedding) {
        Ok(client) => match client.health_check().await {
            Ok(models) => (true, models),
            Err(e) => {
                tracing::debug!(error = %e, "embedding health check failed");
                (false, Vec::new())
            }
        },
        Err(_) => (false, Vec::new()),
    };

    let (vector_store_connected, collection_points) =
        match create_backend(&config.vector_store, config.embedding.dimension) {
            Ok(store) => {
                let connected = store.health_check().await.unwrap_or(false);
                let points = if connected {
                    store
                        .get_collection_info()
                        .await
                        .ok()
                        .flatten()
                        .map(|info| info.points_count)
                } else {
                    None
                };
                (connected, points)
            }
            Err(_) => (false, None),
        };

    let status = StatusInfo {
        embedding_url: config.embedding.url.clone(),
        embedding_connected,
        embedding_models,
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected,
        collection: config.vector_store.collection.clone(),
        collection_points,
    };

    print!("{}", formatter.format_status(&status));

    if !embedding_connected {
        eprintln!("\nWarning: embedding server not reachable at {}", config.embedding.url);
    }
    if !vector_store_connected {
        eprintln!("\nWarning: Qdrant not running. Start with: docker run -p 6334:6334 qdrant/qdrant");
    }

    Ok(())
}
