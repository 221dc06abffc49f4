//! Qdrant as the point store.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use std::collections::HashMap;

use super::{CollectionInfo, VectorStore};
use crate::error::VectorStoreError;
use crate::models::{Point, PointId, VectorStoreConfig};

pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    dimension: u64,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig, dimension: u64) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension,
        })
    }
}

fn to_point_struct(point: Point) -> PointStruct {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert("text".to_string(), point.payload.text.into());
    payload.insert("doc_id".to_string(), point.payload.document_id.into());
    if let Some(content) = point.payload.source_content {
        payload.insert("content".to_string(), content.into());
    }

    match point.id {
        PointId::Num(id) => PointStruct::new(id, point.vector, payload),
        PointId::Uuid(id) => PointStruct::new(id.to_string(), point.vector, payload),
    }
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn get_collection_info(&self) -> Result<Option<CollectionInfo>, VectorStoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(info) => Ok(Some(CollectionInfo {
                points_count: info.result.map_or(0, |r| r.points_count.unwrap_or(0)),
            })),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(None)
                } else {
                    Err(VectorStoreError::CollectionError(msg))
                }
            }
        }
    }

    async fn create_collection(&self) -> Result<(), VectorStoreError> {
        if self.get_collection_info().await?.is_some() {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection)
            .vectors_config(VectorParamsBuilder::new(self.dimension, Distance::Cosine));

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        Ok(())
    }

    async fn upsert_points(&self, points: Vec<Point>) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = points.into_iter().map(to_point_struct).collect();
        let upsert = UpsertPointsBuilder::new(&self.collection, points).wait(true);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))?;

        Ok(())
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PointPayload;
    use qdrant_client::qdrant::point_id::PointIdOptions;

    fn point(id: PointId, content: Option<&str>) -> Point {
        Point {
            id,
            vector: vec![0.1, 0.2],
            payload: PointPayload {
                text: "Category A\nHello world.".to_string(),
                document_id: "doc1".to_string(),
                source_content: content.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_payload_keys() {
        let converted = to_point_struct(point(PointId::Num(7), Some("Category A\nHello world.")));
        assert_eq!(
            converted.id.and_then(|id| id.point_id_options),
            Some(PointIdOptions::Num(7))
        );
        let keys: Vec<&str> = {
            let mut keys: Vec<&str> = converted.payload.keys().map(String::as_str).collect();
            keys.sort_unstable();
            keys
        };
        assert_eq!(keys, vec!["content", "doc_id", "text"]);
    }

    #[test]
    fn test_uuid_ids_and_optional_content() {
        let uuid = uuid::Uuid::nil();
        let converted = to_point_struct(point(PointId::Uuid(uuid), None));
        assert_eq!(
            converted.id.and_then(|id| id.point_id_options),
            Some(PointIdOptions::Uuid(uuid.to_string()))
        );
        assert!(!converted.payload.contains_key("content"));
    }
}
