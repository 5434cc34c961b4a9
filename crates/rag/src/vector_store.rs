//! VectorIndex (C2): upsert and top-K similarity search over stored vectors
//! with opaque metadata, backed by Qdrant.

use std::collections::HashMap;
use std::sync::Arc;

use qdrant_client::qdrant::{
    value::Kind, PointId, PointStruct, PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder,
    DeletePointsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::Value;

use crate::embeddings::EmbeddingProvider;
use crate::RagError;

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub endpoint: String,
    pub collection: String,
    pub vector_dim: usize,
    pub api_key: Option<String>,
}

/// A raw hit from the index: `{id, score, metadata}`.
#[derive(Debug, Clone)]
pub struct Match {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, Value>,
}

/// Item handed to `upsert`.
#[derive(Debug, Clone)]
pub struct UpsertItem {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: HashMap<String, Value>,
}

/// Thin, process-wide wrapper over a Qdrant client, matching the way the
/// teacher wraps its own `VectorStore`. Construction never fails: a
/// misconfigured endpoint or empty collection name leaves `client = None`
/// and every subsequent `query` degrades to `(∅, ∅)` with a warning instead
/// of propagating an error, per the specification's non-error contract.
pub struct VectorIndex {
    client: Option<Qdrant>,
    config: VectorStoreConfig,
    embeddings: Arc<EmbeddingProvider>,
}

impl VectorIndex {
    pub fn new(config: VectorStoreConfig, embeddings: Arc<EmbeddingProvider>) -> Self {
        let client = if config.endpoint.is_empty() || config.collection.is_empty() {
            tracing::warn!("vector index misconfigured: missing endpoint or collection name");
            None
        } else {
            let mut builder = Qdrant::from_url(&config.endpoint);
            if let Some(ref api_key) = config.api_key {
                builder = builder.api_key(api_key.clone());
            }
            match builder.build() {
                Ok(client) => Some(client),
                Err(err) => {
                    tracing::warn!(error = %err, "failed to build qdrant client");
                    None
                }
            }
        };

        Self {
            client,
            config,
            embeddings,
        }
    }

    /// `query(queryText, topK) -> (ordered Matches, highestScore)`.
    /// Embeds `query_text` via the embedding provider, then searches.
    pub async fn query(
        &self,
        query_text: &str,
        top_k: usize,
    ) -> (Vec<Match>, Option<f32>) {
        let Some(client) = &self.client else {
            return (Vec::new(), None);
        };

        let embedding = match self.embeddings.embed(query_text) {
            Ok(embedding) => embedding,
            Err(err) => {
                tracing::warn!(error = %err, "embedding failed during vector query");
                return (Vec::new(), None);
            }
        };

        let search = SearchPointsBuilder::new(&self.config.collection, embedding, top_k as u64)
            .with_payload(true);

        let response = match client.search_points(search).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "vector index search failed");
                return (Vec::new(), None);
            }
        };

        let mut matches: Vec<Match> = response
            .result
            .into_iter()
            .map(|point| {
                let mut metadata = HashMap::new();
                for (k, v) in point.payload {
                    if let Some(value) = qdrant_value_to_json(&v) {
                        metadata.insert(k, value);
                    }
                }
                let id = point
                    .id
                    .map(point_id_to_string)
                    .unwrap_or_default();
                Match {
                    id,
                    score: point.score,
                    metadata,
                }
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let highest = matches.first().map(|m| m.score);
        (matches, highest)
    }

    /// `upsert(items) -> void`. Used to persist user corrections.
    pub async fn upsert(&self, items: &[UpsertItem]) -> Result<(), RagError> {
        let Some(client) = &self.client else {
            return Err(RagError::VectorStore(
                "vector index is not configured".to_string(),
            ));
        };

        let points: Vec<PointStruct> = items
            .iter()
            .map(|item| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                for (k, v) in &item.metadata {
                    payload.insert(k.clone(), json_to_qdrant_value(v));
                }
                PointStruct::new(item.id.clone(), item.vector.clone(), payload)
            })
            .collect();

        client
            .upsert_points(UpsertPointsBuilder::new(&self.config.collection, points))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(())
    }

    pub async fn delete(&self, ids: &[String]) -> Result<(), RagError> {
        let Some(client) = &self.client else {
            return Err(RagError::VectorStore(
                "vector index is not configured".to_string(),
            ));
        };
        let points: Vec<PointId> = ids.iter().map(|id| PointId::from(id.clone())).collect();
        client
            .delete_points(
                DeletePointsBuilder::new(&self.config.collection)
                    .points(PointsIdsList { ids: points }),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.config.vector_dim
    }
}

fn point_id_to_string(point_id: PointId) -> String {
    match point_id.point_id_options {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn qdrant_value_to_json(value: &qdrant_client::qdrant::Value) -> Option<Value> {
    match &value.kind {
        Some(Kind::StringValue(s)) => Some(Value::String(s.clone())),
        Some(Kind::IntegerValue(i)) => Some(Value::from(*i)),
        Some(Kind::DoubleValue(d)) => Some(Value::from(*d)),
        Some(Kind::BoolValue(b)) => Some(Value::Bool(*b)),
        Some(Kind::ListValue(list)) => Some(Value::Array(
            list.values
                .iter()
                .filter_map(qdrant_value_to_json)
                .collect(),
        )),
        _ => None,
    }
}

fn json_to_qdrant_value(value: &Value) -> qdrant_client::qdrant::Value {
    match value {
        Value::String(s) => s.clone().into(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into()
            } else {
                n.as_f64().unwrap_or(0.0).into()
            }
        }
        Value::Bool(b) => (*b).into(),
        Value::Array(items) => {
            let strings: Vec<String> = items
                .iter()
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .collect();
            strings.into()
        }
        other => other.to_string().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingConfig;

    #[tokio::test]
    async fn misconfigured_index_returns_empty_without_error() {
        let embeddings = Arc::new(EmbeddingProvider::new(EmbeddingConfig::default()));
        let index = VectorIndex::new(
            VectorStoreConfig {
                endpoint: String::new(),
                collection: String::new(),
                vector_dim: 1024,
                api_key: None,
            },
            embeddings,
        );

        let (matches, highest) = index.query("hello", 5).await;
        assert!(matches.is_empty());
        assert!(highest.is_none());
    }

    #[tokio::test]
    async fn upsert_against_unconfigured_index_errors() {
        let embeddings = Arc::new(EmbeddingProvider::new(EmbeddingConfig::default()));
        let index = VectorIndex::new(
            VectorStoreConfig {
                endpoint: String::new(),
                collection: String::new(),
                vector_dim: 1024,
                api_key: None,
            },
            embeddings,
        );

        let result = index
            .upsert(&[UpsertItem {
                id: "doc1".to_string(),
                vector: vec![0.1; 1024],
                metadata: HashMap::new(),
            }])
            .await;
        assert!(result.is_err());
    }
}
