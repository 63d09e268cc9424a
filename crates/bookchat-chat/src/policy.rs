//! Policy questions: nearest stored policy by embedding similarity.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use bookchat_llm::{with_timeout, EmbeddingService};
use bookchat_storage::PolicyStore;

use crate::blocking::run_blocking;
use crate::outcome::{DegradeReason, HandlerOutcome};

pub struct PolicyHandler {
    embeddings: Arc<dyn EmbeddingService>,
    policies: PolicyStore,
    threshold: f64,
    timeout: Duration,
}

impl PolicyHandler {
    pub fn new(
        embeddings: Arc<dyn EmbeddingService>,
        policies: PolicyStore,
        threshold: f64,
        timeout: Duration,
    ) -> Self {
        Self {
            embeddings,
            policies,
            threshold,
            timeout,
        }
    }

    /// Return the closest policy text verbatim when its similarity is
    /// strictly above the threshold.
    pub async fn answer(&self, question: &str) -> HandlerOutcome {
        let vector = match with_timeout(self.timeout, self.embeddings.embed(question)).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!(error = %e, "Failed to embed policy question");
                return HandlerOutcome::degraded(DegradeReason::EmbeddingFailed);
            }
        };

        let policies = self.policies.clone();
        let nearest = match run_blocking(move || policies.nearest(&vector)).await {
            Ok(nearest) => nearest,
            Err(e) => {
                warn!(error = %e, "Policy lookup failed");
                return HandlerOutcome::degraded(DegradeReason::PolicyLookupFailed);
            }
        };

        match nearest {
            Some(found) if found.similarity.is_some_and(|s| s > self.threshold) => {
                info!(similarity = ?found.similarity, "Matched policy");
                HandlerOutcome::Answered(found.content)
            }
            Some(found) => {
                info!(
                    similarity = ?found.similarity,
                    threshold = self.threshold,
                    "Closest policy below threshold"
                );
                HandlerOutcome::degraded(DegradeReason::NoRelevantPolicy)
            }
            None => {
                info!("No policies stored");
                HandlerOutcome::degraded(DegradeReason::NoRelevantPolicy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookchat_core::error::BookchatError;
    use bookchat_core::types::PolicyRecord;
    use bookchat_llm::{FixedEmbedding, MockEmbedding};
    use bookchat_storage::Database;

    use crate::outcome::{NO_RELEVANT_POLICY, POLICY_MAINTENANCE};

    const RETURNS: &str = "Đổi trả miễn phí trong 7 ngày kể từ khi nhận hàng.";

    fn store_with(records: &[(&str, Vec<f32>)]) -> PolicyStore {
        let store = PolicyStore::new(Arc::new(Database::in_memory().unwrap()));
        for (content, embedding) in records {
            store
                .insert(&PolicyRecord {
                    title: String::new(),
                    content: content.to_string(),
                    embedding: embedding.clone(),
                })
                .unwrap();
        }
        store
    }

    fn handler(embedding: impl EmbeddingService + 'static, store: PolicyStore) -> PolicyHandler {
        PolicyHandler::new(Arc::new(embedding), store, 0.3, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_returns_policy_verbatim() {
        // cos([0.75, 0.661...], [1, 0]) = 0.75
        let query = vec![0.75, (1.0f32 - 0.75 * 0.75).sqrt()];
        let store = store_with(&[(RETURNS, vec![1.0, 0.0]), ("Giao hàng 3 ngày.", vec![-1.0, 0.0])]);
        let outcome = handler(FixedEmbedding::new(query), store)
            .answer("chính sách đổi trả thế nào")
            .await;
        assert_eq!(outcome, HandlerOutcome::Answered(RETURNS.to_string()));
    }

    #[tokio::test]
    async fn test_below_threshold() {
        let store = store_with(&[(RETURNS, vec![1.0, 0.0])]);
        // cos = 0.25
        let outcome = handler(FixedEmbedding::new(vec![0.25, (1.0f32 - 0.0625).sqrt()]), store)
            .answer("mấy giờ mở cửa")
            .await;
        assert_eq!(outcome.text(), NO_RELEVANT_POLICY);
        assert_eq!(outcome.reason(), Some(DegradeReason::NoRelevantPolicy));
    }

    #[tokio::test]
    async fn test_empty_store() {
        let outcome = handler(FixedEmbedding::new(vec![1.0, 0.0]), store_with(&[]))
            .answer("đổi trả")
            .await;
        assert_eq!(outcome.text(), NO_RELEVANT_POLICY);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_not_a_match() {
        let store = store_with(&[(RETURNS, vec![1.0, 0.0, 0.0])]);
        let outcome = handler(FixedEmbedding::new(vec![1.0, 0.0]), store)
            .answer("đổi trả")
            .await;
        assert_eq!(outcome.reason(), Some(DegradeReason::NoRelevantPolicy));
    }

    #[tokio::test]
    async fn test_embedding_failure() {
        let outcome = handler(FixedEmbedding::failing(), store_with(&[]))
            .answer("đổi trả")
            .await;
        assert_eq!(outcome.text(), POLICY_MAINTENANCE);
        assert_eq!(outcome.reason(), Some(DegradeReason::EmbeddingFailed));
    }

    #[tokio::test]
    async fn test_store_failure() {
        let db = Arc::new(Database::in_memory().unwrap());
        db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE policies")
                .map_err(|e| BookchatError::Storage(e.to_string()))
        })
        .unwrap();
        let outcome = handler(FixedEmbedding::new(vec![1.0]), PolicyStore::new(db))
            .answer("đổi trả")
            .await;
        assert_eq!(outcome.text(), POLICY_MAINTENANCE);
        assert_eq!(outcome.reason(), Some(DegradeReason::PolicyLookupFailed));
    }

    #[tokio::test]
    async fn test_same_text_matches_with_hash_embeddings() {
        let embeddings = MockEmbedding::new(64);
        let question = "chính sách giao hàng";
        let store = store_with(&[
            ("Giao hàng toàn quốc trong 3-5 ngày.", embeddings.vector_for(question)),
            (RETURNS, embeddings.vector_for("hoàn tiền")),
        ]);
        let outcome = handler(embeddings, store).answer(question).await;
        assert_eq!(outcome.text(), "Giao hàng toàn quốc trong 3-5 ngày.");
    }
}
