//! Catalog questions: model-written SQL, gated and run read-only.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use bookchat_core::types::ConversationTurn;
use bookchat_llm::{with_timeout, LanguageModel};
use bookchat_storage::CatalogStore;

use crate::blocking::run_blocking;
use crate::gate::{check_query, strip_code_fences};
use crate::outcome::{DegradeReason, HandlerOutcome};
use crate::prompt;

pub struct DatabaseHandler {
    model: Arc<dyn LanguageModel>,
    catalog: CatalogStore,
    schema_tables: Vec<String>,
    timeout: Duration,
}

impl DatabaseHandler {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        catalog: CatalogStore,
        schema_tables: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            model,
            catalog,
            schema_tables,
            timeout,
        }
    }

    /// Answer a question about books, authors, prices or stock.
    pub async fn answer(&self, question: &str, history: &[ConversationTurn]) -> HandlerOutcome {
        let (catalog, tables) = (self.catalog.clone(), self.schema_tables.clone());
        let schema = match run_blocking(move || catalog.table_info(&tables)).await {
            Ok(schema) => schema,
            Err(e) => {
                warn!(error = %e, "Failed to read catalog schema");
                return HandlerOutcome::degraded(DegradeReason::SchemaUnavailable);
            }
        };

        let query_prompt = prompt::generate_query(question, history, &schema);
        debug!(prompt = %query_prompt, "Requesting query");
        let generated = match with_timeout(self.timeout, self.model.complete(&query_prompt)).await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Query generation failed");
                return HandlerOutcome::degraded(DegradeReason::QueryGenerationFailed);
            }
        };

        let sql = strip_code_fences(&generated);
        info!(sql = %sql, "Generated query");

        if let Err(rejection) = check_query(&sql) {
            warn!(sql = %sql, reason = %rejection, "Refused generated query");
            return HandlerOutcome::degraded(DegradeReason::QueryRejected);
        }

        let catalog = self.catalog.clone();
        let query = sql.clone();
        let rows = match run_blocking(move || catalog.run_read_query(&query)).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(sql = %sql, error = %e, "Generated query failed");
                return HandlerOutcome::degraded(DegradeReason::QueryFailed);
            }
        };

        if rows.is_empty() {
            info!("Generated query matched no rows");
            return HandlerOutcome::degraded(DegradeReason::NoRows);
        }
        if rows.truncated {
            info!(kept = rows.len(), "Generated query hit the row cap");
        }
        debug!(rows = rows.len(), columns = ?rows.columns, "Query returned rows");

        let answer_prompt = prompt::phrase_answer(question, &rows.render());
        match with_timeout(self.timeout, self.model.complete(&answer_prompt)).await {
            Ok(answer) => HandlerOutcome::Answered(answer),
            Err(e) => {
                warn!(error = %e, "Answer phrasing failed");
                HandlerOutcome::degraded(DegradeReason::AnswerPhrasingFailed)
            }
        }
    }
}
