use std::time::Duration;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use common::entity::weakness;
use common::retry::calculate_backoff;

use crate::config::EnrichmentConfig;
use crate::error::AppError;

/// Fixed text used when neither live generation nor the cached fix exists.
pub const NO_SUGGESTION: &str = "no suggestion available";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend returned HTTP {status}")]
    Http { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Overload responses are worth retrying; everything else is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Http { status: 503 | 429 })
    }
}

/// Chat-completions style text generation backend.
#[async_trait]
pub trait FixBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;
}

/// HTTP implementation speaking the chat-completions wire format.
pub struct HttpFixBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

impl HttpFixBackend {
    pub fn new(config: &EnrichmentConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.backend_url.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl FixBackend for HttpFixBackend {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Http {
                status: status.as_u16(),
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| BackendError::Malformed("empty choices array".into()))?;

        Ok(content.trim().to_string())
    }
}

/// Prompt for the batch job: one generic fix per weakness category.
pub fn batch_prompt(name: &str, description: &str) -> String {
    format!("Issue type: {name}.\nDescription: {description}.\n\nSuggest a generic secure fix.")
}

/// Prompt for on-demand report enrichment, tied to one concrete finding.
pub fn finding_prompt(file_name: &str, line_start: i32, line_end: i32, code: &str) -> String {
    format!(
        "File `{file_name}` has a vulnerability on lines {line_start}-{line_end}.\n\
         Code:\n{code}\n\n\
         Suggest a secure fix in one concise paragraph."
    )
}

/// Counters reported by one batch enrichment run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub examined: u64,
    pub updated: u64,
    pub failed: u64,
}

/// Resolves remediation suggestions, live when possible and cached otherwise.
pub struct FixEnricher {
    backend: std::sync::Arc<dyn FixBackend>,
    config: EnrichmentConfig,
}

impl FixEnricher {
    pub fn new(backend: std::sync::Arc<dyn FixBackend>, config: EnrichmentConfig) -> Self {
        Self { backend, config }
    }

    /// Resolve a suggestion for one finding.
    ///
    /// Tries a live generation within the configured budget; any failure
    /// degrades to `generic_fix`, then to the [`NO_SUGGESTION`] sentinel.
    /// Never returns an error: a report must not fail because the backend
    /// is down.
    pub async fn suggest(&self, prompt: &str, generic_fix: Option<&str>) -> String {
        let budget = Duration::from_secs(self.config.suggestion_timeout_secs);
        let live = tokio::time::timeout(budget, self.backend.complete(prompt)).await;

        match live {
            Ok(Ok(text)) if !text.trim().is_empty() => return text.trim().to_string(),
            Ok(Ok(_)) => warn!("Suggestion backend returned empty text"),
            Ok(Err(e)) => warn!(error = %e, "Suggestion backend call failed"),
            Err(_) => warn!(
                timeout_secs = self.config.suggestion_timeout_secs,
                "Suggestion backend call timed out"
            ),
        }

        generic_fix
            .filter(|fix| !fix.trim().is_empty())
            .map(|fix| fix.to_string())
            .unwrap_or_else(|| NO_SUGGESTION.to_string())
    }

    /// Fill in `generic_fix` for every catalog row that lacks one.
    ///
    /// Rows are processed sequentially with a minimum delay between
    /// requests; a row that keeps failing is skipped, never written.
    pub async fn populate_generic_fixes<C: ConnectionTrait>(
        &self,
        db: &C,
    ) -> Result<EnrichmentStats, AppError> {
        let rows = weakness::Entity::find()
            .filter(weakness::Column::GenericFix.is_null())
            .order_by_asc(weakness::Column::Id)
            .all(db)
            .await?;

        let mut stats = EnrichmentStats {
            examined: rows.len() as u64,
            ..Default::default()
        };
        info!(count = rows.len(), "Found weakness rows without a generic fix");

        for row in rows {
            let prompt = batch_prompt(&row.name, &row.description);

            match self.complete_with_retry(&prompt).await {
                Ok(fix) => {
                    let mut update: weakness::ActiveModel = row.into();
                    update.generic_fix = Set(Some(fix));
                    update.update(db).await?;
                    stats.updated += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Skipping weakness after failed generation");
                    stats.failed += 1;
                }
            }

            tokio::time::sleep(Duration::from_millis(self.config.min_delay_ms)).await;
        }

        info!(
            examined = stats.examined,
            updated = stats.updated,
            failed = stats.failed,
            "Batch enrichment finished"
        );
        Ok(stats)
    }

    /// One completion with retries on overload responses only.
    async fn complete_with_retry(&self, prompt: &str) -> Result<String, BackendError> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.backend.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = calculate_backoff(attempt, 1000, 60_000);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Backend overloaded, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("loop either returns or retries")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Backend fake driven by a script of canned results.
    struct ScriptedBackend {
        script: Mutex<Vec<Result<String, BackendError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<String, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FixBackend for ScriptedBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().await;
            if script.is_empty() {
                return Err(BackendError::Transport("script exhausted".into()));
            }
            script.remove(0)
        }
    }

    fn config() -> EnrichmentConfig {
        EnrichmentConfig {
            min_delay_ms: 0,
            ..EnrichmentConfig::default()
        }
    }

    async fn insert_weakness(
        db: &sea_orm::DatabaseConnection,
        id: i32,
        generic_fix: Option<&str>,
    ) {
        weakness::ActiveModel {
            id: Set(id),
            name: Set(format!("Weakness {id}")),
            description: Set("A weakness description".into()),
            url: Set(format!("https://cwe.mitre.org/data/definitions/{id}.html")),
            generic_fix: Set(generic_fix.map(String::from)),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn suggest_prefers_live_generation() {
        let backend = ScriptedBackend::new(vec![Ok("  use parameterized queries  ".into())]);
        let enricher = FixEnricher::new(backend, config());

        let text = enricher.suggest("prompt", Some("cached fix")).await;
        assert_eq!(text, "use parameterized queries");
    }

    #[tokio::test]
    async fn suggest_falls_back_to_generic_fix() {
        let backend = ScriptedBackend::new(vec![Err(BackendError::Transport("down".into()))]);
        let enricher = FixEnricher::new(backend, config());

        let text = enricher.suggest("prompt", Some("cached fix")).await;
        assert_eq!(text, "cached fix");
    }

    #[tokio::test]
    async fn suggest_sentinel_when_nothing_available() {
        let backend = ScriptedBackend::new(vec![Err(BackendError::Http { status: 500 })]);
        let enricher = FixEnricher::new(backend, config());

        let text = enricher.suggest("prompt", None).await;
        assert_eq!(text, NO_SUGGESTION);

        // Empty cached text is treated as absent too.
        let backend = ScriptedBackend::new(vec![Ok(String::new())]);
        let enricher = FixEnricher::new(backend, config());
        let text = enricher.suggest("prompt", Some("   ")).await;
        assert_eq!(text, NO_SUGGESTION);
    }

    #[tokio::test]
    async fn batch_fills_only_null_rows() {
        let db = test_db().await;
        insert_weakness(&db, 78, None).await;
        insert_weakness(&db, 89, Some("already cached")).await;

        let backend = ScriptedBackend::new(vec![Ok("sanitize shell arguments".into())]);
        let enricher = FixEnricher::new(backend.clone(), config());

        let stats = enricher.populate_generic_fixes(&db).await.unwrap();
        assert_eq!(stats.examined, 1);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(backend.call_count(), 1);

        let filled = weakness::Entity::find_by_id(78).one(&db).await.unwrap().unwrap();
        assert_eq!(filled.generic_fix.as_deref(), Some("sanitize shell arguments"));

        let untouched = weakness::Entity::find_by_id(89).one(&db).await.unwrap().unwrap();
        assert_eq!(untouched.generic_fix.as_deref(), Some("already cached"));
    }

    #[tokio::test]
    async fn batch_is_noop_when_all_rows_populated() {
        let db = test_db().await;
        insert_weakness(&db, 78, Some("a")).await;
        insert_weakness(&db, 89, Some("b")).await;

        let backend = ScriptedBackend::new(vec![]);
        let enricher = FixEnricher::new(backend.clone(), config());

        let stats = enricher.populate_generic_fixes(&db).await.unwrap();
        assert_eq!(stats, EnrichmentStats::default());
        assert_eq!(backend.call_count(), 0);
    }

    // Runs on the real clock; pausing time stalls the sqlx pool's
    // connection acquires.
    #[tokio::test]
    async fn batch_retries_overload_then_succeeds() {
        let db = test_db().await;
        insert_weakness(&db, 79, None).await;

        let backend = ScriptedBackend::new(vec![
            Err(BackendError::Http { status: 503 }),
            Err(BackendError::Http { status: 429 }),
            Ok("escape output".into()),
        ]);
        let enricher = FixEnricher::new(backend.clone(), config());

        let stats = enricher.populate_generic_fixes(&db).await.unwrap();
        assert_eq!(stats.updated, 1);
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn batch_gives_up_after_max_attempts_without_writing() {
        let db = test_db().await;
        insert_weakness(&db, 79, None).await;

        let backend = ScriptedBackend::new(vec![
            Err(BackendError::Http { status: 503 }),
            Err(BackendError::Http { status: 503 }),
            Err(BackendError::Http { status: 503 }),
        ]);
        let enricher = FixEnricher::new(backend.clone(), config());

        let stats = enricher.populate_generic_fixes(&db).await.unwrap();
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.failed, 1);
        assert_eq!(backend.call_count(), 3);

        let row = weakness::Entity::find_by_id(79).one(&db).await.unwrap().unwrap();
        assert!(row.generic_fix.is_none());
    }

    #[tokio::test]
    async fn non_transient_errors_are_not_retried() {
        let db = test_db().await;
        insert_weakness(&db, 80, None).await;

        let backend = ScriptedBackend::new(vec![Err(BackendError::Http { status: 500 })]);
        let enricher = FixEnricher::new(backend.clone(), config());

        let stats = enricher.populate_generic_fixes(&db).await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(backend.call_count(), 1);
    }

    #[test]
    fn prompt_templates() {
        assert_eq!(
            batch_prompt("OS Command Injection", "Shell metacharacters"),
            "Issue type: OS Command Injection.\nDescription: Shell metacharacters.\n\nSuggest a generic secure fix."
        );
        let p = finding_prompt("app.py", 10, 12, "os.system(cmd)");
        assert!(p.starts_with("File `app.py` has a vulnerability on lines 10-12.\n"));
        assert!(p.contains("Code:\nos.system(cmd)"));
        assert!(p.ends_with("Suggest a secure fix in one concise paragraph."));
    }
}
