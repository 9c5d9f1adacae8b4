//! Conversation, query, file and prompt persistence.
//!
//! The store is a trait so the orchestrator and tools depend on the
//! contract, not on Postgres; `PgConversationStore` runs every operation on
//! its own pooled connection, so concurrent requests never share a driver
//! connection.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{FileRecord, PromptConfig};
use crate::types::{AppError, AppResult};

/// One persisted question/answer turn, oldest first.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredTurn {
    pub question: Option<String>,
    pub answer: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub file_name: String,
    pub url: String,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a conversation and return its id as an opaque string.
    async fn insert_conversation(&self, user_id: &str, first_question: &str)
        -> AppResult<String>;

    /// Record one orchestrator turn; returns the query id.
    #[allow(clippy::too_many_arguments)]
    async fn insert_query(
        &self,
        convo_id: &str,
        question: &str,
        answer: &str,
        context: &str,
        response_time: f64,
        user_id: &str,
    ) -> AppResult<String>;

    /// Update rating/review on an existing query row. A missing id is
    /// logged and swallowed, never an error (documented lossy behavior).
    async fn insert_review_and_rating(
        &self,
        query_id: &str,
        rating: Option<i32>,
        review: Option<&str>,
    ) -> AppResult<()>;

    /// All turns of a conversation in chronological order.
    async fn get_conversation(&self, convo_id: &str) -> AppResult<Vec<StoredTurn>>;

    async fn add_files(&self, files: &[NewFile], user_id: &str) -> AppResult<()>;
    async fn get_files(&self) -> AppResult<Vec<FileRecord>>;
    async fn get_active_files(&self) -> AppResult<Vec<String>>;
    async fn delete_file(&self, file_name: &str) -> AppResult<()>;
    async fn toggle_file_active(&self, file_name: &str, active: bool) -> AppResult<()>;

    async fn insert_prompt(&self, prompt: &PromptConfig) -> AppResult<String>;
    async fn latest_prompt(&self) -> AppResult<Option<PromptConfig>>;
}

pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn insert_conversation(
        &self,
        user_id: &str,
        first_question: &str,
    ) -> AppResult<String> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO conversations (user_id, first_question) VALUES ($1, $2) RETURNING id",
        )
        .bind(user_id)
        .bind(first_question)
        .fetch_one(&self.pool)
        .await?;
        Ok(id.to_string())
    }

    async fn insert_query(
        &self,
        convo_id: &str,
        question: &str,
        answer: &str,
        context: &str,
        response_time: f64,
        user_id: &str,
    ) -> AppResult<String> {
        info!(convo_id, question_len = question.len(), "inserting query");
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO queries (convo_id, question, answer, context, response_time, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(convo_id)
        .bind(question)
        .bind(answer)
        .bind(context)
        .bind(response_time)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id.to_string())
    }

    async fn insert_review_and_rating(
        &self,
        query_id: &str,
        rating: Option<i32>,
        review: Option<&str>,
    ) -> AppResult<()> {
        let id = match Uuid::parse_str(query_id) {
            Ok(id) => id,
            Err(e) => {
                warn!(query_id, error = %e, "rating update against malformed query id");
                return Ok(());
            }
        };
        let result = sqlx::query(
            "UPDATE queries SET rating = $1, review = $2 WHERE id = $3",
        )
        .bind(rating)
        .bind(review)
        .bind(id)
        .execute(&self.pool)
        .await;
        match result {
            Ok(done) if done.rows_affected() == 0 => {
                warn!(query_id, "rating update matched no query row");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(query_id, error = %e, "rating update failed");
            }
        }
        Ok(())
    }

    async fn get_conversation(&self, convo_id: &str) -> AppResult<Vec<StoredTurn>> {
        let turns = sqlx::query_as::<_, StoredTurn>(
            r#"
            SELECT question, answer, created_at
            FROM queries
            WHERE convo_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(convo_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(turns)
    }

    async fn add_files(&self, files: &[NewFile], user_id: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        for file in files {
            sqlx::query(
                r#"
                INSERT INTO files (file_name, url, user_id)
                VALUES ($1, $2, $3)
                ON CONFLICT (file_name)
                DO UPDATE SET url = EXCLUDED.url, updated_at = now()
                "#,
            )
            .bind(&file.file_name)
            .bind(&file.url)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_files(&self) -> AppResult<Vec<FileRecord>> {
        let files = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT file_name, url, user_id, created_at, updated_at, active
            FROM files
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    async fn get_active_files(&self) -> AppResult<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT file_name FROM files WHERE active = true")
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    async fn delete_file(&self, file_name: &str) -> AppResult<()> {
        let done = sqlx::query("DELETE FROM files WHERE file_name = $1")
            .bind(file_name)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("no file named {file_name}")));
        }
        Ok(())
    }

    async fn toggle_file_active(&self, file_name: &str, active: bool) -> AppResult<()> {
        sqlx::query(
            "UPDATE files SET active = $1, updated_at = now() WHERE file_name = $2",
        )
        .bind(active)
        .bind(file_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_prompt(&self, prompt: &PromptConfig) -> AppResult<String> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO prompts (llm_model, persona, glossary, tone, response_length, content)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&prompt.llm_model)
        .bind(&prompt.persona)
        .bind(&prompt.glossary)
        .bind(&prompt.tone)
        .bind(&prompt.response_length)
        .bind(&prompt.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(id.to_string())
    }

    async fn latest_prompt(&self) -> AppResult<Option<PromptConfig>> {
        let prompt = sqlx::query_as::<_, PromptConfig>(
            r#"
            SELECT llm_model, persona, glossary, tone, response_length, content
            FROM prompts
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(prompt)
    }
}
