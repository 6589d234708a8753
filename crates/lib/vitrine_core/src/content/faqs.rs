//! FAQ persistence.

use sqlx::PgPool;
use uuid::Uuid;

use super::ContentError;
use crate::models::content::Faq;
use crate::uuid::uuidv7;

/// Every FAQ, newest first.
pub async fn list_faqs(pool: &PgPool) -> Result<Vec<Faq>, ContentError> {
    let rows = sqlx::query_as::<_, Faq>(
        "SELECT id, question, answer, created_at, updated_at FROM faqs ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn create_faq(pool: &PgPool, question: &str, answer: &str) -> Result<Faq, ContentError> {
    let row = sqlx::query_as::<_, Faq>(
        "INSERT INTO faqs (id, question, answer) VALUES ($1, $2, $3) \
         RETURNING id, question, answer, created_at, updated_at",
    )
    .bind(uuidv7())
    .bind(question.trim())
    .bind(answer.trim())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn update_faq(
    pool: &PgPool,
    id: Uuid,
    question: &str,
    answer: &str,
) -> Result<Faq, ContentError> {
    sqlx::query_as::<_, Faq>(
        "UPDATE faqs SET question = $2, answer = $3, updated_at = now() WHERE id = $1 \
         RETURNING id, question, answer, created_at, updated_at",
    )
    .bind(id)
    .bind(question.trim())
    .bind(answer.trim())
    .fetch_optional(pool)
    .await?
    .ok_or(ContentError::NotFound)
}

pub async fn delete_faq(pool: &PgPool, id: Uuid) -> Result<(), ContentError> {
    let result = sqlx::query("DELETE FROM faqs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ContentError::NotFound);
    }
    Ok(())
}
