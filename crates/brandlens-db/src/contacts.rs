//! Database operations for `extracted_contacts`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContactRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub source_url: String,
    pub domain: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub facebook_url: Option<String>,
    pub instagram_url: Option<String>,
    pub author_name: Option<String>,
    pub company_name: Option<String>,
    pub extraction_method: String,
    pub confidence: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct NewContact<'a> {
    pub user_id: Uuid,
    pub source_url: &'a str,
    pub domain: &'a str,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub linkedin_url: Option<&'a str>,
    pub twitter_url: Option<&'a str>,
    pub facebook_url: Option<&'a str>,
    pub instagram_url: Option<&'a str>,
    pub author_name: Option<&'a str>,
    pub company_name: Option<&'a str>,
    pub extraction_method: &'a str,
    pub confidence: i16,
}

/// Upserts a contact. Dedup key: (`user_id`, `source_url`, email, phone), with
/// missing email/phone compared as empty strings.
///
/// On conflict, newly extracted non-null fields win and confidence keeps the maximum.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_contact(pool: &PgPool, contact: &NewContact<'_>) -> Result<Uuid, DbError> {
    let id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO extracted_contacts \
           (user_id, source_url, domain, email, phone, linkedin_url, twitter_url, facebook_url, \
            instagram_url, author_name, company_name, extraction_method, confidence) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         ON CONFLICT (user_id, source_url, (COALESCE(email, '')), (COALESCE(phone, ''))) DO UPDATE SET \
           linkedin_url = COALESCE(EXCLUDED.linkedin_url, extracted_contacts.linkedin_url), \
           twitter_url = COALESCE(EXCLUDED.twitter_url, extracted_contacts.twitter_url), \
           facebook_url = COALESCE(EXCLUDED.facebook_url, extracted_contacts.facebook_url), \
           instagram_url = COALESCE(EXCLUDED.instagram_url, extracted_contacts.instagram_url), \
           author_name = COALESCE(EXCLUDED.author_name, extracted_contacts.author_name), \
           company_name = COALESCE(EXCLUDED.company_name, extracted_contacts.company_name), \
           extraction_method = EXCLUDED.extraction_method, \
           confidence = GREATEST(EXCLUDED.confidence, extracted_contacts.confidence), \
           updated_at = NOW() \
         RETURNING id",
    )
    .bind(contact.user_id)
    .bind(contact.source_url)
    .bind(contact.domain)
    .bind(contact.email)
    .bind(contact.phone)
    .bind(contact.linkedin_url)
    .bind(contact.twitter_url)
    .bind(contact.facebook_url)
    .bind(contact.instagram_url)
    .bind(contact.author_name)
    .bind(contact.company_name)
    .bind(contact.extraction_method)
    .bind(contact.confidence)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Lists the user's contacts, highest confidence first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_contacts(
    pool: &PgPool,
    user_id: Uuid,
    min_confidence: i16,
    domain: Option<&str>,
    limit: i64,
) -> Result<Vec<ContactRow>, DbError> {
    let rows = sqlx::query_as::<_, ContactRow>(
        "SELECT id, user_id, source_url, domain, email, phone, linkedin_url, twitter_url, \
                facebook_url, instagram_url, author_name, company_name, extraction_method, \
                confidence, created_at, updated_at \
         FROM extracted_contacts \
         WHERE user_id = $1 \
           AND confidence >= $2 \
           AND ($3::text IS NULL OR domain = LOWER($3)) \
         ORDER BY confidence DESC, updated_at DESC, id \
         LIMIT $4",
    )
    .bind(user_id)
    .bind(min_confidence)
    .bind(domain)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
