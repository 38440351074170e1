use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::registration::repo_types::{Registration, RegistrationRow};

const SELECT_COLUMNS: &str = r#"
    SELECT id, first_name, last_name, email, password_hash, phone, date_of_birth, gender,
           street, city, state, zip_code, country, interests, newsletter, terms_accepted,
           registration_date, last_updated
      FROM registrations
"#;

#[derive(Debug, Error)]
pub enum InsertError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Primary store for registration records.
#[async_trait]
pub trait RegistrationRepo: Send + Sync {
    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Registration>>;
    async fn insert(&self, record: &Registration) -> Result<(), InsertError>;
    /// Newest registration first.
    async fn list_recent_first(&self) -> anyhow::Result<Vec<Registration>>;
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Registration>>;
    async fn count(&self) -> anyhow::Result<i64>;
}

#[derive(Clone)]
pub struct PgRegistrationRepo {
    db: PgPool,
}

impl PgRegistrationRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RegistrationRepo for PgRegistrationRepo {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<Registration>> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!("{SELECT_COLUMNS} WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.db)
            .await
            .context("find registration by email")?;
        Ok(row.map(Registration::from))
    }

    async fn insert(&self, r: &Registration) -> Result<(), InsertError> {
        let result = sqlx::query(
            r#"
            INSERT INTO registrations (
                id, first_name, last_name, email, password_hash, phone, date_of_birth, gender,
                street, city, state, zip_code, country, interests, newsletter, terms_accepted,
                registration_date, last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(r.id)
        .bind(&r.first_name)
        .bind(&r.last_name)
        .bind(&r.email)
        .bind(&r.password_hash)
        .bind(&r.phone)
        .bind(r.date_of_birth)
        .bind(r.gender.as_str())
        .bind(&r.address.street)
        .bind(&r.address.city)
        .bind(&r.address.state)
        .bind(&r.address.zip_code)
        .bind(&r.address.country)
        .bind(&r.interests)
        .bind(r.newsletter)
        .bind(r.terms_accepted)
        .bind(r.registration_date)
        .bind(r.last_updated)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(InsertError::DuplicateEmail)
            }
            Err(e) => Err(InsertError::Backend(
                anyhow::Error::new(e).context("insert registration"),
            )),
        }
    }

    async fn list_recent_first(&self) -> anyhow::Result<Vec<Registration>> {
        let rows = sqlx::query_as::<_, RegistrationRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY registration_date DESC"
        ))
        .fetch_all(&self.db)
        .await
        .context("list registrations")?;
        Ok(rows.into_iter().map(Registration::from).collect())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Registration>> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("get registration by id")?;
        Ok(row.map(Registration::from))
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM registrations")
            .fetch_one(&self.db)
            .await
            .context("count registrations")?;
        Ok(count)
    }
}
