use crate::domain::saga::{SagaKind, SagaRecord, SagaState};
use crate::domain::value_objects::{BookId, LoanId, SagaId};
use crate::ports::saga_log::{Result, SagaLog as SagaLogTrait};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

fn invalid_data(message: String) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

fn map_row_to_saga(row: &PgRow) -> Result<SagaRecord> {
    let kind = SagaKind::from_str(row.get("kind")).map_err(invalid_data)?;
    let state = SagaState::from_str(row.get("state")).map_err(invalid_data)?;

    Ok(SagaRecord {
        id: SagaId::from_uuid(row.get("saga_id")),
        kind,
        loan_id: LoanId::new(row.get("loan_id")),
        book_id: BookId::new(row.get("book_id")),
        observed_quantity: row.get("observed_quantity"),
        state,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// PostgreSQL implementation of SagaLog
///
/// Lives in the same database as the loans table so the intent record
/// survives a restart of the loan service.
pub struct SagaLog {
    pool: PgPool,
}

impl SagaLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SagaLogTrait for SagaLog {
    async fn open(&self, record: SagaRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO loan_sagas (
                saga_id,
                kind,
                loan_id,
                book_id,
                observed_quantity,
                state,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id.value())
        .bind(record.kind.as_str())
        .bind(record.loan_id.value())
        .bind(record.book_id.value())
        .bind(record.observed_quantity)
        .bind(record.state.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn observe(&self, saga_id: SagaId, quantity: i32) -> Result<()> {
        sqlx::query(
            "UPDATE loan_sagas SET observed_quantity = $1, updated_at = $2 WHERE saga_id = $3",
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(saga_id.value())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn close(&self, saga_id: SagaId, state: SagaState) -> Result<()> {
        sqlx::query("UPDATE loan_sagas SET state = $1, updated_at = $2 WHERE saga_id = $3")
            .bind(state.as_str())
            .bind(Utc::now())
            .bind(saga_id.value())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn pending(&self) -> Result<Vec<SagaRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT
                saga_id,
                kind,
                loan_id,
                book_id,
                observed_quantity,
                state,
                created_at,
                updated_at
            FROM loan_sagas
            WHERE state = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(SagaState::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_saga).collect()
    }
}
