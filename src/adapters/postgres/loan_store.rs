use crate::domain::loan::{Loan, LoanStatus, NewLoan};
use crate::domain::value_objects::{BookId, LoanId, UserId};
use crate::ports::loan_store::{LoanStore as LoanStoreTrait, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

const LOAN_COLUMNS: &str = "id, user_id, book_id, loan_date, due_date, return_date, status";

/// PostgreSQLの行データをLoanに変換する
///
/// ステータスの文字列変換に失敗した場合はInvalidDataとして扱う。
fn map_row_to_loan(row: &PgRow) -> Result<Loan> {
    let status_str: &str = row.get("status");
    let status = LoanStatus::from_str(status_str).map_err(|e| {
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            as Box<dyn std::error::Error + Send + Sync>
    })?;

    Ok(Loan {
        id: LoanId::new(row.get("id")),
        user_id: UserId::new(row.get("user_id")),
        book_id: BookId::new(row.get("book_id")),
        loan_date: row.get("loan_date"),
        due_date: row.get("due_date"),
        return_date: row.get("return_date"),
        status,
    })
}

/// LoanStoreのPostgreSQL実装
///
/// IDは`BIGSERIAL`で採番する。
/// 値はすべてバインドパラメータで渡し、SQL文字列には埋め込まない。
pub struct LoanStore {
    pool: PgPool,
}

impl LoanStore {
    /// PostgreSQLコネクションプールから新しいLoanStoreを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanStoreTrait for LoanStore {
    /// `BIGSERIAL`のシーケンスから次のIDを取り出す
    async fn reserve_id(&self) -> Result<LoanId> {
        let id: i64 = sqlx::query_scalar("SELECT nextval(pg_get_serial_sequence('loans', 'id'))")
            .fetch_one(&self.pool)
            .await?;

        Ok(LoanId::new(id))
    }

    async fn insert(&self, loan_id: LoanId, new_loan: NewLoan) -> Result<Loan> {
        sqlx::query(
            r#"
            INSERT INTO loans (id, user_id, book_id, loan_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(loan_id.value())
        .bind(new_loan.user_id.value())
        .bind(new_loan.book_id.value())
        .bind(new_loan.loan_date)
        .bind(new_loan.due_date)
        .bind(LoanStatus::Active.as_str())
        .execute(&self.pool)
        .await?;

        Ok(Loan::from_new(loan_id, new_loan))
    }

    async fn delete(&self, loan_id: LoanId) -> Result<()> {
        sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(loan_id.value())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// 貸出中の行だけを返却済みに更新する
    ///
    /// 同時に返却された場合、`WHERE status = 'ACTIVE'`により片方だけが成功する。
    async fn mark_returned(
        &self,
        loan_id: LoanId,
        returned_at: DateTime<Utc>,
    ) -> Result<Option<Loan>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE loans
            SET return_date = $1, status = $2
            WHERE id = $3 AND status = $4
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(returned_at)
        .bind(LoanStatus::Returned.as_str())
        .bind(loan_id.value())
        .bind(LoanStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        let row = sqlx::query(&format!("SELECT {} FROM loans WHERE id = $1", LOAN_COLUMNS))
            .bind(loan_id.value())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Loan>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM loans WHERE user_id = $1 ORDER BY loan_date DESC, id DESC",
            LOAN_COLUMNS
        ))
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan).collect()
    }

    async fn find_all(&self) -> Result<Vec<Loan>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM loans ORDER BY loan_date DESC, id DESC",
            LOAN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan).collect()
    }
}
