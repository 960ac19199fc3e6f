use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{GatewayPayment, PaymentMethod, PaymentOption, PaymentStatus},
    error::{AppError, Result},
    repository::{parse_column, parse_uuid, to_utc, PaymentRepository},
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    booking_id: String,
    method: String,
    amount_cents: i64,
    currency: String,
    status: String,
    transaction_id: Option<String>,
    payment_option: String,
    reference: Option<String>,
    admin_notes: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<GatewayPayment> {
        Ok(GatewayPayment {
            id: parse_uuid(&row.id)?,
            booking_id: parse_uuid(&row.booking_id)?,
            method: parse_column(&row.method, "payment method", PaymentMethod::from_str)?,
            amount_cents: row.amount_cents,
            currency: row.currency,
            status: parse_column(&row.status, "payment status", PaymentStatus::from_str)?,
            transaction_id: row.transaction_id,
            payment_option: parse_column(&row.payment_option, "payment option", PaymentOption::from_str)?,
            reference: row.reference,
            admin_notes: row.admin_notes,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    async fn fetch_one_by(&self, column: &str, value: String) -> Result<Option<GatewayPayment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT id, booking_id, method, amount_cents, currency, status,
                   transaction_id, payment_option, reference, admin_notes,
                   created_at, updated_at
            FROM payments
            WHERE {} = ?
            "#,
            column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn created(&self, id: Uuid) -> Result<GatewayPayment> {
        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }
}

/// Shared with the booking creation transaction.
pub(crate) async fn insert_payment(conn: &mut SqliteConnection, payment: &GatewayPayment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, booking_id, method, amount_cents, currency, status,
            transaction_id, payment_option, reference, admin_notes,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    )
    .bind(payment.id.to_string())
    .bind(payment.booking_id.to_string())
    .bind(payment.method.as_str())
    .bind(payment.amount_cents)
    .bind(&payment.currency)
    .bind(payment.status.as_str())
    .bind(&payment.transaction_id)
    .bind(payment.payment_option.as_str())
    .bind(&payment.reference)
    .bind(&payment.admin_notes)
    .bind(payment.created_at.naive_utc())
    .bind(payment.updated_at.naive_utc())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Cancels every pending attempt for the booking, whatever its method.
async fn supersede_pending(conn: &mut SqliteConnection, booking_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = 'cancelled', updated_at = ?
        WHERE booking_id = ? AND status = 'pending'
        "#
    )
    .bind(Utc::now().naive_utc())
    .bind(booking_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

fn log_superseded(count: u64, booking_id: Uuid) {
    if count > 0 {
        tracing::info!(
            "Cancelled {} outstanding payment attempt(s) for booking {}",
            count,
            booking_id
        );
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<GatewayPayment>> {
        self.fetch_one_by("id", id.to_string()).await
    }

    async fn find_by_booking(&self, booking_id: Uuid) -> Result<Vec<GatewayPayment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            r#"
            SELECT id, booking_id, method, amount_cents, currency, status,
                   transaction_id, payment_option, reference, admin_notes,
                   created_at, updated_at
            FROM payments
            WHERE booking_id = ?
            ORDER BY created_at DESC
            "#
        )
        .bind(booking_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_payment)
            .collect()
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<GatewayPayment>> {
        self.fetch_one_by("transaction_id", transaction_id.to_string()).await
    }

    async fn has_pending(&self, booking_id: Uuid, method: PaymentMethod) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM payments WHERE booking_id = ? AND method = ? AND status = 'pending'"
        )
        .bind(booking_id.to_string())
        .bind(method.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn record_card_attempt(&self, payment: GatewayPayment) -> Result<GatewayPayment> {
        let mut tx = self.pool.begin().await?;

        let superseded = supersede_pending(&mut tx, payment.booking_id).await?;
        insert_payment(&mut tx, &payment).await?;

        // Unpaid milestones no longer wait on a bank transfer
        sqlx::query(
            r#"
            UPDATE milestones
            SET payment_method = NULL, updated_at = ?
            WHERE booking_id = ? AND status <> 'paid' AND payment_method IS NOT NULL
            "#
        )
        .bind(Utc::now().naive_utc())
        .bind(payment.booking_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        log_superseded(superseded, payment.booking_id);
        self.created(payment.id).await
    }

    async fn record_offline_payment(&self, payment: GatewayPayment) -> Result<GatewayPayment> {
        let mut tx = self.pool.begin().await?;

        let superseded = supersede_pending(&mut tx, payment.booking_id).await?;
        insert_payment(&mut tx, &payment).await?;

        sqlx::query(
            r#"
            UPDATE milestones
            SET payment_method = 'bank_transfer', updated_at = ?
            WHERE booking_id = ? AND status <> 'paid'
            "#
        )
        .bind(Utc::now().naive_utc())
        .bind(payment.booking_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        log_superseded(superseded, payment.booking_id);
        self.created(payment.id).await
    }

    async fn resolve_pending(&self, id: Uuid, status: PaymentStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE payments SET status = ?, updated_at = ? WHERE id = ? AND status = 'pending'"
        )
        .bind(status.as_str())
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
