use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::CheckoutSelection,
    error::{AppError, Result},
    repository::{parse_uuid, parse_uuid_list, to_utc, uuid_list_to_json, CheckoutRepository},
};

#[derive(FromRow)]
struct SelectionRow {
    id: String,
    user_id: String,
    package_id: String,
    room_ids: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    amenity_ids: String,
    maintenance_ids: String,
    created_at: NaiveDateTime,
    expires_at: NaiveDateTime,
}

pub struct SqliteCheckoutRepository {
    pool: SqlitePool,
}

impl SqliteCheckoutRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_selection(row: SelectionRow) -> Result<CheckoutSelection> {
        Ok(CheckoutSelection {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            package_id: parse_uuid(&row.package_id)?,
            room_ids: parse_uuid_list(&row.room_ids)?,
            start_date: row.start_date,
            end_date: row.end_date,
            amenity_ids: parse_uuid_list(&row.amenity_ids)?,
            maintenance_ids: parse_uuid_list(&row.maintenance_ids)?,
            created_at: to_utc(row.created_at),
            expires_at: to_utc(row.expires_at),
        })
    }
}

#[async_trait]
impl CheckoutRepository for SqliteCheckoutRepository {
    async fn create(&self, selection: CheckoutSelection) -> Result<CheckoutSelection> {
        sqlx::query(
            r#"
            INSERT INTO checkout_selections (
                id, user_id, package_id, room_ids, start_date, end_date,
                amenity_ids, maintenance_ids, created_at, expires_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(selection.id.to_string())
        .bind(selection.user_id.to_string())
        .bind(selection.package_id.to_string())
        .bind(uuid_list_to_json(&selection.room_ids)?)
        .bind(selection.start_date)
        .bind(selection.end_date)
        .bind(uuid_list_to_json(&selection.amenity_ids)?)
        .bind(uuid_list_to_json(&selection.maintenance_ids)?)
        .bind(selection.created_at.naive_utc())
        .bind(selection.expires_at.naive_utc())
        .execute(&self.pool)
        .await?;

        self.find_by_id(selection.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created checkout selection".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CheckoutSelection>> {
        let row = sqlx::query_as::<_, SelectionRow>(
            r#"
            SELECT id, user_id, package_id, room_ids, start_date, end_date,
                   amenity_ids, maintenance_ids, created_at, expires_at
            FROM checkout_selections
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_selection).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM checkout_selections WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM checkout_selections WHERE user_id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM checkout_selections WHERE expires_at <= ?")
            .bind(now.naive_utc())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
