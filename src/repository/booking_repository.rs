use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        Booking, BookingPaymentStatus, BookingAddon, BookingStatus, Milestone, MilestoneStatus,
        MilestoneType, NewBooking, PaymentMethod, PaymentOption, PriceLine, PriceType,
        ServiceKind,
    },
    error::{AppError, Result},
    repository::{
        parse_column, parse_uuid, parse_uuid_list, payment_repository, to_utc, uuid_list_to_json,
        BookingRepository, Settlement,
    },
};

const BOOKING_COLUMNS: &str = r#"
    id, user_id, package_id, room_ids, start_date, end_date,
    contact_name, contact_email, contact_phone, price_type,
    room_subtotal_cents, addon_subtotal_cents, deposit_cents, grand_total_cents,
    payment_option, payment_method, amount_due_now_cents, price_breakdown,
    milestone_count, milestone_amount_cents, milestone_breakdown,
    status, payment_status, verification_token_hash, email_verified, verified_at,
    created_at, updated_at
"#;

#[derive(FromRow)]
struct BookingRow {
    id: String,
    user_id: String,
    package_id: String,
    room_ids: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    contact_name: String,
    contact_email: String,
    contact_phone: Option<String>,
    price_type: String,
    room_subtotal_cents: i64,
    addon_subtotal_cents: i64,
    deposit_cents: i64,
    grand_total_cents: i64,
    payment_option: String,
    payment_method: String,
    amount_due_now_cents: i64,
    price_breakdown: String,
    milestone_count: i64,
    milestone_amount_cents: i64,
    milestone_breakdown: String,
    status: String,
    payment_status: String,
    verification_token_hash: Option<String>,
    email_verified: i32,
    verified_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct MilestoneRow {
    id: String,
    booking_id: String,
    milestone_type: String,
    milestone_number: i64,
    due_date: NaiveDate,
    amount_cents: i64,
    status: String,
    payment_method: Option<String>,
    paid_at: Option<NaiveDateTime>,
    transaction_reference: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct BookingAddonRow {
    id: String,
    booking_id: String,
    kind: String,
    service_id: String,
    name: String,
    price_cents: i64,
}

pub struct SqliteBookingRepository {
    pool: SqlitePool,
}

impl SqliteBookingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: parse_uuid(&row.id)?,
            user_id: parse_uuid(&row.user_id)?,
            package_id: parse_uuid(&row.package_id)?,
            room_ids: parse_uuid_list(&row.room_ids)?,
            start_date: row.start_date,
            end_date: row.end_date,
            contact_name: row.contact_name,
            contact_email: row.contact_email,
            contact_phone: row.contact_phone,
            price_type: parse_column(&row.price_type, "price type", PriceType::from_str)?,
            room_subtotal_cents: row.room_subtotal_cents,
            addon_subtotal_cents: row.addon_subtotal_cents,
            deposit_cents: row.deposit_cents,
            grand_total_cents: row.grand_total_cents,
            payment_option: parse_column(&row.payment_option, "payment option", PaymentOption::from_str)?,
            payment_method: parse_column(&row.payment_method, "payment method", PaymentMethod::from_str)?,
            amount_due_now_cents: row.amount_due_now_cents,
            price_breakdown: parse_lines(&row.price_breakdown)?,
            milestone_count: row.milestone_count,
            milestone_amount_cents: row.milestone_amount_cents,
            milestone_breakdown: parse_lines(&row.milestone_breakdown)?,
            status: parse_column(&row.status, "booking status", BookingStatus::from_str)?,
            payment_status: parse_column(
                &row.payment_status,
                "payment status",
                BookingPaymentStatus::from_str,
            )?,
            verification_token_hash: row.verification_token_hash,
            email_verified: row.email_verified != 0,
            verified_at: row.verified_at.map(to_utc),
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    fn row_to_milestone(row: MilestoneRow) -> Result<Milestone> {
        Ok(Milestone {
            id: parse_uuid(&row.id)?,
            booking_id: parse_uuid(&row.booking_id)?,
            milestone_type: parse_column(&row.milestone_type, "milestone type", MilestoneType::from_str)?,
            milestone_number: row.milestone_number,
            due_date: row.due_date,
            amount_cents: row.amount_cents,
            status: parse_column(&row.status, "milestone status", MilestoneStatus::from_str)?,
            payment_method: row
                .payment_method
                .as_deref()
                .map(|m| parse_column(m, "payment method", PaymentMethod::from_str))
                .transpose()?,
            paid_at: row.paid_at.map(to_utc),
            transaction_reference: row.transaction_reference,
            created_at: to_utc(row.created_at),
            updated_at: to_utc(row.updated_at),
        })
    }

    fn row_to_addon(row: BookingAddonRow) -> Result<BookingAddon> {
        Ok(BookingAddon {
            id: parse_uuid(&row.id)?,
            booking_id: parse_uuid(&row.booking_id)?,
            kind: parse_column(&row.kind, "service kind", ServiceKind::from_str)?,
            service_id: parse_uuid(&row.service_id)?,
            name: row.name,
            price_cents: row.price_cents,
        })
    }

    async fn insert_booking(conn: &mut SqliteConnection, booking: &Booking) -> Result<()> {
        let room_ids = uuid_list_to_json(&booking.room_ids)?;
        let price_breakdown = lines_to_json(&booking.price_breakdown)?;
        let milestone_breakdown = lines_to_json(&booking.milestone_breakdown)?;

        sqlx::query(&format!(
            "INSERT INTO bookings ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            BOOKING_COLUMNS
        ))
        .bind(booking.id.to_string())
        .bind(booking.user_id.to_string())
        .bind(booking.package_id.to_string())
        .bind(room_ids)
        .bind(booking.start_date)
        .bind(booking.end_date)
        .bind(&booking.contact_name)
        .bind(&booking.contact_email)
        .bind(&booking.contact_phone)
        .bind(booking.price_type.as_str())
        .bind(booking.room_subtotal_cents)
        .bind(booking.addon_subtotal_cents)
        .bind(booking.deposit_cents)
        .bind(booking.grand_total_cents)
        .bind(booking.payment_option.as_str())
        .bind(booking.payment_method.as_str())
        .bind(booking.amount_due_now_cents)
        .bind(price_breakdown)
        .bind(booking.milestone_count)
        .bind(booking.milestone_amount_cents)
        .bind(milestone_breakdown)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(&booking.verification_token_hash)
        .bind(booking.email_verified as i32)
        .bind(booking.verified_at.map(|dt| dt.naive_utc()))
        .bind(booking.created_at.naive_utc())
        .bind(booking.updated_at.naive_utc())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn insert_addon(conn: &mut SqliteConnection, addon: &BookingAddon) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_services (id, booking_id, kind, service_id, name, price_cents)
            VALUES (?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(addon.id.to_string())
        .bind(addon.booking_id.to_string())
        .bind(addon.kind.as_str())
        .bind(addon.service_id.to_string())
        .bind(&addon.name)
        .bind(addon.price_cents)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn insert_milestone(conn: &mut SqliteConnection, milestone: &Milestone) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO milestones (
                id, booking_id, milestone_type, milestone_number, due_date,
                amount_cents, status, payment_method, paid_at,
                transaction_reference, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(milestone.id.to_string())
        .bind(milestone.booking_id.to_string())
        .bind(milestone.milestone_type.as_str())
        .bind(milestone.milestone_number)
        .bind(milestone.due_date)
        .bind(milestone.amount_cents)
        .bind(milestone.status.as_str())
        .bind(milestone.payment_method.map(|m| m.as_str()))
        .bind(milestone.paid_at.map(|dt| dt.naive_utc()))
        .bind(&milestone.transaction_reference)
        .bind(milestone.created_at.naive_utc())
        .bind(milestone.updated_at.naive_utc())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepository {
    async fn create(&self, new_booking: NewBooking) -> Result<Booking> {
        let booking_id = new_booking.booking.id;

        // Dropping the transaction without commit rolls everything back.
        let mut tx = self.pool.begin().await?;

        Self::insert_booking(&mut tx, &new_booking.booking).await?;

        for addon in &new_booking.addons {
            Self::insert_addon(&mut tx, addon).await?;
        }

        for milestone in &new_booking.milestones {
            Self::insert_milestone(&mut tx, milestone).await?;
        }

        if let Some(payment) = &new_booking.offline_payment {
            payment_repository::insert_payment(&mut tx, payment).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "Booking {} created with {} milestones",
            booking_id,
            new_booking.milestones.len()
        );

        self.find_by_id(booking_id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created booking".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = ?",
            BOOKING_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_booking).transpose()
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE user_id = ? ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings ORDER BY created_at DESC LIMIT ? OFFSET ?",
            BOOKING_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    async fn find_addons(&self, booking_id: Uuid) -> Result<Vec<BookingAddon>> {
        let rows = sqlx::query_as::<_, BookingAddonRow>(
            r#"
            SELECT id, booking_id, kind, service_id, name, price_cents
            FROM booking_services
            WHERE booking_id = ?
            ORDER BY kind, name
            "#
        )
        .bind(booking_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_addon).collect()
    }

    async fn find_milestones(&self, booking_id: Uuid) -> Result<Vec<Milestone>> {
        let rows = sqlx::query_as::<_, MilestoneRow>(
            r#"
            SELECT id, booking_id, milestone_type, milestone_number, due_date,
                   amount_cents, status, payment_method, paid_at,
                   transaction_reference, created_at, updated_at
            FROM milestones
            WHERE booking_id = ?
            ORDER BY milestone_number
            "#
        )
        .bind(booking_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_milestone).collect()
    }

    async fn mark_verified(&self, id: Uuid) -> Result<bool> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET email_verified = 1,
                verified_at = ?,
                verification_token_hash = NULL,
                updated_at = ?
            WHERE id = ? AND email_verified = 0
            "#
        )
        .bind(now)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn replace_verification_token(&self, id: Uuid, token_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET verification_token_hash = ?, updated_at = ?
            WHERE id = ? AND email_verified = 0
            "#
        )
        .bind(token_hash)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_status(&self, id: Uuid, status: BookingStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE bookings SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().naive_utc())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn cancel_unpaid(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = ?
            WHERE id = ? AND payment_status = 'pending'
            "#
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn settle_payment(&self, settlement: Settlement) -> Result<bool> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        let booking_updated = sqlx::query(
            r#"
            UPDATE bookings
            SET payment_status = 'paid', status = 'confirmed', updated_at = ?
            WHERE id = ?
              AND payment_status = 'pending'
              AND status NOT IN ('cancelled', 'rejected')
            "#
        )
        .bind(now)
        .bind(settlement.booking_id.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if booking_updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE milestones
            SET status = 'paid',
                payment_method = ?,
                paid_at = ?,
                transaction_reference = ?,
                updated_at = ?
            WHERE booking_id = ? AND milestone_number = 0
            "#
        )
        .bind(settlement.method.as_str())
        .bind(now)
        .bind(&settlement.transaction_reference)
        .bind(now)
        .bind(settlement.booking_id.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'completed',
                admin_notes = COALESCE(?, admin_notes),
                updated_at = ?
            WHERE id = ? AND booking_id = ?
            "#
        )
        .bind(&settlement.admin_notes)
        .bind(now)
        .bind(settlement.payment_id.to_string())
        .bind(settlement.booking_id.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

fn parse_lines(json: &str) -> Result<Vec<PriceLine>> {
    serde_json::from_str(json).map_err(|e| AppError::Database(format!("Invalid price breakdown: {}", e)))
}

fn lines_to_json(lines: &[PriceLine]) -> Result<String> {
    serde_json::to_string(lines).map_err(|e| AppError::Internal(e.to_string()))
}
