use async_trait::async_trait;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{AddonService, Package, PriceType, Room, RoomRate, ServiceKind},
    error::{AppError, Result},
    repository::{parse_column, parse_uuid, CatalogRepository},
};

#[derive(FromRow)]
struct PackageRow {
    id: String,
    name: String,
    is_active: i32,
}

#[derive(FromRow)]
struct RoomRow {
    id: String,
    package_id: String,
    name: String,
}

#[derive(FromRow)]
struct RoomRateRow {
    id: String,
    room_id: String,
    price_type: String,
    fixed_price_cents: i64,
    discount_price_cents: Option<i64>,
    booking_price_cents: Option<i64>,
}

#[derive(FromRow)]
struct ServiceRow {
    id: String,
    package_id: String,
    name: String,
    price_cents: i64,
}

/// Rate tier input used when loading catalog data.
#[derive(Debug, Clone)]
pub struct NewRoomRate {
    pub price_type: PriceType,
    pub fixed_price_cents: i64,
    pub discount_price_cents: Option<i64>,
    pub booking_price_cents: Option<i64>,
}

pub struct SqliteCatalogRepository {
    pool: SqlitePool,
}

impl SqliteCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn service_table(kind: ServiceKind) -> &'static str {
        match kind {
            ServiceKind::Amenity => "amenities",
            ServiceKind::Maintenance => "maintenances",
        }
    }

    fn row_to_rate(row: RoomRateRow) -> Result<RoomRate> {
        Ok(RoomRate {
            id: parse_uuid(&row.id)?,
            room_id: parse_uuid(&row.room_id)?,
            price_type: parse_column(&row.price_type, "price type", PriceType::from_str)?,
            fixed_price_cents: row.fixed_price_cents,
            discount_price_cents: row.discount_price_cents,
            booking_price_cents: row.booking_price_cents,
        })
    }

    // Catalog management lives outside the booking engine; these writers
    // exist for seeding and test fixtures.

    pub async fn create_package(&self, name: &str) -> Result<Package> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO packages (id, name, is_active) VALUES (?, ?, 1)")
            .bind(id.to_string())
            .bind(name)
            .execute(&self.pool)
            .await?;

        self.find_package(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created package".to_string())
        })
    }

    pub async fn create_room(&self, package_id: Uuid, name: &str, rates: Vec<NewRoomRate>) -> Result<Room> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO rooms (id, package_id, name) VALUES (?, ?, ?)")
            .bind(id.to_string())
            .bind(package_id.to_string())
            .bind(name)
            .execute(&mut *tx)
            .await?;

        for (sort_order, rate) in rates.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO room_rates (
                    id, room_id, price_type, fixed_price_cents,
                    discount_price_cents, booking_price_cents, sort_order
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#
            )
            .bind(Uuid::new_v4().to_string())
            .bind(id.to_string())
            .bind(rate.price_type.as_str())
            .bind(rate.fixed_price_cents)
            .bind(rate.discount_price_cents)
            .bind(rate.booking_price_cents)
            .bind(sort_order as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_room(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created room".to_string())
        })
    }

    pub async fn create_service(
        &self,
        package_id: Uuid,
        kind: ServiceKind,
        name: &str,
        price_cents: i64,
    ) -> Result<AddonService> {
        let id = Uuid::new_v4();
        sqlx::query(&format!(
            "INSERT INTO {} (id, package_id, name, price_cents) VALUES (?, ?, ?, ?)",
            Self::service_table(kind)
        ))
        .bind(id.to_string())
        .bind(package_id.to_string())
        .bind(name)
        .bind(price_cents)
        .execute(&self.pool)
        .await?;

        Ok(AddonService {
            id,
            package_id,
            kind,
            name: name.to_string(),
            price_cents,
        })
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn find_package(&self, id: Uuid) -> Result<Option<Package>> {
        let row = sqlx::query_as::<_, PackageRow>(
            "SELECT id, name, is_active FROM packages WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(Package {
                id: parse_uuid(&r.id)?,
                name: r.name,
                is_active: r.is_active != 0,
            })
        })
        .transpose()
    }

    async fn find_room(&self, id: Uuid) -> Result<Option<Room>> {
        let row = sqlx::query_as::<_, RoomRow>(
            "SELECT id, package_id, name FROM rooms WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let rates = sqlx::query_as::<_, RoomRateRow>(
            r#"
            SELECT id, room_id, price_type, fixed_price_cents,
                   discount_price_cents, booking_price_cents
            FROM room_rates
            WHERE room_id = ?
            ORDER BY sort_order, rowid
            "#
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Self::row_to_rate)
        .collect::<Result<Vec<_>>>()?;

        Ok(Some(Room {
            id: parse_uuid(&row.id)?,
            package_id: parse_uuid(&row.package_id)?,
            name: row.name,
            rates,
        }))
    }

    async fn find_services(&self, kind: ServiceKind, ids: &[Uuid]) -> Result<Vec<AddonService>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT id, package_id, name, price_cents FROM {} WHERE id IN (",
            Self::service_table(kind)
        ));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(") ORDER BY name");

        let rows = query
            .build_query_as::<ServiceRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|r| {
                Ok(AddonService {
                    id: parse_uuid(&r.id)?,
                    package_id: parse_uuid(&r.package_id)?,
                    kind,
                    name: r.name,
                    price_cents: r.price_cents,
                })
            })
            .collect()
    }
}
