use clap::Parser;
use fake::{
    faker::{address::en::CityName, internet::en::SafeEmail, name::en::Name},
    Fake,
};
use sqlx::sqlite::SqlitePoolOptions;
use staybook::{
    domain::{CreateUserRequest, PriceType, ServiceKind},
    repository::{NewRoomRate, SqliteCatalogRepository, SqliteUserRepository, UserRepository},
};

/// Seed a development database with users and a demo catalog.
#[derive(Debug, Parser)]
#[command(name = "seed")]
struct Args {
    /// Database URL (falls back to DATABASE_URL, then a local file)
    #[arg(long)]
    database_url: Option<String>,

    /// Number of random guest accounts to create
    #[arg(long, default_value_t = 5)]
    guests: usize,

    /// Number of demo packages to create
    #[arg(long, default_value_t = 2)]
    packages: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://staybook.db?mode=rwc".to_string());

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let user_repo = SqliteUserRepository::new(db_pool.clone());
    let catalog_repo = SqliteCatalogRepository::new(db_pool.clone());

    println!("👥 Creating users...");

    user_repo.create(CreateUserRequest {
        email: "admin@staybook.local".to_string(),
        full_name: "Admin User".to_string(),
        password: "admin123".to_string(),
        email_verified: true,
        is_admin: true,
    }).await?;
    println!("  ✅ Created admin user (admin@staybook.local / admin123)");

    user_repo.create(CreateUserRequest {
        email: "guest@example.com".to_string(),
        full_name: "Grace Guest".to_string(),
        password: "password123".to_string(),
        email_verified: true,
        is_admin: false,
    }).await?;
    println!("  ✅ Created guest user (guest@example.com / password123)");

    let mut created = 0;
    for _ in 0..args.guests {
        let request = CreateUserRequest {
            email: SafeEmail().fake(),
            full_name: Name().fake(),
            password: "password123".to_string(),
            email_verified: true,
            is_admin: false,
        };
        // Random emails can collide; skip those.
        if user_repo.create(request).await.is_ok() {
            created += 1;
        }
    }
    println!("  ✅ Created {} random guests", created);

    println!("🏠 Creating catalog...");

    for _ in 0..args.packages {
        let city: String = CityName().fake();
        let package = catalog_repo.create_package(&format!("{} Residence", city)).await?;

        for room_name in ["Studio", "Double Room", "Garden Suite"] {
            let nightly: i64 = (2_000..6_000).fake();
            catalog_repo.create_room(package.id, room_name, vec![
                NewRoomRate {
                    price_type: PriceType::Day,
                    fixed_price_cents: nightly,
                    discount_price_cents: None,
                    booking_price_cents: Some(5_000),
                },
                NewRoomRate {
                    price_type: PriceType::Week,
                    fixed_price_cents: nightly * 6,
                    discount_price_cents: Some(nightly * 5),
                    booking_price_cents: Some(7_500),
                },
                NewRoomRate {
                    price_type: PriceType::Month,
                    fixed_price_cents: nightly * 22,
                    discount_price_cents: None,
                    booking_price_cents: Some(15_000),
                },
            ]).await?;
        }

        catalog_repo.create_service(package.id, ServiceKind::Amenity, "Airport pickup", 3_500).await?;
        catalog_repo.create_service(package.id, ServiceKind::Amenity, "Breakfast hamper", 1_800).await?;
        catalog_repo.create_service(package.id, ServiceKind::Maintenance, "Weekly cleaning", 4_000).await?;
        catalog_repo.create_service(package.id, ServiceKind::Maintenance, "Linen change", 1_200).await?;

        println!("  ✅ Created package '{}' ({})", package.name, package.id);
    }

    println!("🎉 Seeding complete!");

    Ok(())
}
