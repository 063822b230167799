//! # Seed Data Generator
//!
//! Populates the database with variants and vouchers for development.
//!
//! ## Usage
//! ```bash
//! # Seed the default development database
//! cargo run -p atlas-db --bin seed
//!
//! # Specify database path
//! cargo run -p atlas-db --bin seed -- --db ./data/atlas.db
//! ```
//!
//! ## Generated Data
//! - One variant per product/color/size combination with a unique SKU
//!   (`TEE-BLK-M`), a deterministic price and a starting stock level
//! - A handful of vouchers (limited, unlimited, expired) to exercise the
//!   discount path

use chrono::{Duration, Utc};
use std::env;
use uuid::Uuid;

use atlas_core::{Variant, Voucher};
use atlas_db::{Database, DbConfig};

/// Products with their base price in cents.
const PRODUCTS: &[(&str, &str, i64)] = &[
    ("TEE", "Classic Tee", 1999),
    ("HOOD", "Heavyweight Hoodie", 4999),
    ("CAP", "Logo Cap", 1499),
    ("SOCK", "Crew Socks", 899),
    ("TOTE", "Canvas Tote", 1299),
];

const COLORS: &[(&str, &str)] = &[
    ("BLK", "Black"),
    ("WHT", "White"),
    ("NVY", "Navy"),
    ("OLV", "Olive"),
];

const SIZES: &[&str] = &["S", "M", "L", "XL"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./atlas_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Atlas Commerce Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./atlas_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Atlas Commerce Seed Data Generator");
    println!("==================================");
    println!("Database: {db_path}");
    println!();

    // Connect to database
    let config = DbConfig::new(&db_path);
    let db = Database::new(config).await?;

    println!("* Connected to database, migrations applied");

    // Skip if already seeded
    let existing = db.variants().list_active(1).await?;
    if !existing.is_empty() {
        println!("! Database already has variants; skipping seed.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Generate variants
    println!();
    println!("Generating variants...");

    let now = Utc::now();
    let mut generated = 0;

    for (product_idx, (code, name, base_price)) in PRODUCTS.iter().enumerate() {
        let product_id = Uuid::new_v4().to_string();

        for (color_idx, (color_code, color_name)) in COLORS.iter().enumerate() {
            for (size_idx, size) in SIZES.iter().enumerate() {
                let seed = product_idx * 100 + color_idx * 10 + size_idx;

                let variant = Variant {
                    id: Uuid::new_v4().to_string(),
                    product_id: product_id.clone(),
                    sku: format!("{code}-{color_code}-{size}"),
                    name: name.to_string(),
                    color: Some(color_name.to_string()),
                    size: Some(size.to_string()),
                    price_cents: base_price + (size_idx as i64) * 200,
                    available: 5 + ((seed * 7) % 40) as i64,
                    reserved: 0,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                };

                if let Err(e) = db.variants().insert(&variant).await {
                    eprintln!("Failed to insert {}: {}", variant.sku, e);
                    continue;
                }

                generated += 1;
            }
        }
    }

    println!("* Generated {generated} variants");

    // Generate vouchers
    println!();
    println!("Generating vouchers...");

    let vouchers = [
        Voucher {
            id: Uuid::new_v4().to_string(),
            code: "WELCOME10".to_string(),
            discount_cents: 1000,
            min_subtotal_cents: 5000,
            usage_limit: None,
            used_count: 0,
            is_active: true,
            expires_at: None,
            created_at: now,
        },
        Voucher {
            id: Uuid::new_v4().to_string(),
            code: "FLASH25".to_string(),
            discount_cents: 2500,
            min_subtotal_cents: 10_000,
            usage_limit: Some(100),
            used_count: 0,
            is_active: true,
            expires_at: Some(now + Duration::days(7)),
            created_at: now,
        },
        Voucher {
            id: Uuid::new_v4().to_string(),
            code: "EXPIRED5".to_string(),
            discount_cents: 500,
            min_subtotal_cents: 0,
            usage_limit: None,
            used_count: 0,
            is_active: true,
            expires_at: Some(now - Duration::days(1)),
            created_at: now,
        },
    ];

    for voucher in &vouchers {
        db.vouchers().insert(voucher).await?;
        println!("  {}", voucher.code);
    }

    println!();
    println!("* Seed complete!");

    Ok(())
}
