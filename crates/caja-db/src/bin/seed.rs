//! # Seed Data Generator
//!
//! Populates the directory tables with demo operators, clients and rentals
//! for development.
//!
//! ## Usage
//! ```bash
//! # Use caja.toml from the platform config dir (or defaults)
//! cargo run -p caja-db --bin seed
//!
//! # Explicit config file
//! cargo run -p caja-db --bin seed -- --config ./caja.toml
//!
//! # Override the database path
//! cargo run -p caja-db --bin seed -- --db ./data/caja_dev.db
//! ```
//!
//! Rentals are written with their total and configured deposit; the
//! ledger itself starts empty. Open the register to start recording.

use std::env;
use std::path::PathBuf;

use caja_core::{Client, Money, Operator, RentalAccount};
use caja_db::migrations::migration_status;
use caja_db::{init_tracing, CajaConfig, Database, OperatorDirectory};
use tracing::info;

/// (id, name, active)
const OPERATORS: &[(&str, &str, bool)] = &[
    ("op-marta", "Marta Gómez", true),
    ("op-luis", "Luis Fernández", true),
    ("op-sofia", "Sofía Ramírez", true),
    ("op-jorge", "Jorge Castro", false),
];

/// (id, name)
const CLIENTS: &[(&str, &str)] = &[
    ("cli-001", "Ana Pérez"),
    ("cli-002", "Carlos Núñez"),
    ("cli-003", "Lucía Herrera"),
    ("cli-004", "Eventos del Sur"),
];

/// (id, client, total, deposit) as decimal strings.
const RENTALS: &[(&str, Option<&str>, &str, &str)] = &[
    ("ren-1001", Some("cli-001"), "2000.00", "500.00"),
    ("ren-1002", Some("cli-002"), "3500.50", "800.00"),
    ("ren-1003", Some("cli-003"), "1200.00", "0.00"),
    ("ren-1004", Some("cli-004"), "15000.00", "3000.00"),
    ("ren-1005", None, "650.00", "150.00"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Caja Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform caja.toml)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = CajaConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }
    init_tracing(&config);

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    info!(path = %config.database.path.display(), "Seeding caja database");

    let db = Database::new(config.db_config()).await?;
    if !db.health_check().await {
        return Err("database did not answer a health check".into());
    }
    let (total, applied) = migration_status(db.pool()).await?;
    info!(total, applied, "Schema ready");

    let directory = db.directory();

    for (id, name, is_active) in OPERATORS {
        directory
            .upsert_operator(&Operator {
                id: id.to_string(),
                name: name.to_string(),
                is_active: *is_active,
            })
            .await?;
    }

    for (id, name) in CLIENTS {
        directory
            .upsert_client(&Client {
                id: id.to_string(),
                name: name.to_string(),
            })
            .await?;
    }

    for (id, client, total, deposit) in RENTALS {
        directory
            .upsert_rental(&RentalAccount {
                id: id.to_string(),
                client_ref: client.map(str::to_string),
                total_cents: Money::parse_decimal(total)?.cents(),
                deposit_cents: Money::parse_decimal(deposit)?.cents(),
            })
            .await?;
    }

    let active = directory.active_operators().await?;
    info!(
        operators = OPERATORS.len(),
        active = active.len(),
        clients = CLIENTS.len(),
        rentals = RENTALS.len(),
        "Seed complete"
    );

    db.close().await;
    Ok(())
}
