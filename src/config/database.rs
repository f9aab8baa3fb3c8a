//! Database configuration module.
//!
//! Handles `SQLite` connection setup and table creation using `SeaORM`.
//! Tables are generated straight from the entity definitions with
//! `Schema::create_table_from_entity`, so the database schema always matches
//! the Rust struct definitions without hand-written SQL.

use crate::entities::{Account, Charge, Invoice, Notification, Payment, ResetToken, Student};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Gets the database URL from the environment or returns the default
/// local `SQLite` path.
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/lodgebook.sqlite".to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`,
/// falling back to a local `SQLite` file if the variable is unset.
pub async fn create_connection() -> Result<DatabaseConnection> {
    Database::connect(get_database_url()).await.map_err(Into::into)
}

/// Creates all tables from the entity definitions, skipping any that
/// already exist. Safe to call on every worker start.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut statements = vec![
        schema.create_table_from_entity(Account),
        schema.create_table_from_entity(Student),
        schema.create_table_from_entity(Charge),
        schema.create_table_from_entity(Payment),
        schema.create_table_from_entity(Invoice),
        schema.create_table_from_entity(ResetToken),
        schema.create_table_from_entity(Notification),
    ];

    for statement in &mut statements {
        statement.if_not_exists();
        db.execute(builder.build(statement)).await?;
    }

    Ok(())
}
