pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod infrastructure;
pub mod schema;

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub use application::OrderService;
pub use config::Config;
pub use db::{create_pool, DbPool};
pub use errors::AppError;

use infrastructure::{
    DieselOrderRepository, DieselTaskRepository, DieselUserRepository, DieselWorkerRepository,
};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Order service wired to Postgres repositories sharing one pool.
pub type PgOrderService = OrderService<
    DieselOrderRepository,
    DieselTaskRepository,
    DieselWorkerRepository,
    DieselUserRepository,
>;

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), AppError> {
    let mut conn = pool.get()?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| AppError::Migration(e.to_string()))?;
    log::info!("Applied {} pending migration(s)", applied.len());
    Ok(())
}

/// Build an order service whose repositories all draw from `pool`.
pub fn build_order_service(pool: DbPool) -> PgOrderService {
    OrderService::new(
        DieselOrderRepository::new(pool.clone()),
        DieselTaskRepository::new(pool.clone()),
        DieselWorkerRepository::new(pool.clone()),
        DieselUserRepository::new(pool),
    )
}
