use std::collections::HashMap;

use dotenvy::dotenv;
use pikaclean_orders::{build_order_service, create_pool, run_migrations, AppError, Config};

fn main() -> Result<(), AppError> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url, &config.pool)?;
    run_migrations(&pool)?;

    let service = build_order_service(pool);

    let open = service.filter(&HashMap::from([(
        "status".to_string(),
        "1,2".to_string(),
    )]))?;
    let unassigned = service.filter(&HashMap::from([
        ("status".to_string(), "1".to_string()),
        ("worker_id".to_string(), "null".to_string()),
    ]))?;

    log::info!(
        "Order store ready: {} open order(s), {} awaiting a worker",
        open.len(),
        unassigned.len()
    );
    Ok(())
}
