//! End-to-end test: the order service wired to Postgres repositories.
//!
//! Starts a throwaway `postgres:16-alpine` container (Docker or Podman must be
//! available), applies the embedded migrations and walks an order through its
//! whole lifecycle using only the public service API.

use std::collections::HashMap;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use pikaclean_orders::build_order_service;
use pikaclean_orders::domain::errors::{DomainError, Entity};
use pikaclean_orders::domain::order::{OrderStatus, OrderedTaskInput};
use uuid::Uuid;

mod common;

use common::{insert_task, insert_user, insert_worker, setup_db};

struct Seed {
    user: Uuid,
    worker: Uuid,
    windows: Uuid,
    carpets: Uuid,
}

fn dec(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).expect("valid decimal")
}

#[tokio::test]
async fn order_lifecycle_against_postgres() {
    let (_container, pool) = setup_db().await;
    let seed = Seed {
        user: insert_user(&pool),
        worker: insert_worker(&pool),
        windows: insert_task(&pool, "Window washing", "300"),
        carpets: insert_task(&pool, "Carpet dry cleaning", "500"),
    };
    let service = build_order_service(pool);

    // ── Create ───────────────────────────────────────────────────────────────
    let order = service
        .create_order(
            seed.user,
            "221B Baker Street, apt. 12",
            Utc::now() + Duration::days(2),
            &[
                OrderedTaskInput {
                    task_id: seed.windows,
                    quantity: 2,
                },
                OrderedTaskInput {
                    task_id: seed.carpets,
                    quantity: 1,
                },
            ],
        )
        .expect("create failed");
    assert_eq!(order.status, OrderStatus::New);
    assert_eq!(service.get_total_price(order.id).expect("total"), dec("1100"));

    // ── Quantities ───────────────────────────────────────────────────────────
    assert_eq!(
        service
            .increment_task_quantity(order.id, seed.windows)
            .expect("increment"),
        3
    );
    assert_eq!(service.get_total_price(order.id).expect("total"), dec("1400"));

    // ── Assignment and rating ────────────────────────────────────────────────
    let rejected = service.update(order.id, OrderStatus::New, 4, Some(seed.worker));
    assert!(matches!(
        rejected,
        Err(DomainError::Validation { field: "rate", .. })
    ));

    let done = service
        .update(order.id, OrderStatus::Completed, 4, Some(seed.worker))
        .expect("complete");
    assert_eq!(done.worker_id, Some(seed.worker));
    assert_eq!(
        serde_json::to_value(&done).expect("serialize")["status"],
        "completed"
    );
    assert_eq!(
        service
            .get_average_worker_rate(seed.worker)
            .expect("average"),
        Some(dec("4"))
    );

    // ── Filtering ────────────────────────────────────────────────────────────
    let params = HashMap::from([
        ("status".to_string(), "3,4".to_string()),
        ("user_id".to_string(), seed.user.to_string()),
    ]);
    let finished = service.filter(&params).expect("filter");
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].id, order.id);

    // ── Delete ───────────────────────────────────────────────────────────────
    service.delete_order(order.id).expect("delete");
    assert!(service
        .get_tasks_in_order(order.id)
        .expect_err("order is gone")
        .is_not_found(Entity::Order));
    assert!(service
        .get_all_orders_by_user_id(seed.user)
        .expect("list")
        .is_empty());
}
