use std::collections::{HashMap, HashSet};

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use uuid::Uuid;

use crate::domain::errors::{DomainError, Entity};
use crate::domain::filter::OrderFilter;
use crate::domain::order::{
    NewOrder, Order, OrderStatus, OrderedTaskInput, Task, MAX_RATE, MIN_RATE,
};
use crate::domain::ports::{OrderRepository, TaskRepository, UserRepository, WorkerRepository};

fn invalid(field: &'static str, reason: impl Into<String>) -> DomainError {
    let err = DomainError::validation(field, reason);
    warn!("Rejected order operation: {}", err);
    err
}

pub struct OrderService<O, T, W, U> {
    orders: O,
    tasks: T,
    workers: W,
    users: U,
}

impl<O, T, W, U> OrderService<O, T, W, U>
where
    O: OrderRepository,
    T: TaskRepository,
    W: WorkerRepository,
    U: UserRepository,
{
    pub fn new(orders: O, tasks: T, workers: W, users: U) -> Self {
        Self {
            orders,
            tasks,
            workers,
            users,
        }
    }

    fn order(&self, id: Uuid) -> Result<Order, DomainError> {
        self.orders.get_order_by_id(id).inspect_err(|e| {
            error!("Failed to load order {}: {}", id, e);
        })
    }

    fn task(&self, id: Uuid) -> Result<Task, DomainError> {
        self.tasks.get_task_by_id(id).inspect_err(|e| {
            error!("Failed to load task {}: {}", id, e);
        })
    }

    fn ensure_user(&self, id: Uuid) -> Result<(), DomainError> {
        self.users
            .get_user_by_id(id)
            .map(|_| ())
            .inspect_err(|e| error!("Failed to load user {}: {}", id, e))
    }

    fn check_ordered_tasks(&self, tasks: &[OrderedTaskInput]) -> Result<(), DomainError> {
        if tasks.is_empty() {
            return Err(invalid("tasks", "an order needs at least one task"));
        }
        let mut seen = HashSet::with_capacity(tasks.len());
        for line in tasks {
            if line.quantity <= 0 {
                return Err(invalid(
                    "quantity",
                    format!("task {} ordered with quantity {}", line.task_id, line.quantity),
                ));
            }
            if !seen.insert(line.task_id) {
                return Err(invalid(
                    "tasks",
                    format!("task {} is listed more than once", line.task_id),
                ));
            }
            self.task(line.task_id)?;
        }
        Ok(())
    }

    /// Validate and persist a new order with status `New` and no worker.
    ///
    /// Nothing is written unless every check passes; the order row and its
    /// task links are then inserted in one transaction.
    pub fn create_order(
        &self,
        user_id: Uuid,
        address: &str,
        deadline: DateTime<Utc>,
        tasks: &[OrderedTaskInput],
    ) -> Result<Order, DomainError> {
        if address.trim().is_empty() {
            return Err(invalid("address", "must not be empty"));
        }
        if deadline <= Utc::now() {
            return Err(invalid(
                "deadline",
                format!("{} is not in the future", deadline.to_rfc3339()),
            ));
        }
        self.check_ordered_tasks(tasks)?;
        self.ensure_user(user_id)?;

        let order = self
            .orders
            .create(
                NewOrder {
                    user_id,
                    status: OrderStatus::New,
                    address: address.to_string(),
                    deadline,
                },
                tasks,
            )
            .inspect_err(|e| error!("Failed to create order for user {}: {}", user_id, e))?;

        info!(
            "Created order {} for user {} with {} task(s)",
            order.id,
            user_id,
            tasks.len()
        );
        Ok(order)
    }

    /// Delete the order and, atomically, every task link it owns.
    pub fn delete_order(&self, id: Uuid) -> Result<(), DomainError> {
        let order = self.order(id)?;
        self.orders
            .delete(order.id)
            .inspect_err(|e| error!("Failed to delete order {}: {}", id, e))?;
        info!("Deleted order {}", id);
        Ok(())
    }

    pub fn get_tasks_in_order(&self, order_id: Uuid) -> Result<Vec<Task>, DomainError> {
        self.order(order_id)?;
        self.orders.get_tasks_in_order(order_id)
    }

    pub fn get_order_by_id(&self, id: Uuid) -> Result<Order, DomainError> {
        self.order(id)
    }

    pub fn get_current_order_by_user_id(&self, user_id: Uuid) -> Result<Order, DomainError> {
        self.ensure_user(user_id)?;
        self.orders.get_current_order_by_user_id(user_id)
    }

    pub fn get_all_orders_by_user_id(&self, user_id: Uuid) -> Result<Vec<Order>, DomainError> {
        self.ensure_user(user_id)?;
        self.orders.get_all_orders_by_user_id(user_id)
    }

    /// Set status, rating and worker assignment in one write.
    ///
    /// `worker_id = None` unassigns the order. A non-zero rate is only
    /// accepted together with a terminal status. Any status may follow any
    /// other.
    pub fn update(
        &self,
        order_id: Uuid,
        status: OrderStatus,
        rate: i32,
        worker_id: Option<Uuid>,
    ) -> Result<Order, DomainError> {
        let mut order = self.order(order_id)?;

        if let Some(worker_id) = worker_id {
            self.workers
                .get_worker_by_id(worker_id)
                .inspect_err(|e| error!("Failed to load worker {}: {}", worker_id, e))?;
        }
        if !status.is_assignable() {
            return Err(invalid("status", format!("{} cannot be assigned", status)));
        }
        if rate != 0 && !status.is_terminal() {
            return Err(invalid(
                "rate",
                format!("only completed or cancelled orders can be rated, not {}", status),
            ));
        }
        if !(MIN_RATE..=MAX_RATE).contains(&rate) {
            return Err(invalid(
                "rate",
                format!("{} is outside {}..={}", rate, MIN_RATE, MAX_RATE),
            ));
        }

        order.worker_id = worker_id;
        order.status = status;
        order.rate = rate;

        let updated = self
            .orders
            .update(&order)
            .inspect_err(|e| error!("Failed to update order {}: {}", order_id, e))?;
        info!(
            "Updated order {}: status {}, rate {}, worker {:?}",
            order_id, status, rate, worker_id
        );
        Ok(updated)
    }

    fn is_attached(&self, order_id: Uuid, task_id: Uuid) -> Result<bool, DomainError> {
        Ok(self
            .orders
            .get_tasks_in_order(order_id)?
            .iter()
            .any(|t| t.id == task_id))
    }

    pub fn add_task(&self, order_id: Uuid, task_id: Uuid) -> Result<(), DomainError> {
        self.order(order_id)?;
        self.task(task_id)?;
        if self.is_attached(order_id, task_id)? {
            return Err(invalid(
                "task",
                format!("task {} is already attached to order {}", task_id, order_id),
            ));
        }
        self.orders
            .add_task_to_order(order_id, task_id)
            .inspect_err(|e| {
                error!("Failed to attach task {} to {}: {}", task_id, order_id, e)
            })?;
        info!("Attached task {} to order {}", task_id, order_id);
        Ok(())
    }

    pub fn remove_task(&self, order_id: Uuid, task_id: Uuid) -> Result<(), DomainError> {
        self.order(order_id)?;
        self.task(task_id)?;
        if !self.is_attached(order_id, task_id)? {
            warn!("Task {} is not attached to order {}", task_id, order_id);
            return Err(DomainError::NotFound(Entity::OrderedTask));
        }
        self.orders
            .remove_task_from_order(order_id, task_id)
            .inspect_err(|e| {
                error!("Failed to detach task {} from {}: {}", task_id, order_id, e)
            })?;
        info!("Detached task {} from order {}", task_id, order_id);
        Ok(())
    }

    fn adjust_task_quantity(
        &self,
        order_id: Uuid,
        task_id: Uuid,
        delta: i32,
    ) -> Result<i32, DomainError> {
        self.order(order_id)?;
        self.task(task_id)?;
        let quantity = self
            .orders
            .adjust_task_quantity(order_id, task_id, delta)
            .inspect_err(|e| {
                warn!(
                    "Failed to change quantity of task {} in order {} by {}: {}",
                    task_id, order_id, delta, e
                )
            })?;
        info!(
            "Quantity of task {} in order {} is now {}",
            task_id, order_id, quantity
        );
        Ok(quantity)
    }

    pub fn increment_task_quantity(
        &self,
        order_id: Uuid,
        task_id: Uuid,
    ) -> Result<i32, DomainError> {
        self.adjust_task_quantity(order_id, task_id, 1)
    }

    /// Fails, leaving the quantity untouched, when it is already zero.
    pub fn decrement_task_quantity(
        &self,
        order_id: Uuid,
        task_id: Uuid,
    ) -> Result<i32, DomainError> {
        self.adjust_task_quantity(order_id, task_id, -1)
    }

    pub fn set_task_quantity(
        &self,
        order_id: Uuid,
        task_id: Uuid,
        quantity: i32,
    ) -> Result<(), DomainError> {
        if quantity < 0 {
            return Err(invalid("quantity", format!("{} is negative", quantity)));
        }
        self.order(order_id)?;
        self.task(task_id)?;
        self.orders
            .update_task_quantity(order_id, task_id, quantity)
            .inspect_err(|e| error!("Failed to set quantity in order {}: {}", order_id, e))?;
        info!(
            "Set quantity of task {} in order {} to {}",
            task_id, order_id, quantity
        );
        Ok(())
    }

    pub fn get_task_quantity(&self, order_id: Uuid, task_id: Uuid) -> Result<i32, DomainError> {
        self.order(order_id)?;
        self.task(task_id)?;
        self.orders.get_task_quantity(order_id, task_id)
    }

    /// Orders matching a `field -> value` map; see [`OrderFilter`].
    pub fn filter(&self, params: &HashMap<String, String>) -> Result<Vec<Order>, DomainError> {
        let filter = OrderFilter::parse(params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .map_err(|e| invalid("filter", e.to_string()))?;
        let orders = self
            .orders
            .filter(&filter)
            .inspect_err(|e| error!("Failed to filter orders by {:?}: {}", params, e))?;
        info!("Filter {:?} matched {} order(s)", params, orders.len());
        Ok(orders)
    }

    /// Sum of `quantity * price_per_single` over the tasks attached to the order.
    pub fn get_total_price(&self, order_id: Uuid) -> Result<BigDecimal, DomainError> {
        self.order(order_id)?;
        let total = self
            .orders
            .get_ordered_tasks(order_id)?
            .iter()
            .map(|line| line.subtotal())
            .fold(BigDecimal::from(0), |acc, subtotal| acc + subtotal);
        info!("Total price of order {} is {}", order_id, total);
        Ok(total)
    }

    /// Mean rating of the worker's completed orders, ignoring unrated ones.
    pub fn get_average_worker_rate(
        &self,
        worker_id: Uuid,
    ) -> Result<Option<BigDecimal>, DomainError> {
        self.workers.get_worker_by_id(worker_id)?;
        self.orders.average_worker_rate(worker_id)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Duration;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::order::{User, Worker};
    use crate::infrastructure::InMemoryStore;

    type TestService = OrderService<InMemoryStore, InMemoryStore, InMemoryStore, InMemoryStore>;

    struct Fixture {
        service: TestService,
        store: InMemoryStore,
        user: Uuid,
        worker: Uuid,
        t1: Uuid,
        t2: Uuid,
    }

    fn dec(raw: &str) -> BigDecimal {
        BigDecimal::from_str(raw).expect("valid decimal")
    }

    fn seed_task(store: &InMemoryStore, name: &str, price: &str) -> Uuid {
        let id = Uuid::new_v4();
        store
            .insert_task(Task {
                id,
                name: name.to_string(),
                price_per_single: dec(price),
                category: 1,
            })
            .expect("seed task");
        id
    }

    #[fixture]
    fn fx() -> Fixture {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store
            .insert_user(User {
                id: user,
                name: "Anna".to_string(),
                surname: "Petrova".to_string(),
                address: "221B Baker Street".to_string(),
                email: "anna@example.com".to_string(),
            })
            .expect("seed user");
        let worker = Uuid::new_v4();
        store
            .insert_worker(Worker {
                id: worker,
                name: "Ivan".to_string(),
                surname: "Sidorov".to_string(),
                email: "ivan@example.com".to_string(),
                role: 2,
            })
            .expect("seed worker");
        let t1 = seed_task(&store, "General cleaning", "300");
        let t2 = seed_task(&store, "Window washing", "500");
        let service = OrderService::new(store.clone(), store.clone(), store.clone(), store.clone());
        Fixture {
            service,
            store,
            user,
            worker,
            t1,
            t2,
        }
    }

    fn tomorrow() -> DateTime<Utc> {
        Utc::now() + Duration::days(1)
    }

    fn line(task_id: Uuid, quantity: i32) -> OrderedTaskInput {
        OrderedTaskInput { task_id, quantity }
    }

    fn place(fx: &Fixture) -> Order {
        fx.service
            .create_order(
                fx.user,
                "221B Baker Street",
                tomorrow(),
                &[line(fx.t1, 2), line(fx.t2, 1)],
            )
            .expect("create failed")
    }

    fn assert_invalid(result: Result<impl std::fmt::Debug, DomainError>, expected: &str) {
        match result {
            Err(DomainError::Validation { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected validation error on {expected}, got {other:?}"),
        }
    }

    #[rstest]
    fn created_order_is_new_and_unassigned(fx: Fixture) {
        let order = place(&fx);

        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.worker_id, None);
        assert_eq!(order.rate, 0);
        assert_eq!(order.user_id, fx.user);
        assert_eq!(fx.service.get_tasks_in_order(order.id).expect("tasks").len(), 2);
    }

    #[rstest]
    fn empty_task_list_is_rejected_without_writing(fx: Fixture) {
        assert_invalid(
            fx.service
                .create_order(fx.user, "221B Baker Street", tomorrow(), &[]),
            "tasks",
        );
        assert!(fx
            .service
            .get_all_orders_by_user_id(fx.user)
            .expect("list")
            .is_empty());
    }

    #[rstest]
    fn past_deadline_is_rejected(fx: Fixture) {
        let yesterday = Utc::now() - Duration::days(1);
        assert_invalid(
            fx.service
                .create_order(fx.user, "221B Baker Street", yesterday, &[line(fx.t1, 1)]),
            "deadline",
        );
    }

    #[rstest]
    fn blank_address_is_rejected(fx: Fixture) {
        assert_invalid(
            fx.service
                .create_order(fx.user, "  ", tomorrow(), &[line(fx.t1, 1)]),
            "address",
        );
    }

    #[rstest]
    #[case(0)]
    #[case(-3)]
    fn non_positive_initial_quantity_is_rejected(fx: Fixture, #[case] quantity: i32) {
        assert_invalid(
            fx.service
                .create_order(fx.user, "221B Baker Street", tomorrow(), &[line(fx.t1, quantity)]),
            "quantity",
        );
    }

    #[rstest]
    fn duplicate_task_in_request_is_rejected(fx: Fixture) {
        assert_invalid(
            fx.service.create_order(
                fx.user,
                "221B Baker Street",
                tomorrow(),
                &[line(fx.t1, 1), line(fx.t1, 2)],
            ),
            "tasks",
        );
    }

    #[rstest]
    fn unknown_task_or_user_is_not_found(fx: Fixture) {
        let err = fx
            .service
            .create_order(fx.user, "221B Baker Street", tomorrow(), &[line(Uuid::new_v4(), 1)])
            .expect_err("unknown task");
        assert!(err.is_not_found(Entity::Task));

        let err = fx
            .service
            .create_order(Uuid::new_v4(), "221B Baker Street", tomorrow(), &[line(fx.t1, 1)])
            .expect_err("unknown user");
        assert!(err.is_not_found(Entity::User));
    }

    #[rstest]
    fn total_price_tracks_quantity_changes(fx: Fixture) {
        let order = place(&fx);
        assert_eq!(fx.service.get_total_price(order.id).expect("total"), dec("1100"));

        assert_eq!(
            fx.service
                .increment_task_quantity(order.id, fx.t1)
                .expect("increment"),
            3
        );
        assert_eq!(fx.service.get_total_price(order.id).expect("total"), dec("1400"));

        let completed = fx
            .service
            .update(order.id, OrderStatus::Completed, 4, None)
            .expect("rating a completed order");
        assert_eq!(completed.rate, 4);
        assert_eq!(completed.status, OrderStatus::Completed);

        let fresh = place(&fx);
        assert_invalid(
            fx.service.update(fresh.id, OrderStatus::New, 4, None),
            "rate",
        );
    }

    #[rstest]
    fn total_price_uses_exact_decimals(fx: Fixture) {
        let cheap = seed_task(&fx.store, "Dusting", "0.10");
        let order = fx
            .service
            .create_order(fx.user, "221B Baker Street", tomorrow(), &[line(cheap, 3)])
            .expect("create failed");
        assert_eq!(fx.service.get_total_price(order.id).expect("total"), dec("0.30"));
    }

    #[rstest]
    #[case(OrderStatus::New)]
    #[case(OrderStatus::InProgress)]
    fn non_terminal_status_cannot_be_rated(fx: Fixture, #[case] status: OrderStatus) {
        let order = place(&fx);
        assert_invalid(fx.service.update(order.id, status, 3, None), "rate");
        assert_eq!(
            fx.service.get_order_by_id(order.id).expect("order").rate,
            0
        );
    }

    #[rstest]
    fn rate_out_of_range_is_rejected(fx: Fixture) {
        let order = place(&fx);
        assert_invalid(
            fx.service.update(order.id, OrderStatus::Cancelled, 6, None),
            "rate",
        );
        assert_invalid(
            fx.service.update(order.id, OrderStatus::Completed, -1, None),
            "rate",
        );
    }

    #[rstest]
    fn undefined_status_is_rejected(fx: Fixture) {
        let order = place(&fx);
        assert_invalid(
            fx.service.update(order.id, OrderStatus::Undefined, 0, None),
            "status",
        );
    }

    #[rstest]
    fn any_status_may_follow_any_other(fx: Fixture) {
        let order = place(&fx);
        fx.service
            .update(order.id, OrderStatus::Cancelled, 0, None)
            .expect("cancel");
        let reopened = fx
            .service
            .update(order.id, OrderStatus::New, 0, None)
            .expect("reopen");
        assert_eq!(reopened.status, OrderStatus::New);
    }

    #[rstest]
    fn worker_is_assigned_and_cleared(fx: Fixture) {
        let order = place(&fx);

        let assigned = fx
            .service
            .update(order.id, OrderStatus::InProgress, 0, Some(fx.worker))
            .expect("assign");
        assert_eq!(assigned.worker_id, Some(fx.worker));

        let cleared = fx
            .service
            .update(order.id, OrderStatus::InProgress, 0, None)
            .expect("unassign");
        assert_eq!(cleared.worker_id, None);
        assert!(fx.service.get_order_by_id(order.id).is_ok());
    }

    #[rstest]
    fn unknown_worker_is_not_found(fx: Fixture) {
        let order = place(&fx);
        let err = fx
            .service
            .update(order.id, OrderStatus::InProgress, 0, Some(Uuid::new_v4()))
            .expect_err("unknown worker");
        assert!(err.is_not_found(Entity::Worker));
    }

    #[rstest]
    fn decrement_at_zero_fails_and_keeps_quantity(fx: Fixture) {
        let order = place(&fx);
        fx.service
            .set_task_quantity(order.id, fx.t2, 1)
            .expect("set");
        assert_eq!(
            fx.service
                .decrement_task_quantity(order.id, fx.t2)
                .expect("decrement"),
            0
        );

        assert_invalid(
            fx.service.decrement_task_quantity(order.id, fx.t2),
            "quantity",
        );
        assert_eq!(
            fx.service.get_task_quantity(order.id, fx.t2).expect("qty"),
            0
        );
        // still attached with nothing ordered
        assert_eq!(fx.service.get_tasks_in_order(order.id).expect("tasks").len(), 2);
    }

    #[rstest]
    fn negative_set_quantity_is_rejected(fx: Fixture) {
        let order = place(&fx);
        assert_invalid(
            fx.service.set_task_quantity(order.id, fx.t1, -1),
            "quantity",
        );
        assert_eq!(
            fx.service.get_task_quantity(order.id, fx.t1).expect("qty"),
            2
        );
    }

    #[rstest]
    fn tasks_are_added_once_and_removed_once(fx: Fixture) {
        let t3 = seed_task(&fx.store, "Carpet cleaning", "150");
        let order = place(&fx);

        fx.service.add_task(order.id, t3).expect("add");
        assert_eq!(fx.service.get_task_quantity(order.id, t3).expect("qty"), 1);
        assert_invalid(fx.service.add_task(order.id, t3), "task");

        fx.service.remove_task(order.id, t3).expect("remove");
        let err = fx
            .service
            .remove_task(order.id, t3)
            .expect_err("already removed");
        assert!(err.is_not_found(Entity::OrderedTask));
    }

    #[rstest]
    fn delete_removes_order_and_links(fx: Fixture) {
        let order = place(&fx);

        fx.service.delete_order(order.id).expect("delete");

        assert_eq!(fx.store.link_count(order.id).expect("links"), 0);
        assert!(fx
            .service
            .get_order_by_id(order.id)
            .expect_err("gone")
            .is_not_found(Entity::Order));
        assert!(fx
            .service
            .delete_order(order.id)
            .expect_err("second delete")
            .is_not_found(Entity::Order));
    }

    #[rstest]
    fn current_order_is_latest_for_user(fx: Fixture) {
        place(&fx);
        let latest = place(&fx);

        assert_eq!(
            fx.service
                .get_current_order_by_user_id(fx.user)
                .expect("current")
                .id,
            latest.id
        );
        assert!(fx
            .service
            .get_current_order_by_user_id(Uuid::new_v4())
            .expect_err("unknown user")
            .is_not_found(Entity::User));
    }

    #[rstest]
    fn filter_by_status_list_is_a_union(fx: Fixture) {
        let new = place(&fx);
        let in_progress = place(&fx);
        let done = place(&fx);
        fx.service
            .update(in_progress.id, OrderStatus::InProgress, 0, Some(fx.worker))
            .expect("start");
        fx.service
            .update(done.id, OrderStatus::Completed, 5, Some(fx.worker))
            .expect("finish");

        let query = |pairs: &[(&str, &str)]| -> HashSet<Uuid> {
            let params: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            fx.service
                .filter(&params)
                .expect("filter")
                .into_iter()
                .map(|o| o.id)
                .collect()
        };

        let union = query(&[("status", "1,2")]);
        let expected: HashSet<Uuid> = query(&[("status", "1")])
            .union(&query(&[("status", "2")]))
            .copied()
            .collect();
        assert_eq!(union, expected);
        assert_eq!(union, HashSet::from([new.id, in_progress.id]));

        let unassigned = query(&[("worker_id", "null")]);
        assert_eq!(unassigned, HashSet::from([new.id]));
    }

    #[rstest]
    fn filter_rejects_unknown_fields(fx: Fixture) {
        let params = HashMap::from([("password".to_string(), "x".to_string())]);
        assert_invalid(fx.service.filter(&params), "filter");
    }

    #[rstest]
    fn average_worker_rate_ignores_unrated_orders(fx: Fixture) {
        for rate in [3, 4, 0] {
            let order = place(&fx);
            fx.service
                .update(order.id, OrderStatus::Completed, rate, Some(fx.worker))
                .expect("complete");
        }
        assert_eq!(
            fx.service
                .get_average_worker_rate(fx.worker)
                .expect("average"),
            Some(dec("3.5"))
        );
    }
}
