use bigdecimal::BigDecimal;
use uuid::Uuid;

use super::errors::DomainError;
use super::filter::OrderFilter;
use super::order::{NewOrder, Order, OrderedTask, OrderedTaskInput, Task, User, Worker};

pub trait OrderRepository: Send + Sync + 'static {
    /// Insert the order and one association per task in a single transaction.
    fn create(&self, order: NewOrder, tasks: &[OrderedTaskInput]) -> Result<Order, DomainError>;
    /// Remove every association of the order, then the order row, atomically.
    fn delete(&self, id: Uuid) -> Result<(), DomainError>;
    /// Persist status, rate and worker assignment; returns the stored row.
    fn update(&self, order: &Order) -> Result<Order, DomainError>;
    fn get_order_by_id(&self, id: Uuid) -> Result<Order, DomainError>;
    fn get_tasks_in_order(&self, id: Uuid) -> Result<Vec<Task>, DomainError>;
    fn get_ordered_tasks(&self, id: Uuid) -> Result<Vec<OrderedTask>, DomainError>;
    /// Most recently created order of the user.
    fn get_current_order_by_user_id(&self, user_id: Uuid) -> Result<Order, DomainError>;
    fn get_all_orders_by_user_id(&self, user_id: Uuid) -> Result<Vec<Order>, DomainError>;
    fn filter(&self, filter: &OrderFilter) -> Result<Vec<Order>, DomainError>;
    /// Attach a task with the store's default quantity.
    fn add_task_to_order(&self, order_id: Uuid, task_id: Uuid) -> Result<(), DomainError>;
    fn remove_task_from_order(&self, order_id: Uuid, task_id: Uuid) -> Result<(), DomainError>;
    fn update_task_quantity(
        &self,
        order_id: Uuid,
        task_id: Uuid,
        quantity: i32,
    ) -> Result<(), DomainError>;
    /// Add `delta` to the stored quantity in one statement and return the new
    /// value. Fails without writing if the result would drop below zero.
    fn adjust_task_quantity(
        &self,
        order_id: Uuid,
        task_id: Uuid,
        delta: i32,
    ) -> Result<i32, DomainError>;
    fn get_task_quantity(&self, order_id: Uuid, task_id: Uuid) -> Result<i32, DomainError>;
    /// Mean rating over the worker's rated, completed orders.
    fn average_worker_rate(&self, worker_id: Uuid) -> Result<Option<BigDecimal>, DomainError>;
}

pub trait TaskRepository: Send + Sync + 'static {
    fn get_task_by_id(&self, id: Uuid) -> Result<Task, DomainError>;
}

pub trait WorkerRepository: Send + Sync + 'static {
    fn get_worker_by_id(&self, id: Uuid) -> Result<Worker, DomainError>;
}

pub trait UserRepository: Send + Sync + 'static {
    fn get_user_by_id(&self, id: Uuid) -> Result<User, DomainError>;
}
