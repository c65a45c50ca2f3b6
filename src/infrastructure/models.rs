use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::errors::{DomainError, Operation};
use crate::domain::order::{Order, OrderStatus, Task, User, Worker};
use crate::schema::{order_contains_tasks, orders, tasks, users, workers};

#[derive(Debug, Clone, Queryable, QueryableByName, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub worker_id: Option<Uuid>,
    pub user_id: Uuid,
    pub status: i32,
    pub address: String,
    pub creation_date: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub rate: i32,
}

impl TryFrom<OrderRow> for Order {
    type Error = DomainError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::try_from(row.status)
            .map_err(|e| DomainError::persistence(Operation::Select, e))?;
        Ok(Order {
            id: row.id,
            user_id: row.user_id,
            worker_id: row.worker_id,
            status,
            address: row.address,
            creation_date: row.creation_date,
            deadline: row.deadline,
            rate: row.rate,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub user_id: Uuid,
    pub status: i32,
    pub address: String,
    pub deadline: DateTime<Utc>,
}

/// Mutable columns of an order. A `None` worker clears the assignment.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = orders)]
#[diesel(treat_none_as_null = true)]
pub struct OrderChangeset {
    pub worker_id: Option<Uuid>,
    pub status: i32,
    pub rate: i32,
}

impl From<&Order> for OrderChangeset {
    fn from(order: &Order) -> Self {
        OrderChangeset {
            worker_id: order.worker_id,
            status: order.status.code(),
            rate: order.rate,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = order_contains_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderedTaskRow {
    pub order_id: Uuid,
    pub task_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_contains_tasks)]
pub struct NewOrderedTaskRow {
    pub order_id: Uuid,
    pub task_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    pub id: Uuid,
    pub name: String,
    pub price_per_single: BigDecimal,
    pub category: i32,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            name: row.name,
            price_per_single: row.price_per_single,
            category: row.category,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = workers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WorkerRow {
    pub id: Uuid,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub role: i32,
}

impl From<WorkerRow> for Worker {
    fn from(row: WorkerRow) -> Self {
        Worker {
            id: row.id,
            name: row.name,
            surname: row.surname,
            email: row.email,
            role: row.role,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub surname: String,
    pub address: String,
    pub email: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            surname: row.surname,
            address: row.address,
            email: row.email,
        }
    }
}
