use bigdecimal::BigDecimal;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{Integer, Text};
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::{DomainError, Entity, Operation};
use crate::domain::filter::{FilterValue, OrderFilter};
use crate::domain::order::{NewOrder, Order, OrderStatus, OrderedTask, OrderedTaskInput, Task};
use crate::domain::ports::OrderRepository;
use crate::schema::{order_contains_tasks, orders, tasks};

use super::models::{NewOrderRow, NewOrderedTaskRow, OrderChangeset, OrderRow, TaskRow};

const ORDER_COLUMNS: &str =
    "id, worker_id, user_id, status, address, creation_date, deadline, rate";

// ── Error conversions (infrastructure concern only) ──────────────────────────

impl From<diesel::result::Error> for DomainError {
    fn from(e: diesel::result::Error) -> Self {
        DomainError::persistence(Operation::Transaction, e)
    }
}

impl From<r2d2::Error> for DomainError {
    fn from(e: r2d2::Error) -> Self {
        DomainError::persistence(Operation::Connection, e)
    }
}

fn failed(operation: Operation) -> impl Fn(diesel::result::Error) -> DomainError {
    move |e| DomainError::persistence(operation, e)
}

// ── Repository ────────────────────────────────────────────────────────────────

pub struct DieselOrderRepository {
    pool: DbPool,
}

impl DieselOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn load_task_quantity(
    conn: &mut PgConnection,
    order_id: Uuid,
    task_id: Uuid,
) -> Result<i32, DomainError> {
    order_contains_tasks::table
        .filter(order_contains_tasks::order_id.eq(order_id))
        .filter(order_contains_tasks::task_id.eq(task_id))
        .select(order_contains_tasks::quantity)
        .first::<i32>(conn)
        .optional()
        .map_err(failed(Operation::Select))?
        .ok_or(DomainError::NotFound(Entity::OrderedTask))
}

fn rows_to_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>, DomainError> {
    rows.into_iter().map(Order::try_from).collect()
}

impl OrderRepository for DieselOrderRepository {
    fn create(&self, order: NewOrder, tasks: &[OrderedTaskInput]) -> Result<Order, DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            // 1. Insert the order, letting the database assign id and creation date
            let row = diesel::insert_into(orders::table)
                .values(&NewOrderRow {
                    user_id: order.user_id,
                    status: order.status.code(),
                    address: order.address,
                    deadline: order.deadline,
                })
                .returning(OrderRow::as_returning())
                .get_result(conn)
                .map_err(failed(Operation::Insert))?;

            // 2. Link every requested task to it
            let links: Vec<NewOrderedTaskRow> = tasks
                .iter()
                .map(|t| NewOrderedTaskRow {
                    order_id: row.id,
                    task_id: t.task_id,
                    quantity: t.quantity,
                })
                .collect();
            diesel::insert_into(order_contains_tasks::table)
                .values(&links)
                .execute(conn)
                .map_err(failed(Operation::Insert))?;

            Order::try_from(row)
        })
    }

    fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, DomainError, _>(|conn| {
            diesel::delete(
                order_contains_tasks::table.filter(order_contains_tasks::order_id.eq(id)),
            )
            .execute(conn)
            .map_err(failed(Operation::Delete))?;

            let deleted = diesel::delete(orders::table.find(id))
                .execute(conn)
                .map_err(failed(Operation::Delete))?;
            if deleted == 0 {
                return Err(DomainError::NotFound(Entity::Order));
            }
            Ok(())
        })
    }

    fn update(&self, order: &Order) -> Result<Order, DomainError> {
        let mut conn = self.pool.get()?;

        let row = diesel::update(orders::table.find(order.id))
            .set(&OrderChangeset::from(order))
            .returning(OrderRow::as_returning())
            .get_result(&mut conn)
            .optional()
            .map_err(failed(Operation::Update))?
            .ok_or(DomainError::NotFound(Entity::Order))?;

        Order::try_from(row)
    }

    fn get_order_by_id(&self, id: Uuid) -> Result<Order, DomainError> {
        let mut conn = self.pool.get()?;

        let row = orders::table
            .find(id)
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(failed(Operation::Select))?
            .ok_or(DomainError::NotFound(Entity::Order))?;

        Order::try_from(row)
    }

    fn get_tasks_in_order(&self, id: Uuid) -> Result<Vec<Task>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = order_contains_tasks::table
            .inner_join(tasks::table)
            .filter(order_contains_tasks::order_id.eq(id))
            .order(tasks::name.asc())
            .select(TaskRow::as_select())
            .load(&mut conn)
            .map_err(failed(Operation::Select))?;

        Ok(rows.into_iter().map(Task::from).collect())
    }

    fn get_ordered_tasks(&self, id: Uuid) -> Result<Vec<OrderedTask>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = order_contains_tasks::table
            .inner_join(tasks::table)
            .filter(order_contains_tasks::order_id.eq(id))
            .order(tasks::name.asc())
            .select((TaskRow::as_select(), order_contains_tasks::quantity))
            .load::<(TaskRow, i32)>(&mut conn)
            .map_err(failed(Operation::Select))?;

        Ok(rows
            .into_iter()
            .map(|(task, quantity)| OrderedTask {
                task: task.into(),
                quantity,
            })
            .collect())
    }

    fn get_current_order_by_user_id(&self, user_id: Uuid) -> Result<Order, DomainError> {
        let mut conn = self.pool.get()?;

        let row = orders::table
            .filter(orders::user_id.eq(user_id))
            .order(orders::creation_date.desc())
            .select(OrderRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(failed(Operation::Select))?
            .ok_or(DomainError::NotFound(Entity::Order))?;

        Order::try_from(row)
    }

    fn get_all_orders_by_user_id(&self, user_id: Uuid) -> Result<Vec<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let rows = orders::table
            .filter(orders::user_id.eq(user_id))
            .order(orders::creation_date.asc())
            .select(OrderRow::as_select())
            .load(&mut conn)
            .map_err(failed(Operation::Select))?;

        rows_to_orders(rows)
    }

    fn filter(&self, filter: &OrderFilter) -> Result<Vec<Order>, DomainError> {
        let mut conn = self.pool.get()?;

        let rendered = filter.render();
        log::debug!(
            "Filtering orders with{} ({} bind values)",
            rendered.where_clause,
            rendered.binds.len()
        );

        let mut query: BoxedSqlQuery<'_, Pg, SqlQuery> = diesel::sql_query(format!(
            "SELECT {ORDER_COLUMNS} FROM orders{} ORDER BY creation_date DESC",
            rendered.where_clause
        ))
        .into_boxed();
        for value in rendered.binds {
            query = match value {
                FilterValue::Int(v) => query.bind::<Integer, _>(v),
                FilterValue::Text(v) => query.bind::<Text, _>(v),
            };
        }

        let rows = query
            .load::<OrderRow>(&mut conn)
            .map_err(failed(Operation::Select))?;

        rows_to_orders(rows)
    }

    fn add_task_to_order(&self, order_id: Uuid, task_id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        // quantity is left to the column default
        diesel::insert_into(order_contains_tasks::table)
            .values((
                order_contains_tasks::order_id.eq(order_id),
                order_contains_tasks::task_id.eq(task_id),
            ))
            .execute(&mut conn)
            .map_err(failed(Operation::Insert))?;
        Ok(())
    }

    fn remove_task_from_order(&self, order_id: Uuid, task_id: Uuid) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        let deleted = diesel::delete(
            order_contains_tasks::table
                .filter(order_contains_tasks::order_id.eq(order_id))
                .filter(order_contains_tasks::task_id.eq(task_id)),
        )
        .execute(&mut conn)
        .map_err(failed(Operation::Delete))?;

        if deleted == 0 {
            return Err(DomainError::NotFound(Entity::OrderedTask));
        }
        Ok(())
    }

    fn update_task_quantity(
        &self,
        order_id: Uuid,
        task_id: Uuid,
        quantity: i32,
    ) -> Result<(), DomainError> {
        let mut conn = self.pool.get()?;

        let updated = diesel::update(
            order_contains_tasks::table
                .filter(order_contains_tasks::order_id.eq(order_id))
                .filter(order_contains_tasks::task_id.eq(task_id)),
        )
        .set(order_contains_tasks::quantity.eq(quantity))
        .execute(&mut conn)
        .map_err(failed(Operation::Update))?;

        if updated == 0 {
            return Err(DomainError::NotFound(Entity::OrderedTask));
        }
        Ok(())
    }

    fn adjust_task_quantity(
        &self,
        order_id: Uuid,
        task_id: Uuid,
        delta: i32,
    ) -> Result<i32, DomainError> {
        let mut conn = self.pool.get()?;

        // Single statement: the row lock orders concurrent adjustments and the
        // guard keeps the quantity non-negative.
        let updated = diesel::update(
            order_contains_tasks::table
                .filter(order_contains_tasks::order_id.eq(order_id))
                .filter(order_contains_tasks::task_id.eq(task_id))
                .filter((order_contains_tasks::quantity + delta).ge(0)),
        )
        .set(order_contains_tasks::quantity.eq(order_contains_tasks::quantity + delta))
        .returning(order_contains_tasks::quantity)
        .get_result::<i32>(&mut conn)
        .optional()
        .map_err(failed(Operation::Update))?;

        match updated {
            Some(quantity) => Ok(quantity),
            None => {
                let current = load_task_quantity(&mut conn, order_id, task_id)?;
                Err(DomainError::validation(
                    "quantity",
                    format!("cannot change {current} by {delta}: result would be negative"),
                ))
            }
        }
    }

    fn get_task_quantity(&self, order_id: Uuid, task_id: Uuid) -> Result<i32, DomainError> {
        let mut conn = self.pool.get()?;
        load_task_quantity(&mut conn, order_id, task_id)
    }

    fn average_worker_rate(&self, worker_id: Uuid) -> Result<Option<BigDecimal>, DomainError> {
        let mut conn = self.pool.get()?;

        orders::table
            .filter(orders::worker_id.eq(worker_id))
            .filter(orders::status.eq(OrderStatus::Completed.code()))
            .filter(orders::rate.ne(0))
            .select(diesel::dsl::avg(orders::rate))
            .get_result::<Option<BigDecimal>>(&mut conn)
            .map_err(failed(Operation::Select))
    }
}
