//! In-memory adapter implementing every repository port.
//!
//! Mirrors the constraints the Postgres schema enforces (foreign keys, the
//! non-negative quantity check, all-or-nothing order creation) so that the
//! order service behaves the same against it as against the database.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{DomainError, Entity, Operation};
use crate::domain::filter::OrderFilter;
use crate::domain::order::{
    NewOrder, Order, OrderStatus, OrderedTask, OrderedTaskInput, Task, User, Worker,
};
use crate::domain::ports::{OrderRepository, TaskRepository, UserRepository, WorkerRepository};

/// Quantity given to a task attached without an explicit one.
const DEFAULT_QUANTITY: i32 = 1;

/// Thread-safe in-memory store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

#[derive(Debug, Default)]
struct State {
    // insertion order doubles as creation order
    orders: Vec<Order>,
    links: Vec<Link>,
    tasks: HashMap<Uuid, Task>,
    workers: HashMap<Uuid, Worker>,
    users: HashMap<Uuid, User>,
}

#[derive(Debug, Clone, Copy)]
struct Link {
    order_id: Uuid,
    task_id: Uuid,
    quantity: i32,
}

impl State {
    fn order(&self, id: Uuid) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    fn link_mut(&mut self, order_id: Uuid, task_id: Uuid) -> Option<&mut Link> {
        self.links
            .iter_mut()
            .find(|l| l.order_id == order_id && l.task_id == task_id)
    }

    fn ordered_tasks(&self, order_id: Uuid) -> Vec<OrderedTask> {
        let mut lines: Vec<OrderedTask> = self
            .links
            .iter()
            .filter(|l| l.order_id == order_id)
            .filter_map(|l| {
                self.tasks.get(&l.task_id).map(|task| OrderedTask {
                    task: task.clone(),
                    quantity: l.quantity,
                })
            })
            .collect();
        lines.sort_by(|a, b| a.task.name.cmp(&b.task.name));
        lines
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, DomainError> {
        self.state
            .read()
            .map_err(|err| DomainError::persistence(Operation::Connection, err))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, DomainError> {
        self.state
            .write()
            .map_err(|err| DomainError::persistence(Operation::Connection, err))
    }

    pub fn insert_task(&self, task: Task) -> Result<(), DomainError> {
        self.write()?.tasks.insert(task.id, task);
        Ok(())
    }

    pub fn insert_worker(&self, worker: Worker) -> Result<(), DomainError> {
        self.write()?.workers.insert(worker.id, worker);
        Ok(())
    }

    pub fn insert_user(&self, user: User) -> Result<(), DomainError> {
        self.write()?.users.insert(user.id, user);
        Ok(())
    }

    /// Number of association rows currently stored for the order.
    pub fn link_count(&self, order_id: Uuid) -> Result<usize, DomainError> {
        Ok(self
            .read()?
            .links
            .iter()
            .filter(|l| l.order_id == order_id)
            .count())
    }
}

impl OrderRepository for InMemoryStore {
    fn create(&self, order: NewOrder, tasks: &[OrderedTaskInput]) -> Result<Order, DomainError> {
        let mut state = self.write()?;

        if !state.users.contains_key(&order.user_id) {
            return Err(DomainError::persistence(
                Operation::Insert,
                "orders.user_id references a missing user",
            ));
        }
        for (i, line) in tasks.iter().enumerate() {
            if tasks[..i].iter().any(|earlier| earlier.task_id == line.task_id) {
                return Err(DomainError::persistence(
                    Operation::Insert,
                    "duplicate key value violates order_contains_tasks_pkey",
                ));
            }
            if !state.tasks.contains_key(&line.task_id) {
                return Err(DomainError::persistence(
                    Operation::Insert,
                    "order_contains_tasks.task_id references a missing task",
                ));
            }
            if line.quantity < 0 {
                return Err(DomainError::persistence(
                    Operation::Insert,
                    "order_contains_tasks.quantity must not be negative",
                ));
            }
        }

        let created = Order {
            id: Uuid::new_v4(),
            user_id: order.user_id,
            worker_id: None,
            status: order.status,
            address: order.address,
            creation_date: Utc::now(),
            deadline: order.deadline,
            rate: 0,
        };
        state.links.extend(tasks.iter().map(|line| Link {
            order_id: created.id,
            task_id: line.task_id,
            quantity: line.quantity,
        }));
        state.orders.push(created.clone());
        Ok(created)
    }

    fn delete(&self, id: Uuid) -> Result<(), DomainError> {
        let mut state = self.write()?;
        let Some(position) = state.orders.iter().position(|o| o.id == id) else {
            return Err(DomainError::NotFound(Entity::Order));
        };
        state.links.retain(|l| l.order_id != id);
        state.orders.remove(position);
        Ok(())
    }

    fn update(&self, order: &Order) -> Result<Order, DomainError> {
        let mut state = self.write()?;
        if let Some(worker_id) = order.worker_id {
            if !state.workers.contains_key(&worker_id) {
                return Err(DomainError::persistence(
                    Operation::Update,
                    "orders.worker_id references a missing worker",
                ));
            }
        }
        let stored = state
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or(DomainError::NotFound(Entity::Order))?;
        stored.worker_id = order.worker_id;
        stored.status = order.status;
        stored.rate = order.rate;
        Ok(stored.clone())
    }

    fn get_order_by_id(&self, id: Uuid) -> Result<Order, DomainError> {
        self.read()?
            .order(id)
            .cloned()
            .ok_or(DomainError::NotFound(Entity::Order))
    }

    fn get_tasks_in_order(&self, id: Uuid) -> Result<Vec<Task>, DomainError> {
        Ok(self
            .read()?
            .ordered_tasks(id)
            .into_iter()
            .map(|line| line.task)
            .collect())
    }

    fn get_ordered_tasks(&self, id: Uuid) -> Result<Vec<OrderedTask>, DomainError> {
        Ok(self.read()?.ordered_tasks(id))
    }

    fn get_current_order_by_user_id(&self, user_id: Uuid) -> Result<Order, DomainError> {
        self.read()?
            .orders
            .iter()
            .rev()
            .find(|o| o.user_id == user_id)
            .cloned()
            .ok_or(DomainError::NotFound(Entity::Order))
    }

    fn get_all_orders_by_user_id(&self, user_id: Uuid) -> Result<Vec<Order>, DomainError> {
        Ok(self
            .read()?
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    fn filter(&self, filter: &OrderFilter) -> Result<Vec<Order>, DomainError> {
        Ok(self
            .read()?
            .orders
            .iter()
            .rev()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect())
    }

    fn add_task_to_order(&self, order_id: Uuid, task_id: Uuid) -> Result<(), DomainError> {
        let mut state = self.write()?;
        if state.order(order_id).is_none() || !state.tasks.contains_key(&task_id) {
            return Err(DomainError::persistence(
                Operation::Insert,
                "order_contains_tasks references a missing order or task",
            ));
        }
        if state.link_mut(order_id, task_id).is_some() {
            return Err(DomainError::persistence(
                Operation::Insert,
                "duplicate key value violates order_contains_tasks_pkey",
            ));
        }
        state.links.push(Link {
            order_id,
            task_id,
            quantity: DEFAULT_QUANTITY,
        });
        Ok(())
    }

    fn remove_task_from_order(&self, order_id: Uuid, task_id: Uuid) -> Result<(), DomainError> {
        let mut state = self.write()?;
        let before = state.links.len();
        state
            .links
            .retain(|l| !(l.order_id == order_id && l.task_id == task_id));
        if state.links.len() == before {
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
        let mut state = self.write()?;
        let link = state
            .link_mut(order_id, task_id)
            .ok_or(DomainError::NotFound(Entity::OrderedTask))?;
        if quantity < 0 {
            return Err(DomainError::persistence(
                Operation::Update,
                "order_contains_tasks.quantity must not be negative",
            ));
        }
        link.quantity = quantity;
        Ok(())
    }

    fn adjust_task_quantity(
        &self,
        order_id: Uuid,
        task_id: Uuid,
        delta: i32,
    ) -> Result<i32, DomainError> {
        let mut state = self.write()?;
        let link = state
            .link_mut(order_id, task_id)
            .ok_or(DomainError::NotFound(Entity::OrderedTask))?;
        let adjusted = link.quantity.checked_add(delta).filter(|q| *q >= 0);
        match adjusted {
            Some(quantity) => {
                link.quantity = quantity;
                Ok(quantity)
            }
            None => Err(DomainError::validation(
                "quantity",
                format!(
                    "cannot change {} by {delta}: result would be negative",
                    link.quantity
                ),
            )),
        }
    }

    fn get_task_quantity(&self, order_id: Uuid, task_id: Uuid) -> Result<i32, DomainError> {
        self.read()?
            .links
            .iter()
            .find(|l| l.order_id == order_id && l.task_id == task_id)
            .map(|l| l.quantity)
            .ok_or(DomainError::NotFound(Entity::OrderedTask))
    }

    fn average_worker_rate(&self, worker_id: Uuid) -> Result<Option<BigDecimal>, DomainError> {
        let state = self.read()?;
        let rates: Vec<i32> = state
            .orders
            .iter()
            .filter(|o| {
                o.worker_id == Some(worker_id) && o.status == OrderStatus::Completed && o.rate != 0
            })
            .map(|o| o.rate)
            .collect();
        if rates.is_empty() {
            return Ok(None);
        }
        let sum: i64 = rates.iter().map(|r| i64::from(*r)).sum();
        Ok(Some(
            BigDecimal::from(sum) / BigDecimal::from(rates.len() as i64),
        ))
    }
}

impl TaskRepository for InMemoryStore {
    fn get_task_by_id(&self, id: Uuid) -> Result<Task, DomainError> {
        self.read()?
            .tasks
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound(Entity::Task))
    }
}

impl WorkerRepository for InMemoryStore {
    fn get_worker_by_id(&self, id: Uuid) -> Result<Worker, DomainError> {
        self.read()?
            .workers
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound(Entity::Worker))
    }
}

impl UserRepository for InMemoryStore {
    fn get_user_by_id(&self, id: Uuid) -> Result<User, DomainError> {
        self.read()?
            .users
            .get(&id)
            .cloned()
            .ok_or(DomainError::NotFound(Entity::User))
    }
}
