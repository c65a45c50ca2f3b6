//! Read-only lookups into the task, worker and user tables.
//!
//! The order service only needs to know whether a referenced row exists (and,
//! for tasks, its unit price), so these repositories expose nothing else.

use diesel::prelude::*;
use uuid::Uuid;

use crate::db::DbPool;
use crate::domain::errors::{DomainError, Entity, Operation};
use crate::domain::order::{Task, User, Worker};
use crate::domain::ports::{TaskRepository, UserRepository, WorkerRepository};
use crate::schema::{tasks, users, workers};

use super::models::{TaskRow, UserRow, WorkerRow};

pub struct DieselTaskRepository {
    pool: DbPool,
}

impl DieselTaskRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl TaskRepository for DieselTaskRepository {
    fn get_task_by_id(&self, id: Uuid) -> Result<Task, DomainError> {
        let mut conn = self.pool.get()?;

        tasks::table
            .find(id)
            .select(TaskRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| DomainError::persistence(Operation::Select, e))?
            .map(Task::from)
            .ok_or(DomainError::NotFound(Entity::Task))
    }
}

pub struct DieselWorkerRepository {
    pool: DbPool,
}

impl DieselWorkerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl WorkerRepository for DieselWorkerRepository {
    fn get_worker_by_id(&self, id: Uuid) -> Result<Worker, DomainError> {
        let mut conn = self.pool.get()?;

        workers::table
            .find(id)
            .select(WorkerRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| DomainError::persistence(Operation::Select, e))?
            .map(Worker::from)
            .ok_or(DomainError::NotFound(Entity::Worker))
    }
}

pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl UserRepository for DieselUserRepository {
    fn get_user_by_id(&self, id: Uuid) -> Result<User, DomainError> {
        let mut conn = self.pool.get()?;

        users::table
            .find(id)
            .select(UserRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| DomainError::persistence(Operation::Select, e))?
            .map(User::from)
            .ok_or(DomainError::NotFound(Entity::User))
    }
}
