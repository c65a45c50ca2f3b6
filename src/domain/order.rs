use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Lowest and highest rating a customer may leave.
pub const MIN_RATE: i32 = 0;
pub const MAX_RATE: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Sentinel for rows that never went through a valid flow.
    Undefined,
    New,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("unknown order status code: {0}")]
pub struct ParseOrderStatusError(pub i32);

impl OrderStatus {
    /// Integer code stored in the `orders.status` column.
    pub const fn code(self) -> i32 {
        match self {
            OrderStatus::Undefined => 0,
            OrderStatus::New => 1,
            OrderStatus::InProgress => 2,
            OrderStatus::Completed => 3,
            OrderStatus::Cancelled => 4,
        }
    }

    /// Completed and cancelled orders are the only ones that may carry a rating.
    pub const fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Statuses a caller may set on an order.
    pub const fn is_assignable(self) -> bool {
        !matches!(self, OrderStatus::Undefined)
    }
}

impl TryFrom<i32> for OrderStatus {
    type Error = ParseOrderStatusError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(OrderStatus::Undefined),
            1 => Ok(OrderStatus::New),
            2 => Ok(OrderStatus::InProgress),
            3 => Ok(OrderStatus::Completed),
            4 => Ok(OrderStatus::Cancelled),
            other => Err(ParseOrderStatusError(other)),
        }
    }
}

impl From<OrderStatus> for i32 {
    fn from(status: OrderStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderStatus::Undefined => "Undefined",
            OrderStatus::New => "New",
            OrderStatus::InProgress => "In progress",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub worker_id: Option<Uuid>,
    pub status: OrderStatus,
    pub address: String,
    pub creation_date: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub rate: i32,
}

/// Fields the repository needs to insert a fresh order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub address: String,
    pub deadline: DateTime<Utc>,
}

/// A task requested at order creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderedTaskInput {
    pub task_id: Uuid,
    pub quantity: i32,
}

/// A task attached to an order, with the quantity carried on the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedTask {
    pub task: Task,
    pub quantity: i32,
}

impl OrderedTask {
    pub fn subtotal(&self) -> BigDecimal {
        &self.task.price_per_single * BigDecimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub name: String,
    pub price_per_single: BigDecimal,
    pub category: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub role: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub surname: String,
    pub address: String,
    pub email: String,
}
