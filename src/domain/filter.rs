//! Structured order filter.
//!
//! Callers describe the orders they want as a `field -> value` map. Each
//! entry becomes one clause and all clauses are conjoined. A value may be a
//! literal, the sentinels `null` / `not null`, or a comma separated list whose
//! items are OR-ed together. `status` compares integer codes exactly; every
//! other column is matched against its text form with `LIKE`.
//!
//! The filter is kept as data (`field`, `operator`, values) and only turned
//! into SQL by [`OrderFilter::render`], which emits `$n` placeholders and a
//! matching list of bind values. Nothing the caller supplies is ever spliced
//! into the query text.

use std::fmt;

use thiserror::Error;

use super::order::{Order, OrderStatus};

const NULL_SENTINEL: &str = "null";
const NOT_NULL_SENTINEL: &str = "not null";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unknown filter field '{0}'")]
    UnknownField(String),
    #[error("invalid status value '{0}'")]
    InvalidStatus(String),
    #[error("pattern '{0}' ends with an escape character")]
    DanglingEscape(String),
}

/// Columns of the `orders` table a filter may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OrderField {
    Id,
    WorkerId,
    UserId,
    Status,
    Address,
    CreationDate,
    Deadline,
    Rate,
}

impl OrderField {
    pub const ALL: [OrderField; 8] = [
        OrderField::Id,
        OrderField::WorkerId,
        OrderField::UserId,
        OrderField::Status,
        OrderField::Address,
        OrderField::CreationDate,
        OrderField::Deadline,
        OrderField::Rate,
    ];

    pub const fn column(self) -> &'static str {
        match self {
            OrderField::Id => "id",
            OrderField::WorkerId => "worker_id",
            OrderField::UserId => "user_id",
            OrderField::Status => "status",
            OrderField::Address => "address",
            OrderField::CreationDate => "creation_date",
            OrderField::Deadline => "deadline",
            OrderField::Rate => "rate",
        }
    }

    pub fn from_column(name: &str) -> Result<Self, FilterError> {
        OrderField::ALL
            .into_iter()
            .find(|field| field.column() == name)
            .ok_or_else(|| FilterError::UnknownField(name.to_string()))
    }

    /// Text form of the column value, as `column::text` yields it.
    /// `None` stands for SQL NULL.
    fn text_of(self, order: &Order) -> Option<String> {
        match self {
            OrderField::Id => Some(order.id.to_string()),
            OrderField::WorkerId => order.worker_id.map(|id| id.to_string()),
            OrderField::UserId => Some(order.user_id.to_string()),
            OrderField::Status => Some(order.status.code().to_string()),
            OrderField::Address => Some(order.address.clone()),
            OrderField::CreationDate => Some(timestamp_text(&order.creation_date)),
            OrderField::Deadline => Some(timestamp_text(&order.deadline)),
            OrderField::Rate => Some(order.rate.to_string()),
        }
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

fn timestamp_text(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f+00").to_string()
}

/// A value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Int(i32),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    /// Status code comparisons; built only for the `status` column.
    Eq(i32),
    In(Vec<i32>),
    Like(String),
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: OrderField,
    pub operator: Operator,
}

impl Condition {
    fn matches(&self, order: &Order) -> bool {
        let text = self.field.text_of(order);
        match &self.operator {
            Operator::IsNull => text.is_none(),
            Operator::IsNotNull => text.is_some(),
            Operator::Like(pattern) => text.is_some_and(|t| like(pattern, &t)),
            Operator::Eq(code) => order.status.code() == *code,
            Operator::In(codes) => codes.contains(&order.status.code()),
        }
    }

    fn render(&self, sql: &mut String, binds: &mut Vec<FilterValue>) {
        let column = self.field.column();
        let fragment = match &self.operator {
            Operator::IsNull => format!("{column} IS NULL"),
            Operator::IsNotNull => format!("{column} IS NOT NULL"),
            Operator::Eq(code) => {
                binds.push(FilterValue::Int(*code));
                format!("{column} = ${}", binds.len())
            }
            Operator::In(codes) => {
                let mut placeholders = Vec::with_capacity(codes.len());
                for code in codes {
                    binds.push(FilterValue::Int(*code));
                    placeholders.push(format!("${}", binds.len()));
                }
                format!("{column} IN ({})", placeholders.join(", "))
            }
            Operator::Like(pattern) => {
                binds.push(FilterValue::Text(pattern.clone()));
                format!("{column}::text LIKE ${}", binds.len())
            }
        };
        sql.push_str(&fragment);
    }
}

/// Conditions on one field, OR-ed together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub field: OrderField,
    pub conditions: Vec<Condition>,
}

impl Clause {
    fn parse(field: OrderField, raw: &str) -> Result<Self, FilterError> {
        let items: Vec<&str> = raw.split(',').map(str::trim).collect();
        let mut conditions = Vec::with_capacity(items.len());
        let mut codes = Vec::new();

        for item in items {
            match item {
                NULL_SENTINEL => conditions.push(Condition {
                    field,
                    operator: Operator::IsNull,
                }),
                NOT_NULL_SENTINEL => conditions.push(Condition {
                    field,
                    operator: Operator::IsNotNull,
                }),
                value if field == OrderField::Status => codes.push(parse_status(value)?),
                value => conditions.push(Condition {
                    field,
                    operator: Operator::Like(parse_pattern(value)?),
                }),
            }
        }

        match codes.len() {
            0 => {}
            1 => conditions.push(Condition {
                field,
                operator: Operator::Eq(codes.remove(0)),
            }),
            _ => conditions.push(Condition {
                field,
                operator: Operator::In(codes),
            }),
        }

        Ok(Clause { field, conditions })
    }

    fn matches(&self, order: &Order) -> bool {
        self.conditions.iter().any(|c| c.matches(order))
    }

    fn render(&self, sql: &mut String, binds: &mut Vec<FilterValue>) {
        if self.conditions.len() == 1 {
            self.conditions[0].render(sql, binds);
            return;
        }
        sql.push('(');
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                sql.push_str(" OR ");
            }
            condition.render(sql, binds);
        }
        sql.push(')');
    }
}

fn parse_status(value: &str) -> Result<i32, FilterError> {
    let code: i32 = value
        .parse()
        .map_err(|_| FilterError::InvalidStatus(value.to_string()))?;
    let status =
        OrderStatus::try_from(code).map_err(|_| FilterError::InvalidStatus(value.to_string()))?;
    Ok(status.code())
}

/// Postgres refuses a `LIKE` pattern whose last character is an unescaped `\`.
fn parse_pattern(value: &str) -> Result<String, FilterError> {
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.next().is_none() {
            return Err(FilterError::DanglingEscape(value.to_string()));
        }
    }
    Ok(value.to_string())
}

/// SQL text and bind values produced by [`OrderFilter::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFilter {
    /// Either empty or a leading-space ` WHERE ...` fragment.
    pub where_clause: String,
    pub binds: Vec<FilterValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    clauses: Vec<Clause>,
}

impl OrderFilter {
    /// Compile a `field -> value` map. Clauses come out in column order so
    /// the rendered SQL does not depend on map iteration order.
    pub fn parse<'a, I>(params: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut clauses = params
            .into_iter()
            .map(|(name, raw)| Clause::parse(OrderField::from_column(name.trim())?, raw))
            .collect::<Result<Vec<_>, _>>()?;
        clauses.sort_by_key(|clause| clause.field);
        Ok(OrderFilter { clauses })
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.clauses.iter().all(|clause| clause.matches(order))
    }

    pub fn render(&self) -> RenderedFilter {
        let mut sql = String::new();
        let mut binds = Vec::new();
        for (i, clause) in self.clauses.iter().enumerate() {
            sql.push_str(if i == 0 { " WHERE " } else { " AND " });
            clause.render(&mut sql, &mut binds);
        }
        RenderedFilter {
            where_clause: sql,
            binds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Any,
    One,
    Literal(char),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => Token::Any,
            '_' => Token::One,
            '\\' => Token::Literal(chars.next().unwrap_or('\\')),
            c => Token::Literal(c),
        });
    }
    tokens
}

/// SQL `LIKE` semantics: `%` matches any run, `_` one character, `\` escapes.
///
/// Runs in `O(pattern * text)`: on a mismatch only the most recent `%` is
/// retried, one character further along the text.
pub fn like(pattern: &str, text: &str) -> bool {
    let tokens = tokenize(pattern);
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // (token index of the last `%`, text index it currently stands for)
    let mut retry: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Any) => {
                retry = Some((p, t));
                p += 1;
            }
            Some(Token::One) => {
                p += 1;
                t += 1;
            }
            Some(Token::Literal(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match retry {
                Some((any, from)) => {
                    retry = Some((any, from + 1));
                    p = any + 1;
                    t = from + 1;
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|token| *token == Token::Any)
}
