use chrono::NaiveDate;
use sqlx::{MySql, Transaction};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    F64(f64),
    Date(NaiveDate),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Collects `column = ?` assignments for the fields a caller actually changed.
///
/// Column names are `'static` so only compile-time identifiers reach the SQL text.
#[derive(Debug)]
pub struct UpdateBuilder {
    table: &'static str,
    sets: Vec<(&'static str, SqlValue)>,
}

impl UpdateBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            sets: Vec::new(),
        }
    }

    pub fn set(mut self, column: &'static str, value: Option<SqlValue>) -> Self {
        if let Some(value) = value {
            self.sets.push((column, value));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// ===============================
    /// Build dynamic UPDATE SQL
    /// ===============================
    /// `None` when nothing was set.
    pub fn build(self, id_column: &'static str, id_value: u64) -> Option<SqlUpdate> {
        if self.sets.is_empty() {
            return None;
        }

        let set_clause = self
            .sets
            .iter()
            .map(|(column, _)| format!("{} = ?", column))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table, set_clause, id_column
        );

        let mut values: Vec<SqlValue> = self.sets.into_iter().map(|(_, v)| v).collect();
        values.push(SqlValue::U64(id_value));

        Some(SqlUpdate { sql, values })
    }
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(
    tx: &mut Transaction<'_, MySql>,
    update: SqlUpdate,
) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(&mut **tx).await?;
    Ok(result.rows_affected())
}
