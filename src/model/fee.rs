use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeeStatus {
    Paid,
    #[default]
    Pending,
    Overdue,
}

impl FeeStatus {
    /// Paid is terminal; every other move is allowed.
    pub fn can_become(self, next: FeeStatus) -> bool {
        match (self, next) {
            (a, b) if a == b => true,
            (FeeStatus::Paid, _) => false,
            _ => true,
        }
    }
}

/// One per (batch, student).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": 5,
    "batchId": 1,
    "studentId": 11,
    "amount": 1500.0,
    "method": "upi",
    "status": "paid",
    "dueDate": "2024-01-31",
    "paidOn": "2024-01-20"
}))]
pub struct FeeRecord {
    pub id: u64,
    pub batch_id: u64,
    pub student_id: u64,
    pub amount: f64,
    #[serde(default)]
    pub method: Option<String>,
    pub status: FeeStatus,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub paid_on: Option<NaiveDate>,
}

/// Full field set written by an upsert or an update.
#[derive(Debug, Clone)]
pub struct FeeInput {
    pub student_id: u64,
    pub amount: f64,
    pub method: Option<String>,
    pub status: FeeStatus,
    pub due_date: Option<NaiveDate>,
    pub paid_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct FeeChanges {
    pub amount: Option<f64>,
    pub method: Option<String>,
    pub status: Option<FeeStatus>,
    pub due_date: Option<NaiveDate>,
    pub paid_on: Option<NaiveDate>,
}

impl FeeRecord {
    /// Applies `changes` under the status rules, stamping `paid_on` with `today`
    /// when the record becomes paid without an explicit date.
    pub fn apply(&self, changes: &FeeChanges, today: NaiveDate) -> Result<FeeInput, String> {
        let status = changes.status.unwrap_or(self.status);
        if !self.status.can_become(status) {
            return Err(format!(
                "Fee status cannot change from {} to {}",
                self.status, status
            ));
        }

        let amount = changes.amount.unwrap_or(self.amount);
        if amount < 0.0 {
            return Err("amount must not be negative".to_string());
        }

        let mut paid_on = changes.paid_on.or(self.paid_on);
        if status == FeeStatus::Paid && paid_on.is_none() {
            paid_on = Some(today);
        }

        Ok(FeeInput {
            student_id: self.student_id,
            amount,
            method: changes.method.clone().or_else(|| self.method.clone()),
            status,
            due_date: changes.due_date.or(self.due_date),
            paid_on,
        })
    }
}

impl FeeInput {
    pub fn stamp_paid(mut self, today: NaiveDate) -> Self {
        if self.status == FeeStatus::Paid && self.paid_on.is_none() {
            self.paid_on = Some(today);
        }
        self
    }
}
