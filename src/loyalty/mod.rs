//! Customer and loyalty data as seen by the background jobs.
//!
//! The jobs only need a narrow view of the loyalty database; the scoring
//! algorithm and the persistence schema live behind [`LoyaltyStore`].

mod memory;

pub use memory::{MemoryLoyaltyStore, RecurringTask};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub last_order_at: Option<DateTime<Utc>>,
}

impl Customer {
    /// Address messages for this customer are delivered to, email first.
    pub fn contact(&self) -> Option<&str> {
        self.email.as_deref().or(self.phone.as_deref())
    }
}

/// Operations the loyalty jobs perform against the customer database.
pub trait LoyaltyStore: Send + Sync {
    /// Recompute recency/frequency/monetary scores; returns customers scored.
    fn recalculate_rfm_scores(&self, as_of: DateTime<Utc>) -> Result<usize>;

    /// Customers whose birthday falls on the given month and day.
    fn customers_with_birthday(&self, month: u32, day: u32) -> Result<Vec<Customer>>;

    /// Customers who have not ordered since `last_order_before` and are due a reminder.
    ///
    /// Returning a customer does not consume their reminder; see [`Self::mark_reminded`].
    fn inactive_customers(&self, last_order_before: DateTime<Utc>) -> Result<Vec<Customer>>;

    /// Record that `customer_id` was sent an inactivity reminder at `at`.
    fn mark_reminded(&self, customer_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Execute every recurring task whose next run is at or before `now`; returns tasks run.
    fn run_due_recurring_tasks(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_prefers_email() {
        let mut customer = Customer {
            id: "c1".to_string(),
            name: "Ada".to_string(),
            email: Some("ada@example.com".to_string()),
            phone: Some("+391234".to_string()),
            birthday: None,
            last_order_at: None,
        };
        assert_eq!(customer.contact(), Some("ada@example.com"));

        customer.email = None;
        assert_eq!(customer.contact(), Some("+391234"));

        customer.phone = None;
        assert_eq!(customer.contact(), None);
    }
}
