use super::{Customer, LoyaltyStore};
use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A task re-executed every `every` starting at `next_run_at`.
#[derive(Debug, Clone)]
pub struct RecurringTask {
    pub id: String,
    pub next_run_at: DateTime<Utc>,
    pub every: Duration,
    pub run_count: u64,
}

#[derive(Default)]
struct State {
    customers: Vec<Customer>,
    rfm_scores: HashMap<String, u8>,
    reminded: HashMap<String, DateTime<Utc>>,
    recurring_tasks: Vec<RecurringTask>,
}

/// In-process store used for local runs and tests.
#[derive(Default)]
pub struct MemoryLoyaltyStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
}

impl MemoryLoyaltyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("loyalty store unavailable");
        }
        Ok(self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn add_customer(&self, customer: Customer) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .customers
            .push(customer);
    }

    /// Register a recurring task; its interval must be positive.
    pub fn add_recurring_task(&self, task: RecurringTask) -> Result<()> {
        if task.every <= Duration::zero() {
            bail!(
                "recurring task {} must have a positive interval, got {}",
                task.id,
                task.every
            );
        }
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recurring_tasks
            .push(task);
        Ok(())
    }

    /// Make every subsequent call fail, simulating a lost database.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn rfm_score(&self, customer_id: &str) -> Option<u8> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rfm_scores
            .get(customer_id)
            .copied()
    }

    pub fn recurring_task(&self, id: &str) -> Option<RecurringTask> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recurring_tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
    }
}

impl LoyaltyStore for MemoryLoyaltyStore {
    fn recalculate_rfm_scores(&self, as_of: DateTime<Utc>) -> Result<usize> {
        let mut state = self.lock()?;
        let scores: Vec<(String, u8)> = state
            .customers
            .iter()
            .filter_map(|c| {
                let days = (as_of - c.last_order_at?).num_days();
                // Recency only; the full RFM model lives in the real store.
                let score = match days {
                    d if d <= 30 => 5,
                    d if d <= 90 => 4,
                    d if d <= 180 => 3,
                    d if d <= 365 => 2,
                    _ => 1,
                };
                Some((c.id.clone(), score))
            })
            .collect();
        let scored = scores.len();
        state.rfm_scores.extend(scores);
        Ok(scored)
    }

    fn customers_with_birthday(&self, month: u32, day: u32) -> Result<Vec<Customer>> {
        let state = self.lock()?;
        Ok(state
            .customers
            .iter()
            .filter(|c| {
                c.birthday
                    .is_some_and(|b| b.month() == month && b.day() == day)
            })
            .cloned()
            .collect())
    }

    fn inactive_customers(&self, last_order_before: DateTime<Utc>) -> Result<Vec<Customer>> {
        let state = self.lock()?;
        Ok(state
            .customers
            .iter()
            .filter(|c| c.last_order_at.is_some_and(|at| at < last_order_before))
            .filter(|c| {
                // One reminder per inactivity period.
                state
                    .reminded
                    .get(&c.id)
                    .map_or(true, |at| *at < last_order_before)
            })
            .cloned()
            .collect())
    }

    fn mark_reminded(&self, customer_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.lock()?;
        if !state.customers.iter().any(|c| c.id == customer_id) {
            bail!("unknown customer {}", customer_id);
        }
        state.reminded.insert(customer_id.to_string(), at);
        Ok(())
    }

    fn run_due_recurring_tasks(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut state = self.lock()?;
        let mut ran = 0;
        for task in state.recurring_tasks.iter_mut() {
            if task.next_run_at > now {
                continue;
            }
            task.run_count += 1;
            // Skip missed slots instead of replaying them.
            while task.next_run_at <= now {
                task.next_run_at += task.every;
            }
            ran += 1;
        }
        Ok(ran)
    }
}
