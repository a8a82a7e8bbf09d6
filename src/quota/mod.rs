use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::config::PlanLimit;
use crate::errors::{GenError, GenResult};
use crate::store::{DynStore, IncrementOutcome, QuotaWindow};
use crate::wire::QuotaCategory;

/// Limit value that disables the monthly check.
pub const UNLIMITED: i64 = -1;
pub const DEFAULT_PLAN: &str = "free";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub plan: String,
    pub year: i32,
    pub month: u32,
    pub workouts_used: i64,
    pub workouts_limit: i64,
    pub diets_used: i64,
    pub diets_limit: i64,
}

/// Monthly per-user gate in front of the provider.
#[derive(Clone)]
pub struct QuotaTracker {
    store: DynStore,
    limits: BTreeMap<String, PlanLimit>,
}

impl QuotaTracker {
    pub fn new(store: DynStore, limits: BTreeMap<String, PlanLimit>) -> Self {
        Self { store, limits }
    }

    async fn plan_of(&self, user_id: &str) -> GenResult<(String, PlanLimit)> {
        let plan = self
            .store
            .active_plan(user_id)
            .await?
            .unwrap_or_else(|| DEFAULT_PLAN.to_string());
        if let Some(limit) = self.limits.get(&plan) {
            return Ok((plan, *limit));
        }
        warn!(user_id, plan = %plan, fallback = DEFAULT_PLAN, "unknown plan, applying fallback limits");
        self.limits
            .get(DEFAULT_PLAN)
            .map(|l| (DEFAULT_PLAN.to_string(), *l))
            .ok_or_else(|| GenError::Config(format!("no limits configured for plan {DEFAULT_PLAN}")))
    }

    pub async fn check_and_increment(&self, user_id: &str, category: QuotaCategory) -> GenResult<i64> {
        self.check_and_increment_at(user_id, category, QuotaWindow::current()).await
    }

    /// Consumes one unit of `category` for the window, or fails with
    /// `QuotaExceeded` without touching the counter.
    pub async fn check_and_increment_at(
        &self,
        user_id: &str,
        category: QuotaCategory,
        window: QuotaWindow,
    ) -> GenResult<i64> {
        let (plan, limits) = self.plan_of(user_id).await?;
        let limit = limits.for_category(category);

        match self.store.increment_usage(user_id, window, category, limit).await? {
            IncrementOutcome::Incremented(used) => {
                debug!(user_id, %category, used, limit, plan = %plan, "quota consumed");
                Ok(used)
            }
            IncrementOutcome::Exhausted(used) => {
                info!(user_id, %category, used, limit, plan = %plan, "monthly quota reached");
                Err(GenError::QuotaExceeded { category, limit })
            }
        }
    }

    pub async fn usage(&self, user_id: &str) -> GenResult<UsageReport> {
        self.usage_at(user_id, QuotaWindow::current()).await
    }

    pub async fn usage_at(&self, user_id: &str, window: QuotaWindow) -> GenResult<UsageReport> {
        let (plan, limits) = self.plan_of(user_id).await?;
        let counts = self.store.read_usage(user_id, window).await?;
        Ok(UsageReport {
            plan,
            year: window.year,
            month: window.month,
            workouts_used: counts.workouts_used,
            workouts_limit: limits.workouts_per_month,
            diets_used: counts.diets_used,
            diets_limit: limits.diets_per_month,
        })
    }
}
