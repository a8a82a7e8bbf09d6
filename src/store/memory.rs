use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    catalog_key, AuditEntry, DietMeal, DietMealFood, DietPlanRecord, IncrementOutcome,
    NewExercise, NewFood, QuotaWindow, Routine, RoutineExercise, Store, StoredRecommendation,
    UsageCounts,
};
use crate::errors::{GenError, GenResult};
use crate::wire::{QuotaCategory, UserProfile};

#[derive(Default)]
struct Tables {
    routines: Vec<Routine>,
    routine_exercises: Vec<RoutineExercise>,
    diet_plans: Vec<DietPlanRecord>,
    diet_meals: Vec<DietMeal>,
    meal_foods: Vec<DietMealFood>,
    exercises: HashMap<String, (Uuid, NewExercise)>,
    foods: HashMap<String, (Uuid, NewFood)>,
    subscriptions: HashMap<String, String>,
    profiles: HashMap<String, UserProfile>,
    usage: HashMap<(String, QuotaWindow), UsageCounts>,
    recommendations: Vec<StoredRecommendation>,
    audit: Vec<AuditEntry>,
}

/// Process-local store. Every operation runs under one lock.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routines(&self, user_id: &str) -> Vec<Routine> {
        self.tables.lock().routines.iter().filter(|r| r.user_id == user_id).cloned().collect()
    }

    pub fn diet_plans(&self, user_id: &str) -> Vec<DietPlanRecord> {
        self.tables.lock().diet_plans.iter().filter(|p| p.user_id == user_id).cloned().collect()
    }

    pub fn meal_foods(&self) -> Vec<DietMealFood> {
        self.tables.lock().meal_foods.clone()
    }

    pub fn foods(&self) -> Vec<(Uuid, NewFood)> {
        self.tables.lock().foods.values().cloned().collect()
    }

    pub fn exercise_count(&self) -> usize {
        self.tables.lock().exercises.len()
    }

    pub fn recommendations(&self, user_id: &str) -> Vec<StoredRecommendation> {
        self.tables
            .lock()
            .recommendations
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn activate_routine(&self, routine: &Routine) -> GenResult<usize> {
        let mut t = self.tables.lock();
        if t.routines.iter().any(|r| r.id == routine.id) {
            return Err(GenError::Store(format!("routine {} already exists", routine.id)));
        }
        let mut n = 0;
        for r in t.routines.iter_mut().filter(|r| r.user_id == routine.user_id && r.is_active) {
            r.is_active = false;
            n += 1;
        }
        t.routines.push(routine.clone());
        Ok(n)
    }

    async fn get_routine(&self, id: Uuid) -> GenResult<Option<Routine>> {
        Ok(self.tables.lock().routines.iter().find(|r| r.id == id).cloned())
    }

    async fn insert_routine_exercises(&self, links: &[RoutineExercise]) -> GenResult<()> {
        self.tables.lock().routine_exercises.extend_from_slice(links);
        Ok(())
    }

    async fn routine_exercises(&self, routine_id: Uuid) -> GenResult<Vec<RoutineExercise>> {
        Ok(self
            .tables
            .lock()
            .routine_exercises
            .iter()
            .filter(|l| l.routine_id == routine_id)
            .cloned()
            .collect())
    }

    async fn activate_diet_plan(&self, plan: &DietPlanRecord) -> GenResult<usize> {
        let mut t = self.tables.lock();
        if t.diet_plans.iter().any(|p| p.id == plan.id) {
            return Err(GenError::Store(format!("diet plan {} already exists", plan.id)));
        }
        let mut n = 0;
        for p in t.diet_plans.iter_mut().filter(|p| p.user_id == plan.user_id && p.is_active) {
            p.is_active = false;
            n += 1;
        }
        t.diet_plans.push(plan.clone());
        Ok(n)
    }

    async fn get_diet_plan(&self, id: Uuid) -> GenResult<Option<DietPlanRecord>> {
        Ok(self.tables.lock().diet_plans.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_diet_meals(&self, meals: &[DietMeal]) -> GenResult<()> {
        self.tables.lock().diet_meals.extend_from_slice(meals);
        Ok(())
    }

    async fn insert_meal_foods(&self, foods: &[DietMealFood]) -> GenResult<()> {
        self.tables.lock().meal_foods.extend_from_slice(foods);
        Ok(())
    }

    async fn diet_meals(&self, plan_id: Uuid) -> GenResult<Vec<DietMeal>> {
        Ok(self
            .tables
            .lock()
            .diet_meals
            .iter()
            .filter(|m| m.diet_plan_id == plan_id)
            .cloned()
            .collect())
    }

    async fn upsert_exercise(&self, exercise: &NewExercise) -> GenResult<Uuid> {
        let mut t = self.tables.lock();
        let (id, _) = t
            .exercises
            .entry(catalog_key(&exercise.name))
            .or_insert_with(|| (Uuid::new_v4(), exercise.clone()));
        Ok(*id)
    }

    async fn upsert_food(&self, food: &NewFood) -> GenResult<Uuid> {
        let mut t = self.tables.lock();
        let (id, _) = t
            .foods
            .entry(catalog_key(&food.name))
            .or_insert_with(|| (Uuid::new_v4(), food.clone()));
        Ok(*id)
    }

    async fn any_exercise_id(&self) -> GenResult<Option<Uuid>> {
        Ok(self.tables.lock().exercises.values().map(|(id, _)| *id).next())
    }

    async fn active_plan(&self, user_id: &str) -> GenResult<Option<String>> {
        Ok(self.tables.lock().subscriptions.get(user_id).cloned())
    }

    async fn set_active_plan(&self, user_id: &str, plan: &str) -> GenResult<()> {
        self.tables.lock().subscriptions.insert(user_id.to_string(), plan.to_string());
        Ok(())
    }

    async fn increment_usage(
        &self,
        user_id: &str,
        window: QuotaWindow,
        category: QuotaCategory,
        limit: i64,
    ) -> GenResult<IncrementOutcome> {
        let mut t = self.tables.lock();
        let row = t.usage.entry((user_id.to_string(), window)).or_default();
        let counter = match category {
            QuotaCategory::Workout => &mut row.workouts_used,
            QuotaCategory::Diet => &mut row.diets_used,
        };
        if limit >= 0 && *counter >= limit {
            return Ok(IncrementOutcome::Exhausted(*counter));
        }
        *counter += 1;
        Ok(IncrementOutcome::Incremented(*counter))
    }

    async fn read_usage(&self, user_id: &str, window: QuotaWindow) -> GenResult<UsageCounts> {
        Ok(self
            .tables
            .lock()
            .usage
            .get(&(user_id.to_string(), window))
            .copied()
            .unwrap_or_default())
    }

    async fn user_profile(&self, user_id: &str) -> GenResult<Option<UserProfile>> {
        Ok(self.tables.lock().profiles.get(user_id).cloned())
    }

    async fn save_user_profile(&self, user_id: &str, profile: &UserProfile) -> GenResult<()> {
        self.tables.lock().profiles.insert(user_id.to_string(), profile.clone());
        Ok(())
    }

    async fn save_recommendations(&self, recs: &[StoredRecommendation]) -> GenResult<()> {
        self.tables.lock().recommendations.extend_from_slice(recs);
        Ok(())
    }

    async fn append_audit(&self, entry: &AuditEntry) -> GenResult<()> {
        self.tables.lock().audit.push(entry.clone());
        Ok(())
    }

    async fn audit_entries(&self, user_id: &str) -> GenResult<Vec<AuditEntry>> {
        Ok(self.tables.lock().audit.iter().filter(|a| a.user_id == user_id).cloned().collect())
    }
}
