use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::GenResult;
use crate::wire::{
    DietGoal, Difficulty, GenerationKind, Meal, MealType, QuotaCategory, Recommendation,
    UserProfile, WorkoutGoal,
};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// ========================================
/// Persisted records
/// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub difficulty_level: Difficulty,
    pub goal: WorkoutGoal,
    pub days_per_week: u8,
    pub duration_minutes: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineExercise {
    pub routine_id: Uuid,
    pub exercise_id: Uuid,
    pub day_of_week: u8,
    pub order_in_day: u32,
    pub sets: u32,
    pub reps_min: u32,
    pub reps_max: u32,
    pub rest_seconds: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietPlanRecord {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub goal: DietGoal,
    pub target_calories: f64,
    pub target_protein: f64,
    pub target_carbs: f64,
    pub target_fat: f64,
    pub meals_per_day: u8,
    pub restrictions: Vec<String>,
    /// The validated meals as generated, before weekly expansion.
    pub meals: Vec<Meal>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietMeal {
    pub id: Uuid,
    pub diet_plan_id: Uuid,
    pub meal_type: MealType,
    pub day_of_week: u8,
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub prep_time_minutes: u32,
    pub order_in_day: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietMealFood {
    pub meal_id: Uuid,
    pub food_id: Uuid,
    pub quantity_grams: f64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExercise {
    pub name: String,
    pub category: String,
    pub equipment: String,
    pub muscle_groups: Vec<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFood {
    pub name: String,
    pub category: String,
    pub calories_per_100g: f64,
    pub protein_per_100g: f64,
    pub carbs_per_100g: f64,
    pub fat_per_100g: f64,
    pub fiber_per_100g: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecommendation {
    pub id: Uuid,
    pub user_id: String,
    pub recommendation: Recommendation,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: String,
    pub kind: GenerationKind,
    pub provider: String,
    pub model: String,
    pub prompt: String,
    pub response: Value,
    pub processing_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub routine_id: Option<Uuid>,
    pub diet_plan_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Key of one monthly usage row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotaWindow {
    pub year: i32,
    pub month: u32,
}

impl QuotaWindow {
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self { year: at.year(), month: at.month() }
    }

    pub fn current() -> Self {
        Self::containing(Utc::now())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounts {
    pub workouts_used: i64,
    pub diets_used: i64,
}

impl UsageCounts {
    pub fn get(&self, category: QuotaCategory) -> i64 {
        match category {
            QuotaCategory::Workout => self.workouts_used,
            QuotaCategory::Diet => self.diets_used,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncrementOutcome {
    /// Counter value after the increment.
    Incremented(i64),
    /// Counter was already at the limit and left unchanged.
    Exhausted(i64),
}

/// Persistence the generation pipeline writes through.
///
/// Usage increments, catalog upserts and plan activations are single atomic
/// operations in every implementation.
#[async_trait]
pub trait Store: Send + Sync {
    /// Archives the owner's active routines and inserts `routine` as the active
    /// one. Either both happen or neither. Returns how many were archived.
    async fn activate_routine(&self, routine: &Routine) -> GenResult<usize>;
    async fn get_routine(&self, id: Uuid) -> GenResult<Option<Routine>>;
    async fn insert_routine_exercises(&self, links: &[RoutineExercise]) -> GenResult<()>;
    async fn routine_exercises(&self, routine_id: Uuid) -> GenResult<Vec<RoutineExercise>>;

    /// Same contract as [`Store::activate_routine`], for diet plans.
    async fn activate_diet_plan(&self, plan: &DietPlanRecord) -> GenResult<usize>;
    async fn get_diet_plan(&self, id: Uuid) -> GenResult<Option<DietPlanRecord>>;
    async fn insert_diet_meals(&self, meals: &[DietMeal]) -> GenResult<()>;
    async fn insert_meal_foods(&self, foods: &[DietMealFood]) -> GenResult<()>;
    async fn diet_meals(&self, plan_id: Uuid) -> GenResult<Vec<DietMeal>>;

    /// Returns the id of the entry whose name matches case-insensitively,
    /// creating it first when absent.
    async fn upsert_exercise(&self, exercise: &NewExercise) -> GenResult<Uuid>;
    async fn upsert_food(&self, food: &NewFood) -> GenResult<Uuid>;
    async fn any_exercise_id(&self) -> GenResult<Option<Uuid>>;

    async fn active_plan(&self, user_id: &str) -> GenResult<Option<String>>;
    async fn set_active_plan(&self, user_id: &str, plan: &str) -> GenResult<()>;
    /// Adds one to the counter unless it already reached `limit`. A negative
    /// limit never blocks.
    async fn increment_usage(
        &self,
        user_id: &str,
        window: QuotaWindow,
        category: QuotaCategory,
        limit: i64,
    ) -> GenResult<IncrementOutcome>;
    async fn read_usage(&self, user_id: &str, window: QuotaWindow) -> GenResult<UsageCounts>;

    async fn user_profile(&self, user_id: &str) -> GenResult<Option<UserProfile>>;
    async fn save_user_profile(&self, user_id: &str, profile: &UserProfile) -> GenResult<()>;

    async fn save_recommendations(&self, recs: &[StoredRecommendation]) -> GenResult<()>;
    async fn append_audit(&self, entry: &AuditEntry) -> GenResult<()>;
    async fn audit_entries(&self, user_id: &str) -> GenResult<Vec<AuditEntry>>;
}

pub type DynStore = std::sync::Arc<dyn Store>;

/// Key used for case-insensitive catalog matching.
pub fn catalog_key(name: &str) -> String {
    name.trim().to_lowercase()
}
