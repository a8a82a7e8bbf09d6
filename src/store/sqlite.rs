use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use super::{
    catalog_key, AuditEntry, DietMeal, DietMealFood, DietPlanRecord, IncrementOutcome,
    NewExercise, NewFood, QuotaWindow, Routine, RoutineExercise, Store, StoredRecommendation,
    UsageCounts,
};
use crate::errors::{GenError, GenResult};
use crate::wire::{label, QuotaCategory, Recommendation, UserProfile};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS routines (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    difficulty_level TEXT NOT NULL,
    goal TEXT NOT NULL,
    days_per_week INTEGER NOT NULL,
    duration_minutes INTEGER NOT NULL,
    is_active INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS routine_exercises (
    routine_id TEXT NOT NULL REFERENCES routines(id),
    exercise_id TEXT NOT NULL REFERENCES exercises(id),
    day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 1 AND 7),
    order_in_day INTEGER NOT NULL,
    sets INTEGER NOT NULL,
    reps_min INTEGER NOT NULL,
    reps_max INTEGER NOT NULL,
    rest_seconds INTEGER NOT NULL,
    notes TEXT
);

CREATE TABLE IF NOT EXISTS diet_plans (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    goal TEXT NOT NULL,
    target_calories REAL NOT NULL,
    target_protein REAL NOT NULL,
    target_carbs REAL NOT NULL,
    target_fat REAL NOT NULL,
    meals_per_day INTEGER NOT NULL,
    restrictions TEXT NOT NULL,
    meals TEXT NOT NULL,
    is_active INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS diet_meals (
    id TEXT PRIMARY KEY,
    diet_plan_id TEXT NOT NULL REFERENCES diet_plans(id),
    meal_type TEXT NOT NULL,
    day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 1 AND 7),
    name TEXT NOT NULL,
    description TEXT NOT NULL,
    instructions TEXT NOT NULL,
    prep_time_minutes INTEGER NOT NULL,
    order_in_day INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS diet_meal_foods (
    meal_id TEXT NOT NULL REFERENCES diet_meals(id),
    food_id TEXT NOT NULL REFERENCES foods(id),
    quantity_grams REAL NOT NULL,
    notes TEXT
);

CREATE TABLE IF NOT EXISTS exercises (
    id TEXT PRIMARY KEY,
    name_key TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    equipment TEXT NOT NULL,
    muscle_groups TEXT NOT NULL,
    instructions TEXT
);

CREATE TABLE IF NOT EXISTS foods (
    id TEXT PRIMARY KEY,
    name_key TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    calories_per_100g REAL NOT NULL,
    protein_per_100g REAL NOT NULL,
    carbs_per_100g REAL NOT NULL,
    fat_per_100g REAL NOT NULL,
    fiber_per_100g REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS subscriptions (
    user_id TEXT PRIMARY KEY,
    plan TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS usage_quotas (
    user_id TEXT NOT NULL,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    workouts_used INTEGER NOT NULL DEFAULT 0,
    diets_used INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, year, month)
);

CREATE TABLE IF NOT EXISTS recommendations (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    type TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    priority TEXT NOT NULL,
    category TEXT NOT NULL,
    actionable INTEGER NOT NULL,
    metadata TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ai_generation_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    generation_type TEXT NOT NULL,
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    prompt TEXT NOT NULL,
    response TEXT NOT NULL,
    processing_ms INTEGER NOT NULL,
    success INTEGER NOT NULL,
    error TEXT,
    routine_id TEXT,
    diet_plan_id TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_routines_user ON routines(user_id, is_active);
CREATE INDEX IF NOT EXISTS idx_diet_plans_user ON diet_plans(user_id, is_active);
CREATE INDEX IF NOT EXISTS idx_diet_meals_plan ON diet_meals(diet_plan_id);
CREATE INDEX IF NOT EXISTS idx_routine_exercises_routine ON routine_exercises(routine_id);
CREATE INDEX IF NOT EXISTS idx_generation_logs_user ON ai_generation_logs(user_id);

PRAGMA user_version = 1;
";

/// Version 2 adds stored user profiles.
const PROFILES: &str = "
CREATE TABLE IF NOT EXISTS user_profiles (
    user_id TEXT PRIMARY KEY,
    profile TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

PRAGMA user_version = 2;
";

/// SQLite-backed store. Calls are short and run on the caller's task under a
/// connection lock.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> GenResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| GenError::Store(format!("opening {}: {e}", path.display())))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> GenResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> GenResult<Self> {
        let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < 1 {
            debug!("creating schema");
            conn.execute_batch(SCHEMA)?;
        }
        if version < 2 {
            debug!(from = version, "migrating schema to version 2");
            conn.execute_batch(PROFILES)?;
        }
        Ok(Self { conn: Mutex::new(conn) })
    }
}

fn conversion<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion(idx, e))
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| Uuid::parse_str(&s).map_err(|e| conversion(idx, e))).transpose()
}

fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion(idx, e))
}

fn json_at<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    serde_json::from_str(&s).map_err(|e| conversion(idx, e))
}

/// Enum columns hold the serde name, e.g. `lose_weight`.
fn enum_at<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    serde_json::from_value(Value::String(s)).map_err(|e| conversion(idx, e))
}

fn to_json<T: Serialize>(v: &T) -> GenResult<String> {
    Ok(serde_json::to_string(v)?)
}

fn routine_from_row(row: &Row<'_>) -> rusqlite::Result<Routine> {
    Ok(Routine {
        id: uuid_at(row, 0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        difficulty_level: enum_at(row, 4)?,
        goal: enum_at(row, 5)?,
        days_per_week: row.get(6)?,
        duration_minutes: row.get(7)?,
        is_active: row.get(8)?,
        created_at: time_at(row, 9)?,
    })
}

fn diet_plan_from_row(row: &Row<'_>) -> rusqlite::Result<DietPlanRecord> {
    Ok(DietPlanRecord {
        id: uuid_at(row, 0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        goal: enum_at(row, 4)?,
        target_calories: row.get(5)?,
        target_protein: row.get(6)?,
        target_carbs: row.get(7)?,
        target_fat: row.get(8)?,
        meals_per_day: row.get(9)?,
        restrictions: json_at(row, 10)?,
        meals: json_at(row, 11)?,
        is_active: row.get(12)?,
        created_at: time_at(row, 13)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn activate_routine(&self, r: &Routine) -> GenResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let archived = tx.execute(
            "UPDATE routines SET is_active = 0 WHERE user_id = ?1 AND is_active = 1",
            params![r.user_id],
        )?;
        tx.execute(
            "INSERT INTO routines (id, user_id, name, description, difficulty_level, goal,
                days_per_week, duration_minutes, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                r.id.to_string(),
                r.user_id,
                r.name,
                r.description,
                label(&r.difficulty_level),
                label(&r.goal),
                r.days_per_week,
                r.duration_minutes,
                r.is_active,
                r.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(archived)
    }

    async fn get_routine(&self, id: Uuid) -> GenResult<Option<Routine>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT id, user_id, name, description, difficulty_level, goal, days_per_week,
                    duration_minutes, is_active, created_at
                 FROM routines WHERE id = ?1",
                params![id.to_string()],
                routine_from_row,
            )
            .optional()?)
    }

    async fn insert_routine_exercises(&self, links: &[RoutineExercise]) -> GenResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO routine_exercises (routine_id, exercise_id, day_of_week, order_in_day,
                    sets, reps_min, reps_max, rest_seconds, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for l in links {
                stmt.execute(params![
                    l.routine_id.to_string(),
                    l.exercise_id.to_string(),
                    l.day_of_week,
                    l.order_in_day,
                    l.sets,
                    l.reps_min,
                    l.reps_max,
                    l.rest_seconds,
                    l.notes,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn routine_exercises(&self, routine_id: Uuid) -> GenResult<Vec<RoutineExercise>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT routine_id, exercise_id, day_of_week, order_in_day, sets, reps_min, reps_max,
                rest_seconds, notes
             FROM routine_exercises WHERE routine_id = ?1
             ORDER BY day_of_week, order_in_day",
        )?;
        let rows = stmt.query_map(params![routine_id.to_string()], |row| {
            Ok(RoutineExercise {
                routine_id: uuid_at(row, 0)?,
                exercise_id: uuid_at(row, 1)?,
                day_of_week: row.get(2)?,
                order_in_day: row.get(3)?,
                sets: row.get(4)?,
                reps_min: row.get(5)?,
                reps_max: row.get(6)?,
                rest_seconds: row.get(7)?,
                notes: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn activate_diet_plan(&self, p: &DietPlanRecord) -> GenResult<usize> {
        let restrictions = to_json(&p.restrictions)?;
        let meals = to_json(&p.meals)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let archived = tx.execute(
            "UPDATE diet_plans SET is_active = 0 WHERE user_id = ?1 AND is_active = 1",
            params![p.user_id],
        )?;
        tx.execute(
            "INSERT INTO diet_plans (id, user_id, name, description, goal, target_calories,
                target_protein, target_carbs, target_fat, meals_per_day, restrictions, meals,
                is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                p.id.to_string(),
                p.user_id,
                p.name,
                p.description,
                label(&p.goal),
                p.target_calories,
                p.target_protein,
                p.target_carbs,
                p.target_fat,
                p.meals_per_day,
                restrictions,
                meals,
                p.is_active,
                p.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(archived)
    }

    async fn get_diet_plan(&self, id: Uuid) -> GenResult<Option<DietPlanRecord>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT id, user_id, name, description, goal, target_calories, target_protein,
                    target_carbs, target_fat, meals_per_day, restrictions, meals, is_active,
                    created_at
                 FROM diet_plans WHERE id = ?1",
                params![id.to_string()],
                diet_plan_from_row,
            )
            .optional()?)
    }

    async fn insert_diet_meals(&self, meals: &[DietMeal]) -> GenResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO diet_meals (id, diet_plan_id, meal_type, day_of_week, name,
                    description, instructions, prep_time_minutes, order_in_day)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for m in meals {
                stmt.execute(params![
                    m.id.to_string(),
                    m.diet_plan_id.to_string(),
                    label(&m.meal_type),
                    m.day_of_week,
                    m.name,
                    m.description,
                    m.instructions,
                    m.prep_time_minutes,
                    m.order_in_day,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn insert_meal_foods(&self, foods: &[DietMealFood]) -> GenResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO diet_meal_foods (meal_id, food_id, quantity_grams, notes)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for f in foods {
                stmt.execute(params![
                    f.meal_id.to_string(),
                    f.food_id.to_string(),
                    f.quantity_grams,
                    f.notes,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn diet_meals(&self, plan_id: Uuid) -> GenResult<Vec<DietMeal>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, diet_plan_id, meal_type, day_of_week, name, description, instructions,
                prep_time_minutes, order_in_day
             FROM diet_meals WHERE diet_plan_id = ?1
             ORDER BY day_of_week, order_in_day",
        )?;
        let rows = stmt.query_map(params![plan_id.to_string()], |row| {
            Ok(DietMeal {
                id: uuid_at(row, 0)?,
                diet_plan_id: uuid_at(row, 1)?,
                meal_type: enum_at(row, 2)?,
                day_of_week: row.get(3)?,
                name: row.get(4)?,
                description: row.get(5)?,
                instructions: row.get(6)?,
                prep_time_minutes: row.get(7)?,
                order_in_day: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    async fn upsert_exercise(&self, e: &NewExercise) -> GenResult<Uuid> {
        let key = catalog_key(&e.name);
        let muscles = to_json(&e.muscle_groups)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO exercises (id, name_key, name, category, equipment, muscle_groups, instructions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name_key) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                key,
                e.name.trim(),
                e.category,
                e.equipment,
                muscles,
                e.instructions,
            ],
        )?;
        Ok(conn.query_row(
            "SELECT id FROM exercises WHERE name_key = ?1",
            params![key],
            |row| uuid_at(row, 0),
        )?)
    }

    async fn upsert_food(&self, f: &NewFood) -> GenResult<Uuid> {
        let key = catalog_key(&f.name);
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO foods (id, name_key, name, category, calories_per_100g, protein_per_100g,
                carbs_per_100g, fat_per_100g, fiber_per_100g)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(name_key) DO NOTHING",
            params![
                Uuid::new_v4().to_string(),
                key,
                f.name.trim(),
                f.category,
                f.calories_per_100g,
                f.protein_per_100g,
                f.carbs_per_100g,
                f.fat_per_100g,
                f.fiber_per_100g,
            ],
        )?;
        Ok(conn.query_row("SELECT id FROM foods WHERE name_key = ?1", params![key], |row| {
            uuid_at(row, 0)
        })?)
    }

    async fn any_exercise_id(&self) -> GenResult<Option<Uuid>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row("SELECT id FROM exercises LIMIT 1", [], |row| uuid_at(row, 0))
            .optional()?)
    }

    async fn active_plan(&self, user_id: &str) -> GenResult<Option<String>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT plan FROM subscriptions WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    async fn set_active_plan(&self, user_id: &str, plan: &str) -> GenResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO subscriptions (user_id, plan) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET plan = excluded.plan",
            params![user_id, plan],
        )?;
        Ok(())
    }

    async fn increment_usage(
        &self,
        user_id: &str,
        window: QuotaWindow,
        category: QuotaCategory,
        limit: i64,
    ) -> GenResult<IncrementOutcome> {
        let column = match category {
            QuotaCategory::Workout => "workouts_used",
            QuotaCategory::Diet => "diets_used",
        };
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO usage_quotas (user_id, year, month) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, year, month) DO NOTHING",
            params![user_id, window.year, window.month],
        )?;
        let bumped: Option<i64> = conn
            .query_row(
                &format!(
                    "UPDATE usage_quotas SET {column} = {column} + 1
                     WHERE user_id = ?1 AND year = ?2 AND month = ?3 AND (?4 < 0 OR {column} < ?4)
                     RETURNING {column}"
                ),
                params![user_id, window.year, window.month, limit],
                |row| row.get(0),
            )
            .optional()?;
        match bumped {
            Some(n) => Ok(IncrementOutcome::Incremented(n)),
            None => {
                let current: i64 = conn.query_row(
                    &format!(
                        "SELECT {column} FROM usage_quotas WHERE user_id = ?1 AND year = ?2 AND month = ?3"
                    ),
                    params![user_id, window.year, window.month],
                    |row| row.get(0),
                )?;
                Ok(IncrementOutcome::Exhausted(current))
            }
        }
    }

    async fn read_usage(&self, user_id: &str, window: QuotaWindow) -> GenResult<UsageCounts> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT workouts_used, diets_used FROM usage_quotas
                 WHERE user_id = ?1 AND year = ?2 AND month = ?3",
                params![user_id, window.year, window.month],
                |row| Ok(UsageCounts { workouts_used: row.get(0)?, diets_used: row.get(1)? }),
            )
            .optional()?;
        Ok(row.unwrap_or_default())
    }

    async fn user_profile(&self, user_id: &str) -> GenResult<Option<UserProfile>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT profile FROM user_profiles WHERE user_id = ?1",
                params![user_id],
                |row| json_at(row, 0),
            )
            .optional()?)
    }

    async fn save_user_profile(&self, user_id: &str, profile: &UserProfile) -> GenResult<()> {
        let body = to_json(profile)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO user_profiles (user_id, profile, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET profile = excluded.profile, updated_at = excluded.updated_at",
            params![user_id, body, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn save_recommendations(&self, recs: &[StoredRecommendation]) -> GenResult<()> {
        let mut rows = Vec::with_capacity(recs.len());
        for r in recs {
            rows.push((r, to_json(&r.recommendation.metadata)?));
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO recommendations (id, user_id, type, title, description, priority,
                    category, actionable, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for (r, metadata) in rows {
                let rec: &Recommendation = &r.recommendation;
                stmt.execute(params![
                    r.id.to_string(),
                    r.user_id,
                    rec.kind,
                    rec.title,
                    rec.description,
                    rec.priority,
                    rec.category,
                    rec.actionable,
                    metadata,
                    r.created_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    async fn append_audit(&self, e: &AuditEntry) -> GenResult<()> {
        let response = to_json(&e.response)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO ai_generation_logs (user_id, generation_type, provider, model, prompt,
                response, processing_ms, success, error, routine_id, diet_plan_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                e.user_id,
                e.kind.to_string(),
                e.provider,
                e.model,
                e.prompt,
                response,
                e.processing_ms as i64,
                e.success,
                e.error,
                e.routine_id.map(|id| id.to_string()),
                e.diet_plan_id.map(|id| id.to_string()),
                e.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn audit_entries(&self, user_id: &str) -> GenResult<Vec<AuditEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT user_id, generation_type, provider, model, prompt, response, processing_ms,
                success, error, routine_id, diet_plan_id, created_at
             FROM ai_generation_logs WHERE user_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            let ms: i64 = row.get(6)?;
            Ok(AuditEntry {
                user_id: row.get(0)?,
                kind: enum_at(row, 1)?,
                provider: row.get(2)?,
                model: row.get(3)?,
                prompt: row.get(4)?,
                response: json_at(row, 5)?,
                processing_ms: ms.max(0) as u64,
                success: row.get(7)?,
                error: row.get(8)?,
                routine_id: opt_uuid_at(row, 9)?,
                diet_plan_id: opt_uuid_at(row, 10)?,
                created_at: time_at(row, 11)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
