use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::{parse_quantity_to_grams, parse_reps, parse_rest_seconds, CatalogResolver};
use crate::config::Config;
use crate::errors::{GenError, GenResult};
use crate::insights::{self, ProgressInsights};
use crate::log::Artifacts;
use crate::nutrition;
use crate::plan;
use crate::prompt::build_prompt;
use crate::provider::DynProvider;
use crate::quota::{QuotaTracker, UsageReport};
use crate::repair::{self, extract_json, masks_failures, Outcome};
use crate::schedule;
use crate::store::{
    catalog_key, AuditEntry, DietMeal, DietMealFood, DietPlanRecord, DynStore, Routine,
    RoutineExercise, StoredRecommendation,
};
use crate::wire::{
    label, DietGoal, DietRequest, Difficulty, Exercise, GenerationKind, GenerationRequest, Meal, ParsedPlan,
    ProgressData, QuotaCategory, Recipe, RecipeRequest, RecommendationRequest, ScheduledMeal,
    UserProfile, WorkoutGoal, WorkoutLayout, WorkoutPlan, WorkoutRequest,
};

pub const DEFAULT_PREP_MINUTES: u32 = 30;
pub const DEFAULT_INSTRUCTIONS: &str = "Prepare as indicated";
const DEFAULT_SETS: u32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct WorkoutOutcome {
    pub routine: Routine,
    pub plan: WorkoutPlan,
    pub links: Vec<RoutineExercise>,
    pub repair: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct DietOutcome {
    pub plan: DietPlanRecord,
    pub meals: Vec<DietMeal>,
    pub foods: Vec<DietMealFood>,
    /// `None` for plans derived from a stored one rather than generated.
    pub repair: Option<Outcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeOutcome {
    pub recipe: Recipe,
    pub repair: Outcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteProfile {
    pub workout: WorkoutOutcome,
    pub diet: DietOutcome,
    pub recommendations: Vec<StoredRecommendation>,
}

/// Fields to change when regenerating a stored diet plan. Unset fields keep
/// the stored plan's values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DietModifications {
    pub goal: Option<DietGoal>,
    pub calories: Option<u32>,
    pub restrictions: Option<Vec<String>>,
    pub meals_per_day: Option<u8>,
    pub target_protein: Option<u32>,
    #[serde(default)]
    pub preferred_foods: Vec<String>,
    #[serde(default)]
    pub avoid_foods: Vec<String>,
    pub preferences: Option<String>,
    pub profile: Option<UserProfile>,
}

/// Fields to change when regenerating a stored routine. Goal, difficulty and
/// schedule default to the stored routine's; the rest start empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkoutModifications {
    pub goal: Option<WorkoutGoal>,
    pub difficulty: Option<Difficulty>,
    pub days_per_week: Option<u8>,
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub target_muscles: Vec<String>,
    pub preferences: Option<String>,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    pub recommendations: Vec<StoredRecommendation>,
    pub insights: ProgressInsights,
}

pub const PROGRESS_CONTEXT: &str = "Progress update - analyze performance and suggest improvements";

/// What the audit log needs from one provider round trip.
struct Attempt {
    kind: GenerationKind,
    user_id: String,
    prompt: String,
    response: Value,
    started: Instant,
}

impl Attempt {
    fn new(request: &GenerationRequest) -> Self {
        Self {
            kind: request.kind(),
            user_id: request.user_id().to_string(),
            prompt: build_prompt(request),
            response: Value::Null,
            started: Instant::now(),
        }
    }
}

struct Generated {
    plan: ParsedPlan,
    repair: Outcome,
}

struct DietDraft {
    user_id: String,
    name: String,
    description: String,
    goal: DietGoal,
    target_calories: f64,
    meals_per_day: u8,
    restrictions: Vec<String>,
    meals: Vec<Meal>,
}

pub struct Pipeline {
    provider: DynProvider,
    store: DynStore,
    quota: QuotaTracker,
    catalog: CatalogResolver,
    config: Config,
}

impl Pipeline {
    pub fn new(provider: DynProvider, store: DynStore, config: Config) -> Self {
        let quota = QuotaTracker::new(store.clone(), config.plan_limits.clone());
        let catalog = CatalogResolver::new(store.clone());
        Self { provider, store, quota, catalog, config }
    }

    // Shared provider round trip

    async fn generate(&self, attempt: &mut Attempt) -> GenResult<Generated> {
        let kind = attempt.kind;
        let artifacts = Artifacts::new(self.config.artifacts_dir.as_deref());
        artifacts.save_text(kind, "prompt", &attempt.prompt);

        let budget = self.config.budget_for(kind);
        debug!(%kind, tx = %artifacts.tx(), provider = self.provider.name(), max_tokens = budget.max_output_tokens, "calling provider");
        let raw = self.provider.generate(&attempt.prompt, &budget).await?;
        attempt.response = json!({ "raw": raw });
        artifacts.save_text(kind, "raw", &raw);
        if artifacts.dir().is_some() {
            if let Ok(extracted) = extract_json(&raw) {
                artifacts.save_text(kind, "extracted", &extracted);
            }
        }

        let normalized = repair::normalize(&raw, kind);
        artifacts.save_json(kind, "normalized", &normalized);
        if let Outcome::Fallback(reason) = &normalized.outcome {
            if !masks_failures(kind) {
                return Err(GenError::MalformedResponse(reason.clone()));
            }
            warn!(%kind, reason = %reason, "returning fallback result");
        }

        let plan = plan::validate(kind, &normalized.value)?;
        attempt.response = normalized.value;
        Ok(Generated { plan, repair: normalized.outcome })
    }

    /// Appends the audit entry for an attempt. Never fails the caller.
    async fn record<T, F>(&self, attempt: &Attempt, result: &GenResult<T>, links: F)
    where
        F: FnOnce(&T) -> (Option<Uuid>, Option<Uuid>),
    {
        let (routine_id, diet_plan_id) = result.as_ref().map(links).unwrap_or((None, None));
        let entry = AuditEntry {
            user_id: attempt.user_id.clone(),
            kind: attempt.kind,
            provider: self.provider.name().to_string(),
            model: self.provider.model().to_string(),
            prompt: attempt.prompt.clone(),
            response: attempt.response.clone(),
            processing_ms: attempt.started.elapsed().as_millis() as u64,
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
            routine_id,
            diet_plan_id,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.append_audit(&entry).await {
            warn!(user_id = %entry.user_id, kind = %entry.kind, error = %e, "could not append audit entry");
        }
    }

    /// The request's own profile, else the one stored for the user. Lookup
    /// failures degrade to no profile.
    async fn resolve_profile(&self, user_id: &str, given: Option<UserProfile>) -> Option<UserProfile> {
        if given.is_some() {
            return given;
        }
        match self.store.user_profile(user_id).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(%user_id, error = %e, "could not load stored profile");
                None
            }
        }
    }

    pub async fn save_profile(&self, user_id: &str, profile: &UserProfile) -> GenResult<()> {
        if user_id.trim().is_empty() {
            return Err(GenError::InvalidRequest("user_id is empty".into()));
        }
        self.store.save_user_profile(user_id, profile).await?;
        info!(%user_id, "profile stored");
        Ok(())
    }

    // Workout

    pub async fn generate_workout(&self, req: &WorkoutRequest) -> GenResult<WorkoutOutcome> {
        let mut req = req.clone();
        req.profile = self.resolve_profile(&req.user_id, req.profile.take()).await;
        let request = GenerationRequest::Workout(req.clone());
        request.validate()?;
        self.quota.check_and_increment(&req.user_id, QuotaCategory::Workout).await?;

        let mut attempt = Attempt::new(&request);
        let result = self.workout_from_provider(&req, &mut attempt).await;
        self.record(&attempt, &result, |o| (Some(o.routine.id), None)).await;
        result
    }

    async fn workout_from_provider(
        &self,
        req: &WorkoutRequest,
        attempt: &mut Attempt,
    ) -> GenResult<WorkoutOutcome> {
        let generated = self.generate(attempt).await?;
        let ParsedPlan::Workout(plan) = generated.plan else {
            return Err(GenError::shape("$"));
        };

        let routine = Routine {
            id: Uuid::new_v4(),
            user_id: req.user_id.clone(),
            name: plan.name.clone(),
            description: plan.description.clone(),
            difficulty_level: req.difficulty,
            goal: req.goal,
            days_per_week: req.days_per_week,
            duration_minutes: req.duration_minutes,
            is_active: true,
            created_at: Utc::now(),
        };
        let archived = self.store.activate_routine(&routine).await?;
        let links = self.link_exercises(routine.id, &plan.layout).await;

        info!(
            user_id = %req.user_id,
            routine_id = %routine.id,
            exercises = plan.layout.exercise_count(),
            linked = links.len(),
            archived,
            "workout routine stored"
        );
        Ok(WorkoutOutcome { routine, plan, links, repair: generated.repair })
    }

    /// Links every exercise of the plan to the routine. Link failures leave the
    /// routine in place without exercises.
    async fn link_exercises(&self, routine_id: Uuid, layout: &WorkoutLayout) -> Vec<RoutineExercise> {
        let placed = place_exercises(layout);
        let ids = match self.catalog.resolve_exercises(placed.iter().map(|(_, _, ex)| *ex)).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(%routine_id, error = %e, "could not resolve exercises");
                return Vec::new();
            }
        };

        let links: Vec<RoutineExercise> = placed
            .iter()
            .filter_map(|(day, order, ex)| {
                let exercise_id = *ids.get(&catalog_key(&ex.name))?;
                let (reps_min, reps_max) = parse_reps(&ex.reps);
                Some(RoutineExercise {
                    routine_id,
                    exercise_id,
                    day_of_week: *day,
                    order_in_day: *order,
                    sets: if ex.sets == 0 { DEFAULT_SETS } else { ex.sets },
                    reps_min,
                    reps_max,
                    rest_seconds: parse_rest_seconds(ex.rest_time.as_deref()),
                    notes: ex.instructions.clone(),
                })
            })
            .collect();

        if let Err(e) = self.store.insert_routine_exercises(&links).await {
            warn!(%routine_id, error = %e, "could not link exercises");
            return Vec::new();
        }
        links
    }

    /// Generates a fresh routine from a stored one's settings merged with `changes`.
    pub async fn regenerate_workout(
        &self,
        routine_id: Uuid,
        changes: WorkoutModifications,
    ) -> GenResult<WorkoutOutcome> {
        let existing = self
            .store
            .get_routine(routine_id)
            .await?
            .ok_or_else(|| GenError::NotFound(format!("routine {routine_id}")))?;

        let req = WorkoutRequest {
            user_id: existing.user_id,
            goal: changes.goal.unwrap_or(existing.goal),
            difficulty: changes.difficulty.unwrap_or(existing.difficulty_level),
            days_per_week: changes.days_per_week.unwrap_or(existing.days_per_week),
            duration_minutes: changes.duration_minutes.unwrap_or(existing.duration_minutes),
            equipment: changes.equipment,
            target_muscles: changes.target_muscles,
            preferences: changes.preferences,
            profile: changes.profile,
        };
        self.generate_workout(&req).await
    }

    // Diet

    /// Unset meals per day take the configured default.
    pub async fn generate_diet(&self, req: &DietRequest) -> GenResult<DietOutcome> {
        let mut req = req.clone();
        req.meals_per_day = req.meals_per_day.or(Some(self.config.default_meals_per_day));
        req.profile = self.resolve_profile(&req.user_id, req.profile.take()).await;
        let request = GenerationRequest::Diet(req.clone());
        request.validate()?;
        self.quota.check_and_increment(&req.user_id, QuotaCategory::Diet).await?;

        let mut attempt = Attempt::new(&request);
        let result = self.diet_from_provider(&req, &mut attempt).await;
        self.record(&attempt, &result, |o| (None, Some(o.plan.id))).await;
        result
    }

    async fn diet_from_provider(&self, req: &DietRequest, attempt: &mut Attempt) -> GenResult<DietOutcome> {
        let generated = self.generate(attempt).await?;
        let ParsedPlan::Diet(plan) = generated.plan else {
            return Err(GenError::shape("$"));
        };

        let draft = DietDraft {
            user_id: req.user_id.clone(),
            name: plan.name,
            description: plan.description,
            goal: req.goal,
            target_calories: req.calories as f64,
            meals_per_day: req.meals_per_day(),
            restrictions: req.restrictions.clone(),
            meals: plan.meals,
        };
        let mut outcome = self.persist_diet(draft).await?;
        outcome.repair = Some(generated.repair);
        Ok(outcome)
    }

    /// Expands, then stores the plan as the user's only active one along with
    /// its meals and food links.
    async fn persist_diet(&self, draft: DietDraft) -> GenResult<DietOutcome> {
        let schedule = schedule::expand(&draft.meals, draft.meals_per_day)?;
        let macros = nutrition::aggregate(&draft.meals);

        let record = DietPlanRecord {
            id: Uuid::new_v4(),
            user_id: draft.user_id,
            name: draft.name,
            description: draft.description,
            goal: draft.goal,
            target_calories: draft.target_calories,
            target_protein: macros.protein,
            target_carbs: macros.carbs,
            target_fat: macros.fat,
            meals_per_day: draft.meals_per_day,
            restrictions: draft.restrictions,
            meals: draft.meals,
            is_active: true,
            created_at: Utc::now(),
        };
        let archived = self.store.activate_diet_plan(&record).await?;

        let meals: Vec<DietMeal> = schedule.iter().map(|s| diet_meal(record.id, s)).collect();
        if let Err(e) = self.store.insert_diet_meals(&meals).await {
            warn!(plan_id = %record.id, error = %e, "could not store diet meals");
            return Ok(DietOutcome { plan: record, meals: Vec::new(), foods: Vec::new(), repair: None });
        }
        let foods = self.link_foods(&schedule, &meals).await;

        info!(
            user_id = %record.user_id,
            plan_id = %record.id,
            meals = meals.len(),
            foods = foods.len(),
            archived,
            "diet plan stored"
        );
        Ok(DietOutcome { plan: record, meals, foods, repair: None })
    }

    async fn link_foods(&self, schedule: &[ScheduledMeal], meals: &[DietMeal]) -> Vec<DietMealFood> {
        let ids = self
            .catalog
            .resolve_foods(schedule.iter().flat_map(|s| s.meal.items.iter()))
            .await;

        let mut links = Vec::new();
        for (scheduled, meal) in schedule.iter().zip(meals) {
            for item in &scheduled.meal.items {
                let Some(food_id) = ids.get(&catalog_key(&item.name)) else {
                    continue;
                };
                let quantity = item.quantity.trim();
                links.push(DietMealFood {
                    meal_id: meal.id,
                    food_id: *food_id,
                    quantity_grams: parse_quantity_to_grams(quantity),
                    notes: (!quantity.is_empty()).then(|| quantity.to_string()),
                });
            }
        }

        if let Err(e) = self.store.insert_meal_foods(&links).await {
            warn!(error = %e, "could not link meal foods");
            return Vec::new();
        }
        links
    }

    /// Stores a copy of the plan rescaled to `calories` as the new active plan.
    pub async fn adjust_calories(&self, plan_id: Uuid, calories: f64) -> GenResult<DietOutcome> {
        let existing = self
            .store
            .get_diet_plan(plan_id)
            .await?
            .ok_or_else(|| GenError::NotFound(format!("diet plan {plan_id}")))?;

        let rescaled = nutrition::rescale(&existing.meals, existing.target_calories, calories)?;
        info!(%plan_id, from = existing.target_calories, to = calories, "adjusting plan calories");
        self.persist_diet(DietDraft {
            user_id: existing.user_id,
            name: existing.name,
            description: existing.description,
            goal: existing.goal,
            target_calories: rescaled.total_calories,
            meals_per_day: existing.meals_per_day,
            restrictions: existing.restrictions,
            meals: rescaled.meals,
        })
        .await
    }

    /// Generates a fresh plan from a stored one's settings merged with `changes`.
    pub async fn regenerate_diet(&self, plan_id: Uuid, changes: DietModifications) -> GenResult<DietOutcome> {
        let existing = self
            .store
            .get_diet_plan(plan_id)
            .await?
            .ok_or_else(|| GenError::NotFound(format!("diet plan {plan_id}")))?;

        let req = DietRequest {
            user_id: existing.user_id,
            goal: changes.goal.unwrap_or(existing.goal),
            calories: changes.calories.unwrap_or(existing.target_calories.round() as u32),
            restrictions: changes.restrictions.unwrap_or(existing.restrictions),
            meals_per_day: changes.meals_per_day.or(Some(existing.meals_per_day)),
            target_protein: changes.target_protein,
            preferred_foods: changes.preferred_foods,
            avoid_foods: changes.avoid_foods,
            preferences: changes.preferences,
            profile: changes.profile,
        };
        self.generate_diet(&req).await
    }

    // Recipe & recommendations

    pub async fn generate_recipe(&self, req: &RecipeRequest) -> GenResult<RecipeOutcome> {
        let mut req = req.clone();
        req.profile = self.resolve_profile(&req.user_id, req.profile.take()).await;
        let request = GenerationRequest::Recipe(req);
        request.validate()?;

        let mut attempt = Attempt::new(&request);
        let result = match self.generate(&mut attempt).await {
            Ok(Generated { plan: ParsedPlan::Recipe(recipe), repair }) => Ok(RecipeOutcome { recipe, repair }),
            Ok(_) => Err(GenError::shape("$")),
            Err(e) => Err(e),
        };
        self.record(&attempt, &result, |_| (None, None)).await;
        result
    }

    pub async fn generate_recommendations(
        &self,
        req: &RecommendationRequest,
    ) -> GenResult<Vec<StoredRecommendation>> {
        let mut req = req.clone();
        req.profile = self.resolve_profile(&req.user_id, req.profile.take()).await;
        let request = GenerationRequest::Recommendation(req.clone());
        request.validate()?;

        let mut attempt = Attempt::new(&request);
        let result = self.recommendations_from_provider(&req, &mut attempt).await;
        self.record(&attempt, &result, |_| (None, None)).await;
        result
    }

    async fn recommendations_from_provider(
        &self,
        req: &RecommendationRequest,
        attempt: &mut Attempt,
    ) -> GenResult<Vec<StoredRecommendation>> {
        let generated = self.generate(attempt).await?;
        let ParsedPlan::Recommendations(set) = generated.plan else {
            return Err(GenError::shape("$"));
        };

        let now = Utc::now();
        let stored: Vec<StoredRecommendation> = set
            .recommendations
            .into_iter()
            .map(|mut recommendation| {
                if !recommendation.metadata.is_object() {
                    recommendation.metadata = json!({});
                }
                StoredRecommendation {
                    id: Uuid::new_v4(),
                    user_id: req.user_id.clone(),
                    recommendation,
                    created_at: now,
                }
            })
            .collect();
        self.store.save_recommendations(&stored).await?;
        info!(user_id = %req.user_id, count = stored.len(), "recommendations stored");
        Ok(stored)
    }

    // Composite operations

    /// Workout and diet run concurrently; both must succeed. Initial
    /// recommendations are best effort.
    pub async fn generate_complete_profile(
        &self,
        workout: &WorkoutRequest,
        diet: &DietRequest,
    ) -> GenResult<CompleteProfile> {
        if workout.user_id != diet.user_id {
            return Err(GenError::InvalidRequest(format!(
                "workout user {} and diet user {} differ",
                workout.user_id, diet.user_id
            )));
        }

        let (w, d) = tokio::join!(self.generate_workout(workout), self.generate_diet(diet));
        if w.is_err() || d.is_err() {
            error!(
                user_id = %workout.user_id,
                workout = ?w.as_ref().err(),
                diet = ?d.as_ref().err(),
                "complete profile generation failed"
            );
        }
        let (workout_out, diet_out) = (w?, d?);

        let initial = RecommendationRequest {
            user_id: workout.user_id.clone(),
            progress: ProgressData { completed_workouts: 0, adherence_rate: 100.0, ..Default::default() },
            context: Some(format!(
                "New member starting a {} routine and a {} diet",
                label(&workout.goal),
                label(&diet.goal)
            )),
            profile: workout.profile.clone().or_else(|| diet.profile.clone()),
        };
        let recommendations = match self.generate_recommendations(&initial).await {
            Ok(r) => r,
            Err(e) => {
                warn!(user_id = %workout.user_id, error = %e, "initial recommendations skipped");
                Vec::new()
            }
        };

        Ok(CompleteProfile { workout: workout_out, diet: diet_out, recommendations })
    }

    /// Progress-driven recommendations plus rule-based insights. The insights
    /// are reported even when the provider call fails.
    pub async fn update_progress(&self, user_id: &str, progress: ProgressData) -> GenResult<ProgressUpdate> {
        let insights = insights::analyze(&progress);
        let req = RecommendationRequest {
            user_id: user_id.to_string(),
            progress,
            context: Some(PROGRESS_CONTEXT.to_string()),
            profile: None,
        };
        let recommendations = match self.generate_recommendations(&req).await {
            Ok(r) => r,
            Err(e @ GenError::InvalidRequest(_)) => return Err(e),
            Err(e) => {
                warn!(%user_id, error = %e, "progress recommendations skipped");
                Vec::new()
            }
        };
        Ok(ProgressUpdate { recommendations, insights })
    }

    pub async fn usage(&self, user_id: &str) -> GenResult<UsageReport> {
        self.quota.usage(user_id).await
    }
}

/// (day, order, exercise) for every exercise. Flat plans go on day 1.
fn place_exercises(layout: &WorkoutLayout) -> Vec<(u8, u32, &Exercise)> {
    match layout {
        WorkoutLayout::Flat(exercises) => exercises
            .iter()
            .enumerate()
            .map(|(i, ex)| (1, i as u32 + 1, ex))
            .collect(),
        WorkoutLayout::Days(days) => days
            .iter()
            .flat_map(|day| {
                let dow = day.day_number.clamp(1, 7) as u8;
                day.exercises
                    .iter()
                    .enumerate()
                    .map(move |(i, ex)| (dow, i as u32 + 1, ex))
            })
            .collect(),
    }
}

fn describe(meal: &Meal) -> String {
    meal.items
        .iter()
        .map(|i| {
            let q = i.quantity.trim();
            if q.is_empty() {
                i.name.trim().to_string()
            } else {
                format!("{} ({q})", i.name.trim())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn diet_meal(plan_id: Uuid, s: &ScheduledMeal) -> DietMeal {
    DietMeal {
        id: Uuid::new_v4(),
        diet_plan_id: plan_id,
        meal_type: s.meal_type,
        day_of_week: s.day_of_week,
        name: s.meal.name.clone(),
        description: describe(&s.meal),
        instructions: s
            .meal
            .instructions
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
        prep_time_minutes: s.meal.prep_time.unwrap_or(DEFAULT_PREP_MINUTES),
        order_in_day: s.order_in_day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{FoodItem, MacroNutrients, MealType, WorkoutDay};

    fn exercise(name: &str) -> Exercise {
        serde_json::from_value(json!({ "name": name, "reps": "8-12" })).unwrap()
    }

    #[test]
    fn flat_exercises_go_on_day_one() {
        let layout = WorkoutLayout::Flat(vec![exercise("Squat"), exercise("Row")]);
        let placed: Vec<(u8, u32, String)> =
            place_exercises(&layout).into_iter().map(|(d, o, e)| (d, o, e.name.clone())).collect();
        assert_eq!(placed, vec![(1, 1, "Squat".into()), (1, 2, "Row".into())]);
    }

    #[test]
    fn grouped_exercises_use_day_number() {
        let day = |n: u32, names: &[&str]| WorkoutDay {
            day_number: n,
            day_name: format!("Day {n}"),
            exercises: names.iter().map(|n| exercise(n)).collect(),
            focus_area: None,
        };
        let layout = WorkoutLayout::Days(vec![day(1, &["Squat"]), day(3, &["Bench", "Row"]), day(0, &["Plank"])]);
        let placed: Vec<(u8, u32)> = place_exercises(&layout).into_iter().map(|(d, o, _)| (d, o)).collect();
        assert_eq!(placed, vec![(1, 1), (3, 1), (3, 2), (1, 1)]);
    }

    #[test]
    fn meal_record_defaults() {
        let meal = Meal {
            name: "Breakfast - Oats".into(),
            items: vec![
                FoodItem {
                    name: "Oats".into(),
                    quantity: "1/2 cup".into(),
                    calories: 150.0,
                    protein: None,
                    carbs: None,
                    fat: None,
                    fiber: None,
                },
                FoodItem {
                    name: "Honey ".into(),
                    quantity: "".into(),
                    calories: 60.0,
                    protein: None,
                    carbs: None,
                    fat: None,
                    fiber: None,
                },
            ],
            total_calories: 210.0,
            macros: MacroNutrients::default(),
            instructions: Some("  ".into()),
            prep_time: None,
        };
        let s = ScheduledMeal { meal, day_of_week: 2, order_in_day: 1, meal_type: MealType::Breakfast };
        let record = diet_meal(Uuid::nil(), &s);
        assert_eq!(record.description, "Oats (1/2 cup), Honey");
        assert_eq!(record.instructions, DEFAULT_INSTRUCTIONS);
        assert_eq!(record.prep_time_minutes, DEFAULT_PREP_MINUTES);
        assert_eq!(record.day_of_week, 2);
        assert_eq!(record.meal_type, MealType::Breakfast);
    }
}
