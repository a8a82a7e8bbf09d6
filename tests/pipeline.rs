use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use levelup_ai::config::{Config, GenerationBudget};
use levelup_ai::errors::{GenError, GenResult};
use levelup_ai::insights::{Consistency, Trend};
use levelup_ai::pipeline::{DietModifications, Pipeline, WorkoutModifications, PROGRESS_CONTEXT};
use levelup_ai::provider::Provider;
use levelup_ai::repair::Outcome;
use levelup_ai::store::{
    AuditEntry, DietMeal, DietMealFood, DietPlanRecord, DynStore, IncrementOutcome, MemoryStore,
    NewExercise, NewFood, QuotaWindow, Routine, RoutineExercise, Store, StoredRecommendation,
    UsageCounts,
};
use levelup_ai::wire::{
    DietGoal, DietRequest, Difficulty, GenerationKind, MealType, ProgressData, QuotaCategory,
    RecipeRequest, UserProfile, WorkoutGoal, WorkoutLayout, WorkoutRequest,
};
use uuid::Uuid;

/// Replies from per-kind queues, picked by the role line each prompt opens with.
#[derive(Default)]
struct ScriptedProvider {
    replies: Mutex<HashMap<GenerationKind, VecDeque<GenResult<String>>>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    fn push(&self, kind: GenerationKind, reply: impl Into<String>) {
        self.replies.lock().entry(kind).or_default().push_back(Ok(reply.into()));
    }

    fn push_err(&self, kind: GenerationKind, err: GenError) {
        self.replies.lock().entry(kind).or_default().push_back(Err(err));
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn kind_of(prompt: &str) -> GenerationKind {
    if prompt.starts_with("You are a certified personal trainer") {
        GenerationKind::Workout
    } else if prompt.starts_with("You are a registered dietitian") {
        GenerationKind::Diet
    } else if prompt.starts_with("You are a chef") {
        GenerationKind::Recipe
    } else {
        GenerationKind::Recommendation
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn generate(&self, prompt: &str, _budget: &GenerationBudget) -> GenResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let kind = kind_of(prompt);
        self.replies
            .lock()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| panic!("no scripted reply for {kind}"))
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "test-model"
    }
}

struct Harness {
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryStore>,
    pipeline: Pipeline,
}

fn harness() -> Harness {
    harness_with(Config::default())
}

fn harness_with(config: Config) -> Harness {
    let provider = Arc::new(ScriptedProvider::default());
    let store = Arc::new(MemoryStore::new());
    let dyn_store: DynStore = store.clone();
    let pipeline = Pipeline::new(provider.clone(), dyn_store, config);
    Harness { provider, store, pipeline }
}

fn meal(name: &str, kcal: f64, protein_source: &str) -> Value {
    json!({
        "name": name,
        "items": [
            { "name": protein_source, "quantity": "150g", "calories": kcal * 0.6, "protein": 30, "carbs": 0, "fat": 4 },
            { "name": "Brown rice", "quantity": "1 cup", "calories": kcal * 0.4, "protein": 5, "carbs": 45, "fat": 2, "fiber": 3 }
        ],
        "totalCalories": kcal,
        "macros": { "protein": 35, "carbs": 45, "fat": 6, "fiber": 3 },
        "instructions": "Cook and serve",
        "prepTime": 20
    })
}

fn weekly_diet(per_day: usize, kcal: f64) -> String {
    let slots = ["Breakfast", "Lunch", "Snack", "Dinner"];
    let proteins = ["Chicken breast", "Salmon", "Tofu", "Eggs", "Turkey", "Tuna", "Lentils"];
    let meals: Vec<Value> = (0..7 * per_day)
        .map(|i| {
            let day = i / per_day;
            let slot = slots[i % per_day % slots.len()];
            meal(&format!("{slot} - day {}", day + 1), kcal, proteins[day])
        })
        .collect();
    json!({ "name": "Cut week", "description": "Seven varied days", "meals": meals }).to_string()
}

fn single_day_diet() -> String {
    json!({
        "name": "Simple day",
        "description": "One day repeated",
        "meals": [
            meal("Breakfast", 500.0, "Eggs"),
            meal("Lunch", 500.0, "Chicken breast"),
            meal("Snack", 500.0, "Greek yogurt"),
            meal("Dinner", 500.0, "Salmon"),
        ]
    })
    .to_string()
}

fn diet_request(user: &str, calories: u32, meals_per_day: Option<u8>) -> DietRequest {
    DietRequest {
        user_id: user.into(),
        goal: DietGoal::LoseWeight,
        calories,
        restrictions: vec![],
        meals_per_day,
        target_protein: None,
        preferred_foods: vec![],
        avoid_foods: vec![],
        preferences: None,
        profile: None,
    }
}

fn workout_request(user: &str) -> WorkoutRequest {
    WorkoutRequest {
        user_id: user.into(),
        goal: WorkoutGoal::GainMuscle,
        difficulty: Difficulty::Beginner,
        days_per_week: 3,
        duration_minutes: 45,
        equipment: vec![],
        target_muscles: vec![],
        preferences: None,
        profile: None,
    }
}

const FENCED_WORKOUT: &str = "Here is your plan:\n```json\n{\"name\":\"X\",\"description\":\"Y\",\"exercises\":[{\"name\":\"Push-ups\",\"sets\":3,\"reps\":\"10-15\",\"restTime\":\"60 seconds\"},{\"name\":\"Barbell row\",\"sets\":4,\"reps\":\"8\",\"restTime\":\"90 seconds\"}]}\n```\nEnjoy!";

const RECOMMENDATIONS: &str = r#"{"recommendations":[
  {"type":"workout","title":"Add a rest day","description":"Recover between sessions","priority":"high","category":"recovery","actionable":true},
  {"type":"nutrition","title":"More protein","description":"Aim for 1.6 g/kg","priority":"medium","category":"diet","actionable":"true","metadata":{"grams":110}}
]}"#;

#[tokio::test]
async fn weekly_response_becomes_twenty_eight_meals() {
    let h = harness();
    h.provider.push(GenerationKind::Diet, weekly_diet(4, 550.0));

    let out = h.pipeline.generate_diet(&diet_request("u1", 2200, Some(4))).await.unwrap();

    assert_eq!(out.meals.len(), 28);
    for day in 1..=7u8 {
        let orders: Vec<u8> = out.meals.iter().filter(|m| m.day_of_week == day).map(|m| m.order_in_day).collect();
        assert_eq!(orders, vec![1, 2, 3, 4], "day {day}");
    }
    let day3: Vec<&str> = out.meals.iter().filter(|m| m.day_of_week == 3).map(|m| m.name.as_str()).collect();
    assert!(day3.iter().all(|n| n.ends_with("day 3")));
    assert_eq!(out.meals[0].meal_type, MealType::Breakfast);
    assert_eq!(out.meals[3].meal_type, MealType::Dinner);
    assert_eq!(out.meals[0].description, "Chicken breast (150g), Brown rice (1 cup)");

    // two items per meal; each distinct food created once
    assert_eq!(out.foods.len(), 56);
    assert_eq!(h.store.foods().len(), 8);
    let rice = out.foods.iter().find(|f| f.notes.as_deref() == Some("1 cup")).unwrap();
    assert_eq!(rice.quantity_grams, 240.0);

    assert_eq!(out.plan.target_calories, 2200.0);
    assert_eq!(out.plan.target_protein, 35.0 * 28.0);
    assert_eq!(out.repair, Some(Outcome::Strict));
    assert_eq!(h.store.diet_plans("u1").len(), 1);
}

#[tokio::test]
async fn single_day_response_is_repeated_all_week() {
    let h = harness();
    h.provider.push(GenerationKind::Diet, single_day_diet());

    let out = h.pipeline.generate_diet(&diet_request("u1", 2000, None)).await.unwrap();

    assert_eq!(out.meals.len(), 28);
    let mondays: Vec<&str> = out.meals.iter().filter(|m| m.day_of_week == 1).map(|m| m.name.as_str()).collect();
    let sundays: Vec<&str> = out.meals.iter().filter(|m| m.day_of_week == 7).map(|m| m.name.as_str()).collect();
    assert_eq!(mondays, sundays);
    assert_eq!(mondays, vec!["Breakfast", "Lunch", "Snack", "Dinner"]);
}

#[tokio::test]
async fn fenced_workout_with_prose_is_used_unchanged() {
    let h = harness();
    h.provider.push(GenerationKind::Workout, FENCED_WORKOUT);

    let out = h.pipeline.generate_workout(&workout_request("u1")).await.unwrap();

    assert_eq!(out.repair, Outcome::Strict);
    assert_eq!(out.plan.name, "X");
    assert_eq!(out.plan.description, "Y");
    assert!(matches!(out.plan.layout, WorkoutLayout::Flat(ref ex) if ex.len() == 2));

    assert_eq!(out.links.len(), 2);
    let row = &out.links[1];
    assert_eq!((row.day_of_week, row.order_in_day), (1, 2));
    assert_eq!((row.sets, row.reps_min, row.reps_max, row.rest_seconds), (4, 8, 8, 90));
    assert_eq!(h.store.exercise_count(), 2);

    let audit = h.store.audit_entries("u1").await.unwrap();
    assert_eq!(audit.len(), 1);
    assert!(audit[0].success);
    assert_eq!(audit[0].routine_id, Some(out.routine.id));
    assert_eq!(audit[0].model, "test-model");
    assert_eq!(audit[0].response["name"], "X");
}

#[tokio::test]
async fn new_routine_archives_the_previous_one() {
    let h = harness();
    h.provider.push(GenerationKind::Workout, FENCED_WORKOUT);
    h.provider.push(GenerationKind::Workout, FENCED_WORKOUT);

    let first = h.pipeline.generate_workout(&workout_request("u1")).await.unwrap();
    let second = h.pipeline.generate_workout(&workout_request("u1")).await.unwrap();

    let routines = h.store.routines("u1");
    assert_eq!(routines.len(), 2);
    let active: Vec<_> = routines.iter().filter(|r| r.is_active).map(|r| r.id).collect();
    assert_eq!(active, vec![second.routine.id]);
    assert_ne!(first.routine.id, second.routine.id);
    // same names resolve to the same catalog entries
    assert_eq!(h.store.exercise_count(), 2);
}

#[tokio::test]
async fn garbage_workout_falls_back() {
    let h = harness();
    h.provider.push(GenerationKind::Workout, "Sorry, I can't help with that right now.");

    let out = h.pipeline.generate_workout(&workout_request("u1")).await.unwrap();

    assert!(matches!(out.repair, Outcome::Fallback(_)));
    assert_eq!(out.plan.name, "Basic Workout Plan");
    assert_eq!(out.links.len(), 1);
    assert_eq!(out.links[0].rest_seconds, 120);
}

#[tokio::test]
async fn repaired_workout_reports_stage() {
    let h = harness();
    h.provider.push(
        GenerationKind::Workout,
        "{name: \"Home\", description: \"No gear\", exercises: [{name: \"Plank\", sets: 3, reps: \"30\",},],}",
    );

    let out = h.pipeline.generate_workout(&workout_request("u1")).await.unwrap();

    assert!(matches!(out.repair, Outcome::Repaired(_)));
    assert_eq!(out.plan.name, "Home");
}

#[tokio::test]
async fn garbage_diet_is_malformed_and_audited() {
    let h = harness();
    h.provider.push(GenerationKind::Diet, "I'm unable to produce a meal plan.");

    let err = h.pipeline.generate_diet(&diet_request("u1", 2000, Some(4))).await.unwrap_err();

    assert!(matches!(err, GenError::MalformedResponse(_)));
    assert!(h.store.diet_plans("u1").is_empty());
    let audit = h.store.audit_entries("u1").await.unwrap();
    assert_eq!(audit.len(), 1);
    assert!(!audit[0].success);
    assert_eq!(audit[0].kind, GenerationKind::Diet);
    assert!(audit[0].error.is_some());
    assert_eq!(audit[0].response["raw"], "I'm unable to produce a meal plan.");
}

#[tokio::test]
async fn diet_missing_macros_is_shape_mismatch() {
    let h = harness();
    h.provider.push(
        GenerationKind::Diet,
        r#"{"name":"N","description":"D","meals":[{"name":"Lunch","items":[],"totalCalories":500}]}"#,
    );

    let err = h.pipeline.generate_diet(&diet_request("u1", 2000, Some(4))).await.unwrap_err();

    assert!(matches!(err, GenError::ShapeMismatch { ref field } if field == "meals[0].macros"));
}

#[tokio::test]
async fn provider_errors_pass_through() {
    let h = harness();
    h.provider.push_err(GenerationKind::Workout, GenError::RateLimited("429".into()));

    let err = h.pipeline.generate_workout(&workout_request("u1")).await.unwrap_err();

    assert!(err.is_transient());
    assert!(h.store.routines("u1").is_empty());
}

#[tokio::test]
async fn quota_gate_stops_before_the_provider() {
    let h = harness();
    for _ in 0..3 {
        h.provider.push(GenerationKind::Workout, FENCED_WORKOUT);
    }
    for _ in 0..3 {
        h.pipeline.generate_workout(&workout_request("u1")).await.unwrap();
    }
    assert_eq!(h.provider.calls(), 3);

    let err = h.pipeline.generate_workout(&workout_request("u1")).await.unwrap_err();

    assert!(matches!(err, GenError::QuotaExceeded { limit: 3, .. }));
    assert_eq!(h.provider.calls(), 3);
    let usage = h.pipeline.usage("u1").await.unwrap();
    assert_eq!((usage.workouts_used, usage.workouts_limit), (3, 3));
    assert_eq!(usage.diets_used, 0);
}

#[tokio::test]
async fn invalid_request_never_reaches_quota() {
    let h = harness();
    let mut req = workout_request("u1");
    req.days_per_week = 9;

    let err = h.pipeline.generate_workout(&req).await.unwrap_err();

    assert!(matches!(err, GenError::InvalidRequest(_)));
    assert_eq!(h.pipeline.usage("u1").await.unwrap().workouts_used, 0);
}

#[tokio::test]
async fn adjust_calories_halves_a_stored_plan() {
    let h = harness();
    h.provider.push(GenerationKind::Diet, single_day_diet());
    let original = h.pipeline.generate_diet(&diet_request("u1", 2000, Some(4))).await.unwrap();

    let adjusted = h.pipeline.adjust_calories(original.plan.id, 1000.0).await.unwrap();

    assert_ne!(adjusted.plan.id, original.plan.id);
    assert_eq!(adjusted.plan.target_calories, 1000.0);
    assert_eq!(adjusted.repair, None);
    let first = &adjusted.plan.meals[0];
    assert_eq!(first.total_calories, 250.0);
    assert_eq!(first.items[0].calories, 150.0);
    assert_eq!(first.items[1].calories, 100.0);
    assert_eq!(first.items[0].protein, Some(15.0));
    // 35 * 0.5 rounds half away from zero
    assert_eq!(first.macros.protein, 18.0);
    assert_eq!(adjusted.plan.target_protein, 72.0);
    assert_eq!(adjusted.meals.len(), 28);

    let plans = h.store.diet_plans("u1");
    assert_eq!(plans.len(), 2);
    let stored = plans.iter().find(|p| p.id == original.plan.id).unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.meals[0].total_calories, 500.0);
    // no provider call, no quota
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test]
async fn adjust_calories_of_unknown_plan_is_not_found() {
    let h = harness();
    let err = h.pipeline.adjust_calories(Uuid::new_v4(), 1500.0).await.unwrap_err();
    assert!(matches!(err, GenError::NotFound(_)));
}

#[tokio::test]
async fn regenerate_keeps_stored_settings() {
    let h = harness();
    h.provider.push(GenerationKind::Diet, single_day_diet());
    h.provider.push(GenerationKind::Diet, weekly_diet(3, 600.0));
    let original = h.pipeline.generate_diet(&diet_request("u1", 2000, Some(4))).await.unwrap();

    let changes = DietModifications { calories: Some(1800), meals_per_day: Some(3), ..Default::default() };
    let out = h.pipeline.regenerate_diet(original.plan.id, changes).await.unwrap();

    assert_eq!(out.plan.target_calories, 1800.0);
    assert!(matches!(out.plan.goal, DietGoal::LoseWeight));
    assert_eq!(out.plan.meals_per_day, 3);
    assert_eq!(out.meals.len(), 21);
    assert_eq!(h.pipeline.usage("u1").await.unwrap().diets_used, 2);
}

#[tokio::test]
async fn recipe_uses_fallback_on_garbage() {
    let h = harness();
    h.provider.push(GenerationKind::Recipe, "");

    let out = h
        .pipeline
        .generate_recipe(&RecipeRequest { user_id: "u1".into(), meal_type: "cena".into(), profile: None })
        .await
        .unwrap();

    assert_eq!(out.recipe.name, "Simple Oatmeal");
    assert!(matches!(out.repair, Outcome::Fallback(_)));
}

#[tokio::test]
async fn complete_profile_runs_everything() {
    let h = harness();
    h.provider.push(GenerationKind::Workout, FENCED_WORKOUT);
    h.provider.push(GenerationKind::Diet, weekly_diet(4, 500.0));
    h.provider.push(GenerationKind::Recommendation, RECOMMENDATIONS);

    let out = h
        .pipeline
        .generate_complete_profile(&workout_request("u1"), &diet_request("u1", 2000, Some(4)))
        .await
        .unwrap();

    assert_eq!(out.workout.links.len(), 2);
    assert_eq!(out.diet.meals.len(), 28);
    assert_eq!(out.recommendations.len(), 2);
    assert_eq!(out.recommendations[0].recommendation.metadata, json!({}));
    assert!(out.recommendations[1].recommendation.actionable);
    assert_eq!(h.store.recommendations("u1").len(), 2);
    assert_eq!(h.store.audit_entries("u1").await.unwrap().len(), 3);
}

#[tokio::test]
async fn complete_profile_survives_failed_recommendations() {
    let h = harness();
    h.provider.push(GenerationKind::Workout, FENCED_WORKOUT);
    h.provider.push(GenerationKind::Diet, weekly_diet(4, 500.0));
    h.provider.push(GenerationKind::Recommendation, "no json here");

    let out = h
        .pipeline
        .generate_complete_profile(&workout_request("u1"), &diet_request("u1", 2000, Some(4)))
        .await
        .unwrap();

    assert!(out.recommendations.is_empty());
}

#[tokio::test]
async fn complete_profile_fails_when_a_half_fails() {
    let h = harness();
    h.provider.push(GenerationKind::Workout, FENCED_WORKOUT);
    h.provider.push(GenerationKind::Diet, "nope");

    let err = h
        .pipeline
        .generate_complete_profile(&workout_request("u1"), &diet_request("u1", 2000, Some(4)))
        .await
        .unwrap_err();

    assert!(matches!(err, GenError::MalformedResponse(_)));
}

#[tokio::test]
async fn complete_profile_rejects_mixed_users() {
    let h = harness();
    let err = h
        .pipeline
        .generate_complete_profile(&workout_request("u1"), &diet_request("u2", 2000, Some(4)))
        .await
        .unwrap_err();

    assert!(matches!(err, GenError::InvalidRequest(_)));
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn configured_meals_per_day_fills_unset_requests() {
    let h = harness_with(Config { default_meals_per_day: 3, ..Config::default() });
    h.provider.push(GenerationKind::Diet, weekly_diet(3, 600.0));

    let out = h.pipeline.generate_diet(&diet_request("u1", 1800, None)).await.unwrap();

    assert_eq!(out.meals.len(), 21);
    assert_eq!(out.plan.meals_per_day, 3);
    let audit = h.store.audit_entries("u1").await.unwrap();
    assert!(audit[0].prompt.contains("exactly 21 meals (3 meals x 7 days)"));
}

#[tokio::test]
async fn stored_profile_reaches_the_prompt() {
    let h = harness();
    h.provider.push(GenerationKind::Workout, FENCED_WORKOUT);
    let profile = UserProfile { age: 52, medical_conditions: vec!["bad knee".into()], ..Default::default() };
    h.pipeline.save_profile("u1", &profile).await.unwrap();

    h.pipeline.generate_workout(&workout_request("u1")).await.unwrap();

    let prompt = &h.store.audit_entries("u1").await.unwrap()[0].prompt;
    assert!(prompt.contains("- Age: 52"));
    assert!(prompt.contains("- Medical conditions: bad knee"));
}

#[tokio::test]
async fn request_profile_wins_over_stored_one() {
    let h = harness();
    h.provider.push(GenerationKind::Diet, single_day_diet());
    h.pipeline.save_profile("u1", &UserProfile { age: 52, ..Default::default() }).await.unwrap();
    let mut req = diet_request("u1", 2000, Some(4));
    req.profile = Some(UserProfile { age: 27, ..Default::default() });

    h.pipeline.generate_diet(&req).await.unwrap();

    let prompt = &h.store.audit_entries("u1").await.unwrap()[0].prompt;
    assert!(prompt.contains("- Age: 27"));
    assert!(!prompt.contains("- Age: 52"));
}

#[tokio::test]
async fn missing_profile_is_reported_as_not_provided() {
    let h = harness();
    h.provider.push(GenerationKind::Workout, FENCED_WORKOUT);

    h.pipeline.generate_workout(&workout_request("u1")).await.unwrap();

    let prompt = &h.store.audit_entries("u1").await.unwrap()[0].prompt;
    assert!(prompt.contains("User profile: not provided"));
}

#[tokio::test]
async fn regenerate_workout_keeps_stored_settings() {
    let h = harness();
    h.provider.push(GenerationKind::Workout, FENCED_WORKOUT);
    h.provider.push(GenerationKind::Workout, FENCED_WORKOUT);
    let mut req = workout_request("u1");
    req.equipment = vec!["kettlebell".into()];
    let original = h.pipeline.generate_workout(&req).await.unwrap();

    let changes = WorkoutModifications { days_per_week: Some(5), ..Default::default() };
    let out = h.pipeline.regenerate_workout(original.routine.id, changes).await.unwrap();

    assert_ne!(out.routine.id, original.routine.id);
    assert_eq!(out.routine.days_per_week, 5);
    assert_eq!(out.routine.duration_minutes, 45);
    assert_eq!(out.routine.goal, WorkoutGoal::GainMuscle);
    assert_eq!(out.routine.difficulty_level, Difficulty::Beginner);
    // equipment is not carried over from the stored routine
    let prompt = &h.store.audit_entries("u1").await.unwrap()[1].prompt;
    assert!(prompt.contains("- Available equipment: bodyweight only"));

    let active: Vec<_> = h.store.routines("u1").into_iter().filter(|r| r.is_active).map(|r| r.id).collect();
    assert_eq!(active, vec![out.routine.id]);
    assert_eq!(h.pipeline.usage("u1").await.unwrap().workouts_used, 2);
}

#[tokio::test]
async fn regenerate_unknown_routine_is_not_found() {
    let h = harness();
    let err = h
        .pipeline
        .regenerate_workout(Uuid::new_v4(), WorkoutModifications::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenError::NotFound(_)));
    assert_eq!(h.provider.calls(), 0);
}

#[tokio::test]
async fn progress_update_stores_recommendations_and_insights() {
    let h = harness();
    h.provider.push(GenerationKind::Recommendation, RECOMMENDATIONS);
    let progress = ProgressData { completed_workouts: 22, adherence_rate: 90.0, ..Default::default() };

    let out = h.pipeline.update_progress("u1", progress).await.unwrap();

    assert_eq!(out.recommendations.len(), 2);
    assert_eq!(out.insights.consistency, Consistency::Excellent);
    assert_eq!(out.insights.trend, Trend::ModerateProgress);
    assert_eq!(out.insights.next_milestone, "Reach 25 total workouts");
    let prompt = &h.store.audit_entries("u1").await.unwrap()[0].prompt;
    assert!(prompt.contains(PROGRESS_CONTEXT));
}

#[tokio::test]
async fn progress_insights_survive_a_failed_provider() {
    let h = harness();
    h.provider.push_err(GenerationKind::Recommendation, GenError::ProviderUnavailable("down".into()));
    let progress = ProgressData { completed_workouts: 3, adherence_rate: 60.0, ..Default::default() };

    let out = h.pipeline.update_progress("u1", progress).await.unwrap();

    assert!(out.recommendations.is_empty());
    assert_eq!(out.insights.consistency, Consistency::NeedsImprovement);
    assert_eq!(out.insights.suggestions.len(), 3);
}

#[tokio::test]
async fn progress_update_rejects_bad_adherence() {
    let h = harness();
    let progress = ProgressData { completed_workouts: 3, adherence_rate: 140.0, ..Default::default() };
    let err = h.pipeline.update_progress("u1", progress).await.unwrap_err();
    assert!(matches!(err, GenError::InvalidRequest(_)));
}

/// Delegates to a memory store but refuses to activate diet plans.
struct RefusesActivation {
    inner: MemoryStore,
}

#[async_trait]
impl Store for RefusesActivation {
    async fn activate_routine(&self, routine: &Routine) -> GenResult<usize> {
        self.inner.activate_routine(routine).await
    }
    async fn get_routine(&self, id: Uuid) -> GenResult<Option<Routine>> {
        self.inner.get_routine(id).await
    }
    async fn insert_routine_exercises(&self, links: &[RoutineExercise]) -> GenResult<()> {
        self.inner.insert_routine_exercises(links).await
    }
    async fn routine_exercises(&self, routine_id: Uuid) -> GenResult<Vec<RoutineExercise>> {
        self.inner.routine_exercises(routine_id).await
    }
    async fn activate_diet_plan(&self, _plan: &DietPlanRecord) -> GenResult<usize> {
        Err(GenError::Store("disk full".into()))
    }
    async fn get_diet_plan(&self, id: Uuid) -> GenResult<Option<DietPlanRecord>> {
        self.inner.get_diet_plan(id).await
    }
    async fn insert_diet_meals(&self, meals: &[DietMeal]) -> GenResult<()> {
        self.inner.insert_diet_meals(meals).await
    }
    async fn insert_meal_foods(&self, foods: &[DietMealFood]) -> GenResult<()> {
        self.inner.insert_meal_foods(foods).await
    }
    async fn diet_meals(&self, plan_id: Uuid) -> GenResult<Vec<DietMeal>> {
        self.inner.diet_meals(plan_id).await
    }
    async fn upsert_exercise(&self, exercise: &NewExercise) -> GenResult<Uuid> {
        self.inner.upsert_exercise(exercise).await
    }
    async fn upsert_food(&self, food: &NewFood) -> GenResult<Uuid> {
        self.inner.upsert_food(food).await
    }
    async fn any_exercise_id(&self) -> GenResult<Option<Uuid>> {
        self.inner.any_exercise_id().await
    }
    async fn active_plan(&self, user_id: &str) -> GenResult<Option<String>> {
        self.inner.active_plan(user_id).await
    }
    async fn set_active_plan(&self, user_id: &str, plan: &str) -> GenResult<()> {
        self.inner.set_active_plan(user_id, plan).await
    }
    async fn increment_usage(
        &self,
        user_id: &str,
        window: QuotaWindow,
        category: QuotaCategory,
        limit: i64,
    ) -> GenResult<IncrementOutcome> {
        self.inner.increment_usage(user_id, window, category, limit).await
    }
    async fn read_usage(&self, user_id: &str, window: QuotaWindow) -> GenResult<UsageCounts> {
        self.inner.read_usage(user_id, window).await
    }
    async fn user_profile(&self, user_id: &str) -> GenResult<Option<UserProfile>> {
        self.inner.user_profile(user_id).await
    }
    async fn save_user_profile(&self, user_id: &str, profile: &UserProfile) -> GenResult<()> {
        self.inner.save_user_profile(user_id, profile).await
    }
    async fn save_recommendations(&self, recs: &[StoredRecommendation]) -> GenResult<()> {
        self.inner.save_recommendations(recs).await
    }
    async fn append_audit(&self, entry: &AuditEntry) -> GenResult<()> {
        self.inner.append_audit(entry).await
    }
    async fn audit_entries(&self, user_id: &str) -> GenResult<Vec<AuditEntry>> {
        self.inner.audit_entries(user_id).await
    }
}

#[tokio::test]
async fn failed_plan_activation_leaves_the_active_plan_alone() {
    let provider = Arc::new(ScriptedProvider::default());
    provider.push(GenerationKind::Diet, single_day_diet());
    let inner = MemoryStore::new();
    let existing = DietPlanRecord {
        id: Uuid::new_v4(),
        user_id: "u1".into(),
        name: "Current".into(),
        description: String::new(),
        goal: DietGoal::MaintainWeight,
        target_calories: 2000.0,
        target_protein: 120.0,
        target_carbs: 200.0,
        target_fat: 70.0,
        meals_per_day: 4,
        restrictions: vec![],
        meals: vec![],
        is_active: true,
        created_at: chrono::Utc::now(),
    };
    inner.activate_diet_plan(&existing).await.unwrap();
    let store = Arc::new(RefusesActivation { inner });
    let pipeline = Pipeline::new(provider.clone(), store.clone(), Config::default());

    let err = pipeline.generate_diet(&diet_request("u1", 2000, Some(4))).await.unwrap_err();

    assert!(matches!(err, GenError::Store(_)));
    let plans = store.inner.diet_plans("u1");
    assert_eq!(plans.len(), 1);
    assert!(plans[0].is_active);
    let audit = store.audit_entries("u1").await.unwrap();
    assert!(!audit[0].success);
    assert_eq!(audit[0].diet_plan_id, None);
}
