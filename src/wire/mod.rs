use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{GenError, GenResult};

/// ========================================
/// Requests
/// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Workout,
    Diet,
    Recipe,
    Recommendation,
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationKind::Workout => "workout",
            GenerationKind::Diet => "diet",
            GenerationKind::Recipe => "recipe",
            GenerationKind::Recommendation => "recommendation",
        };
        f.write_str(s)
    }
}

/// Counters tracked by the monthly quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaCategory {
    Workout,
    Diet,
}

impl fmt::Display for QuotaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuotaCategory::Workout => f.write_str("workout"),
            QuotaCategory::Diet => f.write_str("diet"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutGoal {
    LoseWeight,
    GainMuscle,
    ImproveEndurance,
    MaintainFitness,
    StrengthTraining,
    Flexibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietGoal {
    LoseWeight,
    GainWeight,
    MaintainWeight,
    BuildMuscle,
    ImproveHealth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    LightlyActive,
    ModeratelyActive,
    VeryActive,
    ExtremelyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Serialized name of a snake_case enum value, used when embedding it in prompt text.
pub fn label<T: Serialize>(v: &T) -> String {
    match serde_json::to_value(v) {
        Ok(Value::String(s)) => s,
        _ => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub age: u32,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub gender: Gender,
    pub activity_level: ActivityLevel,
    #[serde(default)]
    pub fitness_goals: Vec<String>,
    #[serde(default)]
    pub medical_conditions: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,
}

impl Default for UserProfile {
    /// Stand-in used for recipe generation when the user never filled a profile.
    fn default() -> Self {
        Self {
            age: 30,
            weight_kg: 70.0,
            height_cm: 170.0,
            gender: Gender::Other,
            activity_level: ActivityLevel::ModeratelyActive,
            fitness_goals: vec!["maintain_weight".into()],
            medical_conditions: vec![],
            dietary_restrictions: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutRequest {
    pub user_id: String,
    pub goal: WorkoutGoal,
    pub difficulty: Difficulty,
    pub days_per_week: u8,
    pub duration_minutes: u32,
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub target_muscles: Vec<String>,
    #[serde(default)]
    pub preferences: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DietRequest {
    pub user_id: String,
    pub goal: DietGoal,
    pub calories: u32,
    #[serde(default)]
    pub restrictions: Vec<String>,
    #[serde(default)]
    pub meals_per_day: Option<u8>,
    #[serde(default)]
    pub target_protein: Option<u32>,
    #[serde(default)]
    pub preferred_foods: Vec<String>,
    #[serde(default)]
    pub avoid_foods: Vec<String>,
    #[serde(default)]
    pub preferences: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

pub const DEFAULT_MEALS_PER_DAY: u8 = 4;

impl DietRequest {
    pub fn meals_per_day(&self) -> u8 {
        self.meals_per_day.unwrap_or(DEFAULT_MEALS_PER_DAY)
    }

    /// Number of meals the provider is asked for: one week's worth.
    pub fn weekly_meal_count(&self) -> usize {
        self.meals_per_day() as usize * 7
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeRequest {
    pub user_id: String,
    pub meal_type: String,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressData {
    pub completed_workouts: u32,
    pub adherence_rate: f64,
    #[serde(default)]
    pub weight_progress: Option<f64>,
    #[serde(default)]
    pub strength_progress: BTreeMap<String, f64>,
    #[serde(default)]
    pub endurance_progress: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub user_id: String,
    pub progress: ProgressData,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GenerationRequest {
    Workout(WorkoutRequest),
    Diet(DietRequest),
    Recipe(RecipeRequest),
    Recommendation(RecommendationRequest),
}

impl GenerationRequest {
    pub fn kind(&self) -> GenerationKind {
        match self {
            GenerationRequest::Workout(_) => GenerationKind::Workout,
            GenerationRequest::Diet(_) => GenerationKind::Diet,
            GenerationRequest::Recipe(_) => GenerationKind::Recipe,
            GenerationRequest::Recommendation(_) => GenerationKind::Recommendation,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            GenerationRequest::Workout(r) => &r.user_id,
            GenerationRequest::Diet(r) => &r.user_id,
            GenerationRequest::Recipe(r) => &r.user_id,
            GenerationRequest::Recommendation(r) => &r.user_id,
        }
    }

    /// Range checks the HTTP layer used to do before a request reached generation.
    pub fn validate(&self) -> GenResult<()> {
        if self.user_id().trim().is_empty() {
            return Err(GenError::InvalidRequest("user_id is empty".into()));
        }
        match self {
            GenerationRequest::Workout(r) => {
                check_range("days_per_week", r.days_per_week as f64, 1.0, 7.0)?;
                check_range("duration_minutes", r.duration_minutes as f64, 10.0, 180.0)
            }
            GenerationRequest::Diet(r) => {
                check_range("calories", r.calories as f64, 1000.0, 5000.0)?;
                if let Some(m) = r.meals_per_day {
                    check_range("meals_per_day", m as f64, 3.0, 6.0)?;
                }
                if let Some(p) = r.target_protein {
                    check_range("target_protein", p as f64, 50.0, 300.0)?;
                }
                Ok(())
            }
            GenerationRequest::Recipe(r) => {
                if r.meal_type.trim().is_empty() {
                    return Err(GenError::InvalidRequest("meal_type is empty".into()));
                }
                Ok(())
            }
            GenerationRequest::Recommendation(r) => {
                check_range("adherence_rate", r.progress.adherence_rate, 0.0, 100.0)
            }
        }
    }
}

fn check_range(field: &str, v: f64, min: f64, max: f64) -> GenResult<()> {
    if v < min || v > max {
        return Err(GenError::InvalidRequest(format!(
            "{field} must be between {min} and {max}, got {v}"
        )));
    }
    Ok(())
}

/// ========================================
/// Parsed provider output
/// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    #[serde(default = "default_sets", deserialize_with = "de_u32_or")]
    pub sets: u32,
    #[serde(default, deserialize_with = "de_text")]
    pub reps: String,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub rest_time: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub target_muscles: Vec<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub equipment: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub weight: Option<String>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub duration: Option<String>,
}

fn default_sets() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutDay {
    #[serde(deserialize_with = "de_u32_or")]
    pub day_number: u32,
    #[serde(deserialize_with = "de_text")]
    pub day_name: String,
    pub exercises: Vec<Exercise>,
    #[serde(default, deserialize_with = "de_opt_text")]
    pub focus_area: Option<String>,
}

/// A routine carries either a flat list or day groups, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkoutLayout {
    #[serde(rename = "exercises")]
    Flat(Vec<Exercise>),
    #[serde(rename = "days")]
    Days(Vec<WorkoutDay>),
}

impl WorkoutLayout {
    pub fn exercise_count(&self) -> usize {
        match self {
            WorkoutLayout::Flat(ex) => ex.len(),
            WorkoutLayout::Days(days) => days.iter().map(|d| d.exercises.len()).sum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPlan {
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub layout: WorkoutLayout,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MacroNutrients {
    #[serde(default, deserialize_with = "de_f64")]
    pub protein: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub fat: f64,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub fiber: Option<f64>,
}

impl MacroNutrients {
    /// Negative figures from the provider are clamped to zero.
    pub fn clamped(self) -> Self {
        Self {
            protein: self.protein.max(0.0),
            carbs: self.carbs.max(0.0),
            fat: self.fat.max(0.0),
            fiber: self.fiber.map(|f| f.max(0.0)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    #[serde(default, deserialize_with = "de_text")]
    pub quantity: String,
    #[serde(default, deserialize_with = "de_f64")]
    pub calories: f64,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub protein: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub carbs: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub fat: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_f64", skip_serializing_if = "Option::is_none")]
    pub fiber: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub name: String,
    pub items: Vec<FoodItem>,
    #[serde(deserialize_with = "de_f64")]
    pub total_calories: f64,
    pub macros: MacroNutrients,
    #[serde(default, deserialize_with = "de_opt_text", skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, deserialize_with = "de_opt_u32", skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DietPlan {
    pub name: String,
    pub description: String,
    pub meals: Vec<Meal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default, deserialize_with = "de_text")]
    pub quantity: String,
    #[serde(default, deserialize_with = "de_text")]
    pub unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutritionalInfo {
    #[serde(default, deserialize_with = "de_f64")]
    pub calories: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub protein: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub carbs: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub fat: f64,
    #[serde(default, deserialize_with = "de_f64")]
    pub fiber: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub name: String,
    pub description: String,
    pub category: String,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<String>,
    #[serde(default)]
    pub nutritional_info: NutritionalInfo,
    #[serde(default, deserialize_with = "de_u32_or")]
    pub prep_time: u32,
    #[serde(default = "default_servings", deserialize_with = "de_u32_or")]
    pub servings: u32,
}

fn default_servings() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub priority: String,
    pub category: String,
    #[serde(deserialize_with = "de_bool")]
    pub actionable: bool,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    pub recommendations: Vec<Recommendation>,
}

/// Validated provider output, one variant per request kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParsedPlan {
    Workout(WorkoutPlan),
    Diet(DietPlan),
    Recipe(Recipe),
    Recommendations(RecommendationSet),
}

impl ParsedPlan {
    pub fn kind(&self) -> GenerationKind {
        match self {
            ParsedPlan::Workout(_) => GenerationKind::Workout,
            ParsedPlan::Diet(_) => GenerationKind::Diet,
            ParsedPlan::Recipe(_) => GenerationKind::Recipe,
            ParsedPlan::Recommendations(_) => GenerationKind::Recommendation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&label(self))
    }
}

/// A meal after weekly expansion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledMeal {
    pub meal: Meal,
    pub day_of_week: u8,
    pub order_in_day: u8,
    pub meal_type: MealType,
}

/// ========================================
/// Lenient field decoding
/// ========================================
///
/// Providers routinely send `"sets": "3"`, `"reps": 12` or `"calories": "250 kcal"`.

fn leading_number(s: &str) -> Option<f64> {
    let t = s.trim();
    let end = t
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(t.len());
    t[..end].parse::<f64>().ok()
}

fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_number(s),
        _ => None,
    }
}

fn de_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(value_to_f64(&v).unwrap_or(0.0))
}

fn de_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(value_to_f64(&v))
}

fn de_u32_or<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(value_to_f64(&v).map(|n| n.max(0.0).round() as u32).unwrap_or(0))
}

fn de_opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(value_to_f64(&v).map(|n| n.max(0.0).round() as u32))
}

fn text_of(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn de_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(text_of(&v).unwrap_or_default())
}

fn de_opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(text_of(&v).filter(|s| !s.trim().is_empty()))
}

fn de_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let v = Value::deserialize(d)?;
    Ok(match v {
        Value::Bool(b) => b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Number(n) => n.as_f64().map(|x| x != 0.0).unwrap_or(false),
        _ => false,
    })
}
