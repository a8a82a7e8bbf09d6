use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{GenError, GenResult};
use crate::wire::{
    DietPlan, Exercise, GenerationKind, Meal, ParsedPlan, Recipe, Recommendation,
    RecommendationSet, WorkoutDay, WorkoutLayout, WorkoutPlan,
};

/// Checks a normalized object against the accepted shapes for `kind` and
/// converts it into the typed plan.
///
/// Errors name the first missing or invalid field, e.g. `meals[3].macros`.
pub fn validate(kind: GenerationKind, value: &Value) -> GenResult<ParsedPlan> {
    let obj = value.as_object().ok_or_else(|| GenError::shape("$"))?;
    match kind {
        GenerationKind::Workout => validate_workout(obj).map(ParsedPlan::Workout),
        GenerationKind::Diet => validate_diet(obj).map(ParsedPlan::Diet),
        GenerationKind::Recipe => validate_recipe(obj).map(ParsedPlan::Recipe),
        GenerationKind::Recommendation => {
            validate_recommendations(obj).map(ParsedPlan::Recommendations)
        }
    }
}

fn require_text(obj: &Map<String, Value>, field: &str, path: &str) -> GenResult<String> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(GenError::shape(join(path, field))),
    }
}

/// Present and a string, possibly empty.
fn require_string(obj: &Map<String, Value>, field: &str, path: &str) -> GenResult<String> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(GenError::shape(join(path, field))),
    }
}

fn non_empty_list<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Vec<Value>> {
    obj.get(field).and_then(Value::as_array).filter(|l| !l.is_empty())
}

fn require_list<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
    path: &str,
) -> GenResult<&'a Vec<Value>> {
    non_empty_list(obj, field).ok_or_else(|| GenError::shape(join(path, field)))
}

fn require_keys(obj: &Map<String, Value>, keys: &[&str], path: &str) -> GenResult<()> {
    for key in keys {
        match obj.get(*key) {
            None | Some(Value::Null) => return Err(GenError::shape(join(path, key))),
            Some(_) => {}
        }
    }
    Ok(())
}

fn element<'a>(v: &'a Value, path: &str) -> GenResult<&'a Map<String, Value>> {
    v.as_object().ok_or_else(|| GenError::shape(path))
}

fn decode<T: DeserializeOwned>(v: &Value, path: &str) -> GenResult<T> {
    serde_json::from_value(v.clone()).map_err(|e| {
        debug!(path, error = %e, "element did not decode");
        GenError::shape(path)
    })
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

fn exercises_at(list: &[Value], path: &str) -> GenResult<Vec<Exercise>> {
    list.iter()
        .enumerate()
        .map(|(i, v)| {
            let p = format!("{path}[{i}]");
            require_text(element(v, &p)?, "name", &p)?;
            decode(v, &p)
        })
        .collect()
}

fn validate_workout(obj: &Map<String, Value>) -> GenResult<WorkoutPlan> {
    let name = require_text(obj, "name", "")?;
    let description = require_string(obj, "description", "")?;

    // Day groups win when the provider sent both layouts.
    let layout = if let Some(days) = non_empty_list(obj, "days") {
        if obj.contains_key("exercises") {
            debug!("workout carried both layouts, ignoring flat exercise list");
        }
        let mut out = Vec::with_capacity(days.len());
        for (i, d) in days.iter().enumerate() {
            let p = format!("days[{i}]");
            let day = element(d, &p)?;
            require_keys(day, &["dayNumber", "dayName"], &p)?;
            let list = day
                .get("exercises")
                .and_then(Value::as_array)
                .ok_or_else(|| GenError::shape(join(&p, "exercises")))?;
            let exercises = exercises_at(list, &join(&p, "exercises"))?;
            let mut parsed: WorkoutDay = decode(d, &p)?;
            parsed.exercises = exercises;
            out.push(parsed);
        }
        WorkoutLayout::Days(out)
    } else {
        let list = require_list(obj, "exercises", "")?;
        WorkoutLayout::Flat(exercises_at(list, "exercises")?)
    };

    Ok(WorkoutPlan { name, description, layout })
}

fn validate_diet(obj: &Map<String, Value>) -> GenResult<DietPlan> {
    let name = require_text(obj, "name", "")?;
    let description = require_string(obj, "description", "")?;
    let list = require_list(obj, "meals", "")?;

    let mut meals = Vec::with_capacity(list.len());
    for (i, m) in list.iter().enumerate() {
        let p = format!("meals[{i}]");
        let meal = element(m, &p)?;
        require_text(meal, "name", &p)?;
        if !meal.get("items").map(Value::is_array).unwrap_or(false) {
            return Err(GenError::shape(join(&p, "items")));
        }
        require_keys(meal, &["totalCalories"], &p)?;
        if !meal.get("macros").map(Value::is_object).unwrap_or(false) {
            return Err(GenError::shape(join(&p, "macros")));
        }
        let mut parsed: Meal = decode(m, &p)?;
        parsed.macros = parsed.macros.clamped();
        parsed.total_calories = parsed.total_calories.max(0.0);
        for item in &mut parsed.items {
            item.calories = item.calories.max(0.0);
            for f in [&mut item.protein, &mut item.carbs, &mut item.fat, &mut item.fiber] {
                *f = f.map(|x| x.max(0.0));
            }
        }
        meals.push(parsed);
    }

    Ok(DietPlan { name, description, meals })
}

fn validate_recipe(obj: &Map<String, Value>) -> GenResult<Recipe> {
    require_text(obj, "name", "")?;
    require_string(obj, "description", "")?;
    let ingredients = require_list(obj, "ingredients", "")?;
    for (i, ing) in ingredients.iter().enumerate() {
        let p = format!("ingredients[{i}]");
        require_text(element(ing, &p)?, "name", &p)?;
    }
    require_list(obj, "steps", "")?;
    require_text(obj, "category", "")?;
    decode(&Value::Object(obj.clone()), "$")
}

fn validate_recommendations(obj: &Map<String, Value>) -> GenResult<RecommendationSet> {
    const KEYS: [&str; 6] = ["type", "title", "description", "priority", "category", "actionable"];
    let list = require_list(obj, "recommendations", "")?;
    let mut recommendations = Vec::with_capacity(list.len());
    for (i, r) in list.iter().enumerate() {
        let p = format!("recommendations[{i}]");
        require_keys(element(r, &p)?, &KEYS, &p)?;
        let rec: Recommendation = decode(r, &p)?;
        recommendations.push(rec);
    }
    Ok(RecommendationSet { recommendations })
}
