use crate::wire::{
    label, DietRequest, GenerationRequest, RecipeRequest, RecommendationRequest, UserProfile,
    WorkoutRequest,
};

const JSON_ONLY: &str =
    "Respond with EXACTLY ONE JSON object. JSON only: no markdown, no code fences, no prose before or after.";

fn list_or(items: &[String], none: &str) -> String {
    if items.is_empty() {
        none.to_string()
    } else {
        items.join(", ")
    }
}

fn profile_block(profile: Option<&UserProfile>) -> String {
    let Some(p) = profile else {
        return "User profile: not provided".to_string();
    };
    format!(
        "User profile:
- Age: {age}
- Weight: {weight} kg
- Height: {height} cm
- Gender: {gender}
- Activity level: {activity}
- Fitness goals: {goals}
- Medical conditions: {conditions}
- Dietary restrictions: {restrictions}",
        age = p.age,
        weight = p.weight_kg,
        height = p.height_cm,
        gender = label(&p.gender),
        activity = label(&p.activity_level),
        goals = list_or(&p.fitness_goals, "none"),
        conditions = list_or(&p.medical_conditions, "none"),
        restrictions = list_or(&p.dietary_restrictions, "none"),
    )
}

pub fn workout_prompt(req: &WorkoutRequest) -> String {
    format!(
        r#"You are a certified personal trainer. Design a weekly workout routine.

Request:
- Goal: {goal}
- Difficulty: {difficulty}
- Days per week: {days}
- Session duration: {duration} minutes
- Available equipment: {equipment}
- Target muscles: {muscles}
- Preferences: {preferences}

{profile}

Return this exact JSON shape, with one entry in "days" per training day ({days} entries):
{{
  "name": string,
  "description": string,
  "days": [
    {{
      "dayNumber": number,
      "dayName": string,
      "focusArea": string,
      "exercises": [
        {{
          "name": string,
          "sets": number,
          "reps": string,
          "restTime": string,
          "instructions": string,
          "targetMuscles": [string],
          "equipment": string
        }}
      ]
    }}
  ]
}}

Rules:
- dayNumber runs from 1 to {days}.
- reps is a range such as "8-12" or a single count such as "15".
- restTime is written like "60 seconds" or "2 min".
- Only use the listed equipment; use bodyweight exercises when none is listed.

{JSON_ONLY}"#,
        goal = label(&req.goal),
        difficulty = label(&req.difficulty),
        days = req.days_per_week,
        duration = req.duration_minutes,
        equipment = list_or(&req.equipment, "bodyweight only"),
        muscles = list_or(&req.target_muscles, "full body"),
        preferences = req.preferences.as_deref().unwrap_or("none"),
        profile = profile_block(req.profile.as_ref()),
    )
}

/// Slot names in day order; the weekly expander infers meal types from them.
fn slot_names(meals_per_day: u8) -> Vec<&'static str> {
    match meals_per_day {
        0..=3 => vec!["Breakfast", "Lunch", "Dinner"],
        4 => vec!["Breakfast", "Lunch", "Snack", "Dinner"],
        5 => vec!["Breakfast", "Snack", "Lunch", "Snack", "Dinner"],
        _ => vec!["Breakfast", "Snack", "Lunch", "Snack", "Dinner", "Snack"],
    }
}

pub fn diet_prompt(req: &DietRequest) -> String {
    let per_day = req.meals_per_day();
    let total = req.weekly_meal_count();
    let slots = slot_names(per_day).join(", ");
    let protein = req
        .target_protein
        .map(|p| format!("{p} g per day"))
        .unwrap_or_else(|| "not specified".to_string());

    format!(
        r#"You are a registered dietitian. Design a 7-day meal plan.

Request:
- Goal: {goal}
- Daily calories: {calories} kcal
- Meals per day: {per_day}
- Dietary restrictions: {restrictions}
- Target protein: {protein}
- Preferred foods: {preferred}
- Foods to avoid: {avoid}
- Preferences: {preferences}

{profile}

The plan MUST contain exactly {total} meals ({per_day} meals x 7 days), listed day by day:
all {per_day} meals of day 1 first, then day 2, and so on up to day 7.
Within each day use this slot order: {slots}. Start every meal name with its slot, e.g. "Breakfast - Greek yogurt bowl".
Vary the meals across the week: never repeat a primary protein source more than twice per week.
Each day should add up to roughly {calories} kcal.

Return this exact JSON shape:
{{
  "name": string,
  "description": string,
  "meals": [
    {{
      "name": string,
      "items": [
        {{ "name": string, "quantity": string, "calories": number, "protein": number, "carbs": number, "fat": number, "fiber": number }}
      ],
      "totalCalories": number,
      "macros": {{ "protein": number, "carbs": number, "fat": number, "fiber": number }},
      "instructions": string,
      "prepTime": number
    }}
  ]
}}

Rules:
- quantity is a household or metric measure such as "100g", "1 cup" or "2 tbsp".
- Macros are grams; prepTime is minutes.

{JSON_ONLY}"#,
        goal = label(&req.goal),
        calories = req.calories,
        restrictions = list_or(&req.restrictions, "none"),
        preferred = list_or(&req.preferred_foods, "none"),
        avoid = list_or(&req.avoid_foods, "none"),
        preferences = req.preferences.as_deref().unwrap_or("none"),
        profile = profile_block(req.profile.as_ref()),
    )
}

pub fn recipe_prompt(req: &RecipeRequest) -> String {
    let fallback = UserProfile::default();
    let profile = req.profile.as_ref().unwrap_or(&fallback);
    format!(
        r#"You are a chef specialised in healthy cooking. Create one recipe.

Request:
- Meal type: {meal_type}

{profile}

Return this exact JSON shape:
{{
  "name": string,
  "description": string,
  "category": string,
  "ingredients": [ {{ "name": string, "quantity": string, "unit": string }} ],
  "steps": [string],
  "nutritionalInfo": {{ "calories": number, "protein": number, "carbs": number, "fat": number, "fiber": number }},
  "prepTime": number,
  "servings": number
}}

Respect every dietary restriction in the profile.

{JSON_ONLY}"#,
        meal_type = req.meal_type,
        profile = profile_block(Some(profile)),
    )
}

pub fn recommendation_prompt(req: &RecommendationRequest) -> String {
    let p = &req.progress;
    let strength = if p.strength_progress.is_empty() {
        "none".to_string()
    } else {
        p.strength_progress
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let opt = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_else(|| "n/a".to_string());

    format!(
        r#"You are a fitness coach. Give personalised recommendations from this progress report.

Progress:
- Completed workouts: {completed}
- Adherence rate: {adherence}%
- Weight change: {weight} kg
- Strength progress: {strength}
- Endurance progress: {endurance}
- Feedback: {feedback}
- Context: {context}

{profile}

Return this exact JSON shape with 3 to 5 recommendations:
{{
  "recommendations": [
    {{
      "type": "workout" | "nutrition" | "recovery" | "motivation" | "general",
      "title": string,
      "description": string,
      "priority": "high" | "medium" | "low",
      "category": string,
      "actionable": boolean,
      "metadata": object
    }}
  ]
}}

{JSON_ONLY}"#,
        completed = p.completed_workouts,
        adherence = p.adherence_rate,
        weight = opt(p.weight_progress),
        strength = strength,
        endurance = opt(p.endurance_progress),
        feedback = p.feedback.as_deref().unwrap_or("none"),
        context = req.context.as_deref().unwrap_or("none"),
        profile = profile_block(req.profile.as_ref()),
    )
}

pub fn build_prompt(req: &GenerationRequest) -> String {
    match req {
        GenerationRequest::Workout(r) => workout_prompt(r),
        GenerationRequest::Diet(r) => diet_prompt(r),
        GenerationRequest::Recipe(r) => recipe_prompt(r),
        GenerationRequest::Recommendation(r) => recommendation_prompt(r),
    }
}
