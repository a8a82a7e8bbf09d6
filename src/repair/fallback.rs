use serde_json::{json, Value};

use crate::wire::GenerationKind;

/// Minimal shape-valid object for a kind, used once every repair stage has failed.
pub fn fallback_for(kind: GenerationKind) -> Value {
    match kind {
        GenerationKind::Workout => json!({
            "name": "Basic Workout Plan",
            "description": "A simple full-body session to get started",
            "exercises": [{
                "name": "Squats",
                "sets": 3,
                "reps": "8-12",
                "restTime": "2-3 min",
                "instructions": "Keep your back straight and lower until your thighs are parallel to the floor",
                "targetMuscles": ["quads", "glutes"],
                "equipment": "bodyweight"
            }]
        }),
        GenerationKind::Diet => json!({
            "name": "Basic Meal Plan",
            "description": "A simple balanced meal",
            "meals": [{
                "name": "Breakfast",
                "items": [{
                    "name": "Oats",
                    "quantity": "1/2 taza",
                    "calories": 150,
                    "protein": 5,
                    "carbs": 27,
                    "fat": 3,
                    "fiber": 4
                }],
                "totalCalories": 150,
                "macros": { "protein": 5, "carbs": 27, "fat": 3, "fiber": 4 }
            }]
        }),
        GenerationKind::Recipe => json!({
            "name": "Simple Oatmeal",
            "description": "Quick and nutritious oatmeal",
            "category": "breakfast",
            "ingredients": [{ "name": "Oats", "quantity": "1/2", "unit": "taza" }],
            "steps": [
                "Heat water or milk",
                "Add the oats and cook for 5 minutes",
                "Serve warm"
            ],
            "nutritionalInfo": { "calories": 200, "protein": 8, "carbs": 30, "fat": 4, "fiber": 5 },
            "prepTime": 10,
            "servings": 1
        }),
        GenerationKind::Recommendation => json!({
            "recommendations": [{
                "type": "general",
                "title": "Stay consistent",
                "description": "Keep following your current routine and diet plan",
                "priority": "medium",
                "category": "general",
                "actionable": true,
                "metadata": {}
            }]
        }),
    }
}

/// Kinds whose callers get the fallback instead of an error when repair is exhausted.
pub fn masks_failures(kind: GenerationKind) -> bool {
    matches!(kind, GenerationKind::Workout | GenerationKind::Recipe)
}
