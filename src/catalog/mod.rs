use futures::future::join_all;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{GenError, GenResult};
use crate::store::{catalog_key, DynStore, NewExercise, NewFood};
use crate::wire::{Exercise, FoodItem};

pub const DEFAULT_EQUIPMENT: &str = "bodyweight";
pub const DEFAULT_FOOD_CATEGORY: &str = "Other";
pub const DEFAULT_GRAMS: f64 = 100.0;
pub const DEFAULT_REPS: (u32, u32) = (10, 12);
pub const DEFAULT_REST_SECONDS: u32 = 60;
pub const GENERATED_EXERCISE_CATEGORY: &str = "ai_generated";

const EQUIPMENT: [(&str, &[&str]); 6] = [
    ("barbell", &["barra", "barbell"]),
    ("dumbbells", &["mancuerna", "dumbbell"]),
    ("machine", &["máquina", "maquina", "machine"]),
    ("kettlebell", &["kettlebell"]),
    ("trx", &["trx"]),
    ("resistance_band", &["banda", "band"]),
];

const FOOD_GROUPS: [(&str, &[&str]); 7] = [
    (
        "Proteins",
        &["pollo", "pavo", "carne", "pescado", "atún", "atun", "salmón", "salmon", "huevo", "tofu",
          "chicken", "turkey", "beef", "fish", "tuna", "egg"],
    ),
    ("Dairy", &["leche", "yogur", "queso", "milk", "cheese"]),
    (
        "Grains",
        &["arroz", "avena", "pan", "pasta", "quinoa", "cereal", "rice", "oat", "bread"],
    ),
    (
        "Fruits",
        &["manzana", "plátano", "platano", "naranja", "fresa", "arándano", "arandano", "uva",
          "apple", "banana", "orange", "strawberr", "blueberr", "grape"],
    ),
    (
        "Vegetables",
        &["lechuga", "tomate", "brócoli", "brocoli", "zanahoria", "espinaca", "pepino",
          "lettuce", "tomato", "broccoli", "carrot", "spinach", "cucumber"],
    ),
    ("Nuts & Seeds", &["nuez", "almendra", "semilla", "walnut", "almond", "seed"]),
    ("Fats", &["aceite", "mantequilla", "aguacate", "oil", "butter", "avocado"]),
];

/// Household measures in grams. Checked in order, so longer words come first.
const UNIT_GRAMS: [(&str, f64); 13] = [
    ("cucharadita", 5.0),
    ("teaspoon", 5.0),
    ("tsp", 5.0),
    ("cucharada", 15.0),
    ("tablespoon", 15.0),
    ("tbsp", 15.0),
    ("taza", 240.0),
    ("cup", 240.0),
    ("grande", 200.0),
    ("large", 200.0),
    ("mediano", 150.0),
    ("pequeñ", 100.0),
    ("small", 100.0),
];

pub fn infer_equipment(exercise_name: &str) -> &'static str {
    let lower = exercise_name.to_lowercase();
    EQUIPMENT
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(e, _)| *e)
        .unwrap_or(DEFAULT_EQUIPMENT)
}

pub fn infer_food_category(food_name: &str) -> &'static str {
    let lower = food_name.to_lowercase();
    FOOD_GROUPS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(c, _)| *c)
        .unwrap_or(DEFAULT_FOOD_CATEGORY)
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static catalog regex"))
}

fn number(s: &str) -> Option<f64> {
    s.replace(',', ".").parse().ok()
}

/// Leading amount of a household measure: `2`, `1.5`, `1/2`, or a spelled half.
fn measure_amount(lower: &str) -> f64 {
    static FRACTION: OnceLock<Regex> = OnceLock::new();
    static DECIMAL: OnceLock<Regex> = OnceLock::new();
    if let Some(c) = regex(&FRACTION, r"(\d+)\s*/\s*(\d+)").captures(lower) {
        if let (Some(n), Some(d)) = (number(&c[1]), number(&c[2])) {
            if d > 0.0 {
                return n / d;
            }
        }
    }
    if let Some(c) = regex(&DECIMAL, r"(\d+(?:[.,]\d+)?)").captures(lower) {
        if let Some(n) = number(&c[1]) {
            return n;
        }
    }
    if lower.contains("media") || lower.contains("medio") || lower.contains("half") {
        return 0.5;
    }
    1.0
}

/// Converts free-text quantities such as `"100g"`, `"1 taza"` or `"2 cucharadas"` to grams.
pub fn parse_quantity_to_grams(quantity: &str) -> f64 {
    static WEIGHT: OnceLock<Regex> = OnceLock::new();
    static ANY_NUMBER: OnceLock<Regex> = OnceLock::new();

    let lower = quantity.trim().to_lowercase();
    if lower.is_empty() {
        return DEFAULT_GRAMS;
    }

    // Millilitres are taken as grams.
    let weight = regex(
        &WEIGHT,
        r"(\d+(?:[.,]\d+)?)\s*(?:gramos?|grs?|g|mililitros?|ml)\b",
    );
    if let Some(n) = weight.captures(&lower).and_then(|c| number(&c[1])) {
        return n;
    }

    if let Some((_, grams)) = UNIT_GRAMS.iter().find(|(unit, _)| lower.contains(unit)) {
        return grams * measure_amount(&lower);
    }
    // "media" on its own is a medium-sized piece.
    if lower.contains("media") || lower.contains("medium") {
        return 150.0;
    }

    regex(&ANY_NUMBER, r"(\d+(?:[.,]\d+)?)")
        .captures(&lower)
        .and_then(|c| number(&c[1]))
        .unwrap_or(DEFAULT_GRAMS)
}

/// `"8-12"` gives (8, 12); a single number gives (n, n).
pub fn parse_reps(reps: &str) -> (u32, u32) {
    static RE: OnceLock<Regex> = OnceLock::new();
    let Some(c) = regex(&RE, r"(\d+)(?:\s*-\s*(\d+))?").captures(reps) else {
        return DEFAULT_REPS;
    };
    let min = c[1].parse().unwrap_or(DEFAULT_REPS.0);
    let max = c.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(min);
    (min, max.max(min))
}

/// First number in the text, in seconds unless the text says minutes.
pub fn parse_rest_seconds(rest: Option<&str>) -> u32 {
    static RE: OnceLock<Regex> = OnceLock::new();
    let Some(rest) = rest else { return DEFAULT_REST_SECONDS };
    let Some(n) = regex(&RE, r"\d+").find(rest).and_then(|m| m.as_str().parse::<u32>().ok()) else {
        return DEFAULT_REST_SECONDS;
    };
    if rest.to_lowercase().contains("min") {
        n.saturating_mul(60)
    } else {
        n
    }
}

pub fn new_exercise(ex: &Exercise) -> NewExercise {
    let name = ex.name.trim().to_string();
    NewExercise {
        equipment: infer_equipment(&name).to_string(),
        category: GENERATED_EXERCISE_CATEGORY.to_string(),
        muscle_groups: ex.target_muscles.clone(),
        instructions: ex.instructions.clone(),
        name,
    }
}

/// Catalog entry for a food seen in a generated meal. Item figures are for the
/// stated quantity and get normalized to 100 g.
pub fn new_food(item: &FoodItem) -> NewFood {
    let name = item.name.trim().to_string();
    let grams = parse_quantity_to_grams(&item.quantity);
    let per_100 = |v: f64| if grams > 0.0 { (v * 100.0 / grams * 10.0).round() / 10.0 } else { v };
    NewFood {
        category: infer_food_category(&name).to_string(),
        calories_per_100g: per_100(item.calories),
        protein_per_100g: per_100(item.protein.unwrap_or(0.0)),
        carbs_per_100g: per_100(item.carbs.unwrap_or(0.0)),
        fat_per_100g: per_100(item.fat.unwrap_or(0.0)),
        fiber_per_100g: per_100(item.fiber.unwrap_or(0.0)),
        name,
    }
}

/// Maps generated exercise and food names onto catalog ids.
///
/// Distinct names are resolved concurrently, one upsert each.
#[derive(Clone)]
pub struct CatalogResolver {
    store: DynStore,
}

impl CatalogResolver {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Ids keyed by [`catalog_key`]. A failed create falls back to any existing
    /// exercise so the routine can still be linked.
    pub async fn resolve_exercises<'a, I>(&self, exercises: I) -> GenResult<HashMap<String, Uuid>>
    where
        I: IntoIterator<Item = &'a Exercise>,
    {
        let mut distinct: HashMap<String, NewExercise> = HashMap::new();
        for ex in exercises {
            distinct.entry(catalog_key(&ex.name)).or_insert_with(|| new_exercise(ex));
        }

        let lookups = distinct.into_iter().map(|(key, entry)| async move {
            let res = self.store.upsert_exercise(&entry).await;
            (key, entry.name, res)
        });

        let mut out = HashMap::new();
        for (key, name, res) in join_all(lookups).await {
            let id = match res {
                Ok(id) => id,
                Err(e) => {
                    warn!(exercise = %name, error = %e, "could not create exercise, linking an existing one");
                    self.store
                        .any_exercise_id()
                        .await?
                        .ok_or_else(|| GenError::Store(format!("no exercise available for {name}: {e}")))?
                }
            };
            out.insert(key, id);
        }
        debug!(resolved = out.len(), "exercises resolved");
        Ok(out)
    }

    /// Ids keyed by [`catalog_key`]. Foods that cannot be stored are left out and
    /// their meal links skipped.
    pub async fn resolve_foods<'a, I>(&self, items: I) -> HashMap<String, Uuid>
    where
        I: IntoIterator<Item = &'a FoodItem>,
    {
        let mut distinct: HashMap<String, NewFood> = HashMap::new();
        for item in items {
            if item.name.trim().is_empty() {
                continue;
            }
            distinct.entry(catalog_key(&item.name)).or_insert_with(|| new_food(item));
        }

        let lookups = distinct.into_iter().map(|(key, entry)| async move {
            let res = self.store.upsert_food(&entry).await;
            (key, entry.name, res)
        });

        let mut out = HashMap::new();
        for (key, name, res) in join_all(lookups).await {
            match res {
                Ok(id) => {
                    out.insert(key, id);
                }
                Err(e) => warn!(food = %name, error = %e, "could not store food"),
            }
        }
        debug!(resolved = out.len(), "foods resolved");
        out
    }
}
