use tracing::debug;

use crate::errors::{GenError, GenResult};
use crate::wire::{FoodItem, MacroNutrients, Meal};

/// Plan-level macro totals. Meals without fiber count as zero fiber.
pub fn aggregate(meals: &[Meal]) -> MacroNutrients {
    meals.iter().fold(
        MacroNutrients { protein: 0.0, carbs: 0.0, fat: 0.0, fiber: Some(0.0) },
        |acc, m| MacroNutrients {
            protein: acc.protein + m.macros.protein,
            carbs: acc.carbs + m.macros.carbs,
            fat: acc.fat + m.macros.fat,
            fiber: Some(acc.fiber.unwrap_or(0.0) + m.macros.fiber.unwrap_or(0.0)),
        },
    )
}

pub fn total_calories(meals: &[Meal]) -> f64 {
    meals.iter().map(|m| m.total_calories).sum()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rescaled {
    pub meals: Vec<Meal>,
    pub total_calories: f64,
    pub macros: MacroNutrients,
}

fn scale(v: f64, factor: f64) -> f64 {
    (v * factor).round()
}

fn scale_opt(v: Option<f64>, factor: f64) -> Option<f64> {
    v.map(|x| scale(x, factor))
}

fn scale_item(item: &FoodItem, factor: f64) -> FoodItem {
    FoodItem {
        calories: scale(item.calories, factor),
        protein: scale_opt(item.protein, factor),
        carbs: scale_opt(item.carbs, factor),
        fat: scale_opt(item.fat, factor),
        fiber: scale_opt(item.fiber, factor),
        ..item.clone()
    }
}

fn scale_meal(meal: &Meal, factor: f64) -> Meal {
    Meal {
        total_calories: scale(meal.total_calories, factor),
        items: meal.items.iter().map(|i| scale_item(i, factor)).collect(),
        macros: MacroNutrients {
            protein: scale(meal.macros.protein, factor),
            carbs: scale(meal.macros.carbs, factor),
            fat: scale(meal.macros.fat, factor),
            fiber: scale_opt(meal.macros.fiber, factor),
        },
        ..meal.clone()
    }
}

/// Scales every meal proportionally from `current_total` to `target` kcal.
///
/// Each field is rounded on its own, so item sums may drift a little from the
/// meal totals. Plan macros are re-aggregated from the scaled meals.
pub fn rescale(meals: &[Meal], current_total: f64, target: f64) -> GenResult<Rescaled> {
    if !(current_total > 0.0) {
        return Err(GenError::InvalidRequest(
            "plan has no calorie total to scale from".into(),
        ));
    }
    if !(target > 0.0) {
        return Err(GenError::InvalidRequest("target calories must be positive".into()));
    }

    let factor = target / current_total;
    debug!(current_total, target, factor, meals = meals.len(), "rescaling plan");
    let scaled: Vec<Meal> = meals.iter().map(|m| scale_meal(m, factor)).collect();
    let macros = aggregate(&scaled);
    Ok(Rescaled { meals: scaled, total_calories: target, macros })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, kcal: f64, p: f64, c: f64, f: f64) -> FoodItem {
        FoodItem {
            name: name.into(),
            quantity: "100g".into(),
            calories: kcal,
            protein: Some(p),
            carbs: Some(c),
            fat: Some(f),
            fiber: None,
        }
    }

    fn meal(name: &str, items: Vec<FoodItem>, fiber: Option<f64>) -> Meal {
        let kcal = items.iter().map(|i| i.calories).sum();
        let macros = MacroNutrients {
            protein: items.iter().filter_map(|i| i.protein).sum(),
            carbs: items.iter().filter_map(|i| i.carbs).sum(),
            fat: items.iter().filter_map(|i| i.fat).sum(),
            fiber,
        };
        Meal { name: name.into(), items, total_calories: kcal, macros, instructions: None, prep_time: None }
    }

    fn plan_2000() -> Vec<Meal> {
        vec![
            meal("Desayuno", vec![item("Avena", 500.0, 20.0, 80.0, 10.0)], Some(8.0)),
            meal(
                "Almuerzo",
                vec![item("Pollo", 700.0, 60.0, 30.0, 21.0), item("Arroz", 300.0, 6.0, 64.0, 1.0)],
                None,
            ),
            meal("Cena", vec![item("Salmón", 500.0, 41.0, 0.0, 35.0)], Some(3.0)),
        ]
    }

    #[test]
    fn aggregate_defaults_missing_fiber_to_zero() {
        let totals = aggregate(&plan_2000());
        assert_eq!(totals.protein, 127.0);
        assert_eq!(totals.fiber, Some(11.0));
        assert_eq!(total_calories(&plan_2000()), 2000.0);
    }

    #[test]
    fn halving_halves_everything() {
        let out = rescale(&plan_2000(), 2000.0, 1000.0).unwrap();
        assert_eq!(out.total_calories, 1000.0);
        assert_eq!(out.meals[0].total_calories, 250.0);
        assert_eq!(out.meals[0].items[0].protein, Some(10.0));
        // 21 * 0.5 = 10.5 rounds away from zero
        assert_eq!(out.meals[1].items[0].fat, Some(11.0));
        assert_eq!(out.meals[2].items[0].carbs, Some(0.0));
        assert_eq!(out.macros.protein, out.meals.iter().map(|m| m.macros.protein).sum::<f64>());
    }

    #[test]
    fn unit_factor_is_idempotent() {
        let meals = plan_2000();
        let out = rescale(&meals, 2000.0, 2000.0).unwrap();
        assert_eq!(out.meals, meals);
    }

    #[test]
    fn zero_total_is_rejected() {
        assert!(matches!(rescale(&plan_2000(), 0.0, 1500.0), Err(GenError::InvalidRequest(_))));
        assert!(matches!(rescale(&plan_2000(), 2000.0, 0.0), Err(GenError::InvalidRequest(_))));
    }
}
