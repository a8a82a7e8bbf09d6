use tracing::{debug, warn};

use crate::errors::{GenError, GenResult};
use crate::wire::{Meal, MealType, ScheduledMeal};

/// Responses with at least this many meals are read as a full week
/// (three meals a day or more).
pub const WEEKLY_THRESHOLD: usize = 21;
pub const DAYS_PER_WEEK: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Density {
    Weekly { per_day: usize },
    SingleDay,
}

pub fn classify(meal_count: usize) -> Density {
    if meal_count >= WEEKLY_THRESHOLD {
        let per_day = (meal_count as f64 / DAYS_PER_WEEK as f64).round() as usize;
        Density::Weekly { per_day }
    } else {
        Density::SingleDay
    }
}

const MEAL_KEYWORDS: [(MealType, &[&str]); 4] = [
    (MealType::Breakfast, &["desayuno", "breakfast"]),
    (MealType::Lunch, &["almuerzo", "comida", "lunch"]),
    (MealType::Dinner, &["cena", "dinner"]),
    (MealType::Snack, &["snack", "colación", "colacion", "merienda"]),
];

pub fn infer_meal_type(name: &str) -> MealType {
    let lower = name.to_lowercase();
    MEAL_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(t, _)| *t)
        .unwrap_or(MealType::Snack)
}

fn scheduled(meal: &Meal, day: usize, order: usize) -> ScheduledMeal {
    ScheduledMeal {
        meal: meal.clone(),
        day_of_week: day as u8,
        order_in_day: order as u8,
        meal_type: infer_meal_type(&meal.name),
    }
}

/// Lays a validated plan's meals out over a week.
///
/// Weekly responses are cut into seven contiguous chunks in order. Meals past
/// `7 * per_day` are dropped and a short last chunk borrows the previous day's
/// meal at the same slot, so every day ends up with `per_day` meals.
/// Single-day responses are repeated unchanged on each of the seven days.
pub fn expand(meals: &[Meal], meals_per_day: u8) -> GenResult<Vec<ScheduledMeal>> {
    if meals.is_empty() {
        return Err(GenError::shape("meals"));
    }

    let n = meals.len();
    let density = classify(n);
    let mut out = Vec::new();

    match density {
        Density::Weekly { per_day } => {
            if per_day != meals_per_day as usize {
                warn!(
                    meals = n,
                    per_day,
                    requested = meals_per_day,
                    "weekly response density differs from requested meals per day"
                );
            }
            if n != per_day * DAYS_PER_WEEK {
                debug!(meals = n, expected = per_day * DAYS_PER_WEEK, "uneven weekly response");
            }
            let mut days: Vec<Vec<&Meal>> = Vec::with_capacity(DAYS_PER_WEEK);
            for d in 0..DAYS_PER_WEEK {
                let mut day = Vec::with_capacity(per_day);
                for k in 0..per_day {
                    let meal = match meals.get(d * per_day + k) {
                        Some(m) => m,
                        None => days[d - 1][k],
                    };
                    day.push(meal);
                }
                days.push(day);
            }
            for (d, day) in days.iter().enumerate() {
                for (k, meal) in day.iter().enumerate() {
                    out.push(scheduled(meal, d + 1, k + 1));
                }
            }
        }
        Density::SingleDay => {
            if n != meals_per_day as usize {
                debug!(meals = n, requested = meals_per_day, "single-day response size differs from request");
            }
            for d in 1..=DAYS_PER_WEEK {
                for (k, meal) in meals.iter().enumerate() {
                    out.push(scheduled(meal, d, k + 1));
                }
            }
        }
    }

    debug!(?density, records = out.len(), "expanded meals over the week");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::MacroNutrients;

    fn meals(names: &[&str]) -> Vec<Meal> {
        names
            .iter()
            .map(|n| Meal {
                name: n.to_string(),
                items: vec![],
                total_calories: 500.0,
                macros: MacroNutrients::default(),
                instructions: None,
                prep_time: None,
            })
            .collect()
    }

    fn week(per_day: usize) -> Vec<Meal> {
        let slots = ["Desayuno", "Almuerzo", "Merienda", "Cena", "Snack nocturno"];
        let names: Vec<String> = (1..=7)
            .flat_map(|d| slots[..per_day].iter().map(move |s| format!("{s} día {d}")))
            .collect();
        meals(&names.iter().map(String::as_str).collect::<Vec<_>>())
    }

    #[test]
    fn meal_type_keywords() {
        assert_eq!(infer_meal_type("Desayuno energético"), MealType::Breakfast);
        assert_eq!(infer_meal_type("LUNCH bowl"), MealType::Lunch);
        assert_eq!(infer_meal_type("Comida principal"), MealType::Lunch);
        assert_eq!(infer_meal_type("Cena ligera"), MealType::Dinner);
        assert_eq!(infer_meal_type("Colación de media tarde"), MealType::Snack);
        assert_eq!(infer_meal_type("Post-workout shake"), MealType::Snack);
    }

    #[test]
    fn classification_threshold() {
        assert_eq!(classify(20), Density::SingleDay);
        assert_eq!(classify(21), Density::Weekly { per_day: 3 });
        assert_eq!(classify(28), Density::Weekly { per_day: 4 });
        assert_eq!(classify(35), Density::Weekly { per_day: 5 });
    }

    #[test]
    fn twenty_eight_meals_become_four_per_day() {
        let out = expand(&week(4), 4).unwrap();
        assert_eq!(out.len(), 28);
        for d in 1..=7u8 {
            let day: Vec<_> = out.iter().filter(|m| m.day_of_week == d).collect();
            assert_eq!(day.len(), 4);
            assert_eq!(day.iter().map(|m| m.order_in_day).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
            assert_eq!(day[0].meal.name, format!("Desayuno día {d}"));
            assert_eq!(day[0].meal_type, MealType::Breakfast);
            assert_eq!(day[3].meal_type, MealType::Dinner);
        }
    }

    #[test]
    fn every_meals_per_day_yields_seven_times_m() {
        for m in 3..=5usize {
            let out = expand(&week(m), m as u8).unwrap();
            assert_eq!(out.len(), 7 * m);
            assert!(out.iter().all(|s| (1..=7).contains(&s.day_of_week)));
            assert!(out.iter().all(|s| (1..=m as u8).contains(&s.order_in_day)));
        }
    }

    #[test]
    fn single_day_is_replicated() {
        let day = meals(&["Desayuno", "Almuerzo", "Cena", "Snack"]);
        let out = expand(&day, 4).unwrap();
        assert_eq!(out.len(), 28);
        let sunday: Vec<_> = out.iter().filter(|m| m.day_of_week == 7).map(|m| m.meal.name.clone()).collect();
        assert_eq!(sunday, vec!["Desayuno", "Almuerzo", "Cena", "Snack"]);
    }

    #[test]
    fn short_week_pads_from_previous_day() {
        // 25 meals round to 4 per day; day 7 only has one of its own
        let mut list = week(4);
        list.truncate(25);
        let out = expand(&list, 4).unwrap();
        assert_eq!(out.len(), 28);
        let last: Vec<_> = out.iter().filter(|m| m.day_of_week == 7).map(|m| m.meal.name.as_str()).collect();
        assert_eq!(last, vec!["Desayuno día 7", "Almuerzo día 6", "Merienda día 6", "Cena día 6"]);
    }

    #[test]
    fn extra_meals_are_dropped() {
        let mut list = week(3);
        list.extend(meals(&["Extra 1", "Extra 2", "Extra 3"]));
        let out = expand(&list, 3).unwrap();
        assert_eq!(out.len(), 21);
        assert!(out.iter().all(|m| !m.meal.name.starts_with("Extra")));
    }

    #[test]
    fn empty_plan_is_rejected() {
        assert!(matches!(expand(&[], 4), Err(GenError::ShapeMismatch { .. })));
    }
}
