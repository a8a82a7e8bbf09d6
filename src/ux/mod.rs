use colored::Colorize;
use std::collections::BTreeMap;

use crate::errors::GenError;
use crate::pipeline::{CompleteProfile, DietOutcome, ProgressUpdate, RecipeOutcome, WorkoutOutcome};
use crate::provider::ProviderStatus;
use crate::quota::{UsageReport, UNLIMITED};
use crate::repair::Outcome;
use crate::store::StoredRecommendation;
use crate::wire::label;

pub fn limit_label(used: i64, limit: i64) -> String {
    if limit == UNLIMITED {
        format!("{used}/unlimited")
    } else {
        format!("{used}/{limit}")
    }
}

fn repair_badge(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Strict => "[STRICT]".green().bold().to_string(),
        Outcome::Repaired(stage) => format!("{} {stage}", "[REPAIRED]".yellow().bold()),
        Outcome::Fallback(reason) => format!("{} {reason}", "[FALLBACK]".red().bold()),
    }
}

pub fn show_workout(out: &WorkoutOutcome) {
    println!("\n=== WORKOUT ===");
    println!("{}  {}", out.routine.name.bold(), repair_badge(&out.repair));
    println!("{}", out.routine.description);
    println!("id: {}", out.routine.id.to_string().cyan());

    let mut by_day: BTreeMap<u8, usize> = BTreeMap::new();
    for link in &out.links {
        *by_day.entry(link.day_of_week).or_default() += 1;
    }
    for (day, n) in by_day {
        println!("  day {day}: {n} exercises");
    }
    println!(
        "{} exercises generated, {} linked\n",
        out.plan.layout.exercise_count(),
        out.links.len()
    );
}

pub fn show_diet(out: &DietOutcome) {
    println!("\n=== DIET ===");
    let badge = out.repair.as_ref().map(repair_badge).unwrap_or_else(|| "[RESCALED]".cyan().bold().to_string());
    println!("{}  {}", out.plan.name.bold(), badge);
    println!("{}", out.plan.description);
    println!("id: {}", out.plan.id.to_string().cyan());
    println!(
        "  {} kcal/day   protein {}g   carbs {}g   fat {}g",
        out.plan.target_calories, out.plan.target_protein, out.plan.target_carbs, out.plan.target_fat
    );
    for meal in out.meals.iter().filter(|m| m.day_of_week == 1) {
        println!("  {}. {} {}", meal.order_in_day, format!("[{}]", meal.meal_type).magenta(), meal.name);
    }
    println!("{} meal records, {} food links\n", out.meals.len(), out.foods.len());
}

pub fn show_recipe(out: &RecipeOutcome) {
    let r = &out.recipe;
    println!("\n=== RECIPE ===");
    println!("{}  {}", r.name.bold(), repair_badge(&out.repair));
    println!("{} ({}, {} min, serves {})", r.description, r.category, r.prep_time, r.servings);
    for i in &r.ingredients {
        println!("  - {} {} {}", i.quantity, i.unit, i.name);
    }
    for (n, step) in r.steps.iter().enumerate() {
        println!("  {}. {step}", n + 1);
    }
    println!();
}

pub fn show_recommendations(recs: &[StoredRecommendation]) {
    println!("\n=== RECOMMENDATIONS ===");
    if recs.is_empty() {
        println!("(none)");
    }
    for s in recs {
        let r = &s.recommendation;
        let priority = match r.priority.as_str() {
            "high" => r.priority.red().bold(),
            "medium" => r.priority.yellow().bold(),
            _ => r.priority.normal(),
        };
        println!("[{priority}] {} ({})", r.title.bold(), r.kind);
        println!("    {}", r.description);
    }
    println!();
}

pub fn show_profile(p: &CompleteProfile) {
    show_workout(&p.workout);
    show_diet(&p.diet);
    show_recommendations(&p.recommendations);
}

pub fn show_progress(p: &ProgressUpdate) {
    show_recommendations(&p.recommendations);
    let i = &p.insights;
    println!("=== INSIGHTS ===");
    println!("  consistency: {}", label(&i.consistency).bold());
    println!("  adherence:   {}%", i.adherence_score);
    println!("  trend:       {}", label(&i.trend).bold());
    for s in &i.suggestions {
        println!("  - {s}");
    }
    println!("  next: {}\n", i.next_milestone.cyan());
}

fn key_label(present: bool) -> String {
    if present {
        "configured".green().to_string()
    } else {
        "missing_key".red().to_string()
    }
}

pub fn show_status(s: &ProviderStatus) {
    println!("\n=== PROVIDER ===");
    println!("current: {} ({})", s.current.as_str().bold(), s.model);
    println!("  gemini: {}", key_label(s.gemini_key));
    println!("  openai: {}\n", key_label(s.openai_key));
}

pub fn show_usage(user_id: &str, r: &UsageReport) {
    println!("\n=== USAGE {}-{:02} ===", r.year, r.month);
    println!("user {} on plan {}", user_id.bold(), r.plan.cyan());
    println!("  workouts: {}", limit_label(r.workouts_used, r.workouts_limit));
    println!("  diets:    {}\n", limit_label(r.diets_used, r.diets_limit));
}

pub fn print_error(e: &GenError) {
    let tag = if e.is_user_correctable() {
        "[ACTION NEEDED]".yellow().bold()
    } else if e.is_transient() {
        "[RETRY LATER]".magenta().bold()
    } else {
        "[FAILED]".red().bold()
    };
    eprintln!("{tag} {e}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_is_spelled_out() {
        assert_eq!(limit_label(4, UNLIMITED), "4/unlimited");
        assert_eq!(limit_label(2, 3), "2/3");
    }
}
