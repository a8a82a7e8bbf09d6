use serde::{Deserialize, Serialize};

use crate::wire::ProgressData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Consistency {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    ExcellentProgress,
    GoodProgress,
    ModerateProgress,
    SlowProgress,
}

/// Rule-based summary reported next to progress recommendations. No provider
/// call is involved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressInsights {
    pub consistency: Consistency,
    pub adherence_score: f64,
    pub trend: Trend,
    pub suggestions: Vec<String>,
    pub next_milestone: String,
}

pub fn consistency(completed_workouts: u32) -> Consistency {
    match completed_workouts {
        20.. => Consistency::Excellent,
        10..=19 => Consistency::Good,
        5..=9 => Consistency::Fair,
        _ => Consistency::NeedsImprovement,
    }
}

/// One point each for a weight change over 1 kg, any tracked lift and
/// adherence above 80%.
pub fn trend(p: &ProgressData) -> Trend {
    let factors = [
        p.weight_progress.is_some_and(|w| w.abs() > 1.0),
        !p.strength_progress.is_empty(),
        p.adherence_rate > 80.0,
    ]
    .into_iter()
    .filter(|f| *f)
    .count();
    match factors {
        3 => Trend::ExcellentProgress,
        2 => Trend::GoodProgress,
        1 => Trend::ModerateProgress,
        _ => Trend::SlowProgress,
    }
}

fn suggestions(p: &ProgressData) -> Vec<String> {
    let mut out = Vec::new();
    if p.adherence_rate < 70.0 {
        out.push("Focus on building consistent habits".to_string());
    }
    if p.completed_workouts < 5 {
        out.push("Aim to complete more workouts this week".to_string());
    }
    if p.strength_progress.is_empty() {
        out.push("Track your lifting progress to see improvements".to_string());
    }
    out
}

pub fn next_milestone(completed_workouts: u32) -> &'static str {
    match completed_workouts {
        0..=9 => "Complete your first 10 workouts",
        10..=24 => "Reach 25 total workouts",
        25..=49 => "Achieve 50 workout milestone",
        _ => "Maintain consistency for 100+ workouts",
    }
}

pub fn analyze(p: &ProgressData) -> ProgressInsights {
    ProgressInsights {
        consistency: consistency(p.completed_workouts),
        adherence_score: p.adherence_rate,
        trend: trend(p),
        suggestions: suggestions(p),
        next_milestone: next_milestone(p.completed_workouts).to_string(),
    }
}
