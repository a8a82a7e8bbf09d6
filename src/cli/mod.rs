use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::wire::{Difficulty, DietGoal, WorkoutGoal};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(alias = "google")]
    Gemini,
    #[value(name = "openai", alias = "open-ai")]
    OpenAI,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAI => "openai",
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum WorkoutGoalArg {
    LoseWeight,
    GainMuscle,
    ImproveEndurance,
    MaintainFitness,
    StrengthTraining,
    Flexibility,
}

impl From<WorkoutGoalArg> for WorkoutGoal {
    fn from(g: WorkoutGoalArg) -> Self {
        match g {
            WorkoutGoalArg::LoseWeight => WorkoutGoal::LoseWeight,
            WorkoutGoalArg::GainMuscle => WorkoutGoal::GainMuscle,
            WorkoutGoalArg::ImproveEndurance => WorkoutGoal::ImproveEndurance,
            WorkoutGoalArg::MaintainFitness => WorkoutGoal::MaintainFitness,
            WorkoutGoalArg::StrengthTraining => WorkoutGoal::StrengthTraining,
            WorkoutGoalArg::Flexibility => WorkoutGoal::Flexibility,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DifficultyArg {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl From<DifficultyArg> for Difficulty {
    fn from(d: DifficultyArg) -> Self {
        match d {
            DifficultyArg::Beginner => Difficulty::Beginner,
            DifficultyArg::Intermediate => Difficulty::Intermediate,
            DifficultyArg::Advanced => Difficulty::Advanced,
            DifficultyArg::Expert => Difficulty::Expert,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum DietGoalArg {
    LoseWeight,
    GainWeight,
    MaintainWeight,
    BuildMuscle,
    ImproveHealth,
}

impl From<DietGoalArg> for DietGoal {
    fn from(g: DietGoalArg) -> Self {
        match g {
            DietGoalArg::LoseWeight => DietGoal::LoseWeight,
            DietGoalArg::GainWeight => DietGoal::GainWeight,
            DietGoalArg::MaintainWeight => DietGoal::MaintainWeight,
            DietGoalArg::BuildMuscle => DietGoal::BuildMuscle,
            DietGoalArg::ImproveHealth => DietGoal::ImproveHealth,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "levelup-ai", version, about = "Generate and store workout routines, diet plans, recipes and recommendations")]
pub struct Args {
    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    pub provider: Option<ProviderKind>,

    #[arg(long, global = true)]
    pub model: Option<String>,

    /// SQLite database path
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Directory for per-stage request/response artifacts
    #[arg(long, global = true)]
    pub artifacts_dir: Option<String>,

    #[arg(long, default_value_t = false, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct WorkoutArgs {
    #[arg(long)]
    pub user: String,
    #[arg(long, value_enum)]
    pub goal: WorkoutGoalArg,
    #[arg(long, value_enum, default_value = "beginner")]
    pub difficulty: DifficultyArg,
    #[arg(long, default_value_t = 3)]
    pub days: u8,
    #[arg(long, default_value_t = 45)]
    pub duration: u32,
    #[arg(long, value_delimiter = ',')]
    pub equipment: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    pub muscles: Vec<String>,
    #[arg(long)]
    pub preferences: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DietArgs {
    #[arg(long)]
    pub user: String,
    #[arg(long, value_enum)]
    pub goal: DietGoalArg,
    #[arg(long)]
    pub calories: u32,
    #[arg(long)]
    pub meals_per_day: Option<u8>,
    #[arg(long, value_delimiter = ',')]
    pub restrictions: Vec<String>,
    #[arg(long)]
    pub protein: Option<u32>,
    #[arg(long, value_delimiter = ',')]
    pub prefer: Vec<String>,
    #[arg(long, value_delimiter = ',')]
    pub avoid: Vec<String>,
    #[arg(long)]
    pub preferences: Option<String>,
}

/// `name=value` pair for a tracked lift, e.g. `squat=10`.
pub fn parse_lift(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s.split_once('=').ok_or_else(|| format!("expected name=value, got `{s}`"))?;
    let value = value.trim().parse::<f64>().map_err(|e| format!("bad value for {name}: {e}"))?;
    Ok((name.trim().to_string(), value))
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate and store a workout routine
    Workout(WorkoutArgs),
    /// Generate and store a weekly diet plan
    Diet(DietArgs),
    /// Generate a single recipe for a meal type
    Recipe {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "almuerzo")]
        meal_type: String,
    },
    /// Generate progress-based recommendations
    Recommend {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = 0)]
        completed_workouts: u32,
        #[arg(long, default_value_t = 100.0)]
        adherence: f64,
        #[arg(long)]
        weight_progress: Option<f64>,
        #[arg(long)]
        feedback: Option<String>,
        #[arg(long)]
        context: Option<String>,
    },
    /// Rescale a stored diet plan to a new daily calorie target
    AdjustCalories {
        #[arg(long)]
        plan: Uuid,
        #[arg(long)]
        calories: f64,
    },
    /// Generate a new diet plan from a stored plan's settings
    RegenerateDiet {
        #[arg(long)]
        plan: Uuid,
        #[arg(long, value_enum)]
        goal: Option<DietGoalArg>,
        #[arg(long)]
        calories: Option<u32>,
        #[arg(long)]
        meals_per_day: Option<u8>,
        #[arg(long, value_delimiter = ',')]
        restrictions: Option<Vec<String>>,
        #[arg(long)]
        preferences: Option<String>,
    },
    /// Generate a new routine from a stored routine's settings
    RegenerateWorkout {
        #[arg(long)]
        routine: Uuid,
        #[arg(long, value_enum)]
        goal: Option<WorkoutGoalArg>,
        #[arg(long, value_enum)]
        difficulty: Option<DifficultyArg>,
        #[arg(long)]
        days: Option<u8>,
        #[arg(long)]
        duration: Option<u32>,
        #[arg(long, value_delimiter = ',')]
        equipment: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        muscles: Vec<String>,
        #[arg(long)]
        preferences: Option<String>,
    },
    /// Store the profile used by later generations (TOML or JSON file)
    SetProfile {
        #[arg(long)]
        user: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Record progress: recommendations plus rule-based insights
    Progress {
        #[arg(long)]
        user: String,
        #[arg(long)]
        completed_workouts: u32,
        #[arg(long)]
        adherence: f64,
        #[arg(long)]
        weight_progress: Option<f64>,
        #[arg(long, value_delimiter = ',', value_parser = parse_lift)]
        strength: Vec<(String, f64)>,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Generate workout and diet together, then initial recommendations
    Profile {
        #[command(flatten)]
        workout: WorkoutArgs,
        #[arg(long, value_enum)]
        diet_goal: DietGoalArg,
        #[arg(long)]
        calories: u32,
        #[arg(long)]
        meals_per_day: Option<u8>,
    },
    /// Show this month's usage against the plan limits
    Usage {
        #[arg(long)]
        user: String,
    },
    /// Show the configured provider, model and which keys are present
    Status,
}
