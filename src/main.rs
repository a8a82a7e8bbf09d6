use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use levelup_ai::cli::{Args, Command, DietArgs, WorkoutArgs};
use levelup_ai::config::{self, Config};
use levelup_ai::errors::GenResult;
use levelup_ai::log::init_tracing;
use levelup_ai::pipeline::{DietModifications, Pipeline, WorkoutModifications};
use levelup_ai::provider::{self, Disabled, DynProvider};
use levelup_ai::store::{DynStore, SqliteStore};
use levelup_ai::ux;
use levelup_ai::wire::{
    DietRequest, ProgressData, RecipeRequest, RecommendationRequest, WorkoutRequest,
};

fn workout_request(a: WorkoutArgs) -> WorkoutRequest {
    WorkoutRequest {
        user_id: a.user,
        goal: a.goal.into(),
        difficulty: a.difficulty.into(),
        days_per_week: a.days,
        duration_minutes: a.duration,
        equipment: a.equipment,
        target_muscles: a.muscles,
        preferences: a.preferences,
        profile: None,
    }
}

fn diet_request(a: DietArgs) -> DietRequest {
    DietRequest {
        user_id: a.user,
        goal: a.goal.into(),
        calories: a.calories,
        restrictions: a.restrictions,
        meals_per_day: a.meals_per_day,
        target_protein: a.protein,
        preferred_foods: a.prefer,
        avoid_foods: a.avoid,
        preferences: a.preferences,
        profile: None,
    }
}

fn needs_provider(cmd: &Command) -> bool {
    !matches!(
        cmd,
        Command::Usage { .. } | Command::AdjustCalories { .. } | Command::SetProfile { .. } | Command::Status
    )
}

async fn run(pipeline: &Pipeline, cfg: &Config, cmd: Command) -> GenResult<()> {
    match cmd {
        Command::Workout(a) => {
            let out = pipeline.generate_workout(&workout_request(a)).await?;
            ux::show_workout(&out);
        }
        Command::Diet(a) => {
            let out = pipeline.generate_diet(&diet_request(a)).await?;
            ux::show_diet(&out);
        }
        Command::Recipe { user, meal_type } => {
            let out = pipeline
                .generate_recipe(&RecipeRequest { user_id: user, meal_type, profile: None })
                .await?;
            ux::show_recipe(&out);
        }
        Command::Recommend { user, completed_workouts, adherence, weight_progress, feedback, context } => {
            let req = RecommendationRequest {
                user_id: user,
                progress: ProgressData {
                    completed_workouts,
                    adherence_rate: adherence,
                    weight_progress,
                    feedback,
                    ..Default::default()
                },
                context,
                profile: None,
            };
            let recs = pipeline.generate_recommendations(&req).await?;
            ux::show_recommendations(&recs);
        }
        Command::AdjustCalories { plan, calories } => {
            let out = pipeline.adjust_calories(plan, calories).await?;
            ux::show_diet(&out);
        }
        Command::RegenerateDiet { plan, goal, calories, meals_per_day, restrictions, preferences } => {
            let changes = DietModifications {
                goal: goal.map(Into::into),
                calories,
                meals_per_day,
                restrictions,
                preferences,
                ..Default::default()
            };
            let out = pipeline.regenerate_diet(plan, changes).await?;
            ux::show_diet(&out);
        }
        Command::RegenerateWorkout { routine, goal, difficulty, days, duration, equipment, muscles, preferences } => {
            let changes = WorkoutModifications {
                goal: goal.map(Into::into),
                difficulty: difficulty.map(Into::into),
                days_per_week: days,
                duration_minutes: duration,
                equipment,
                target_muscles: muscles,
                preferences,
                profile: None,
            };
            let out = pipeline.regenerate_workout(routine, changes).await?;
            ux::show_workout(&out);
        }
        Command::SetProfile { user, file } => {
            let profile = config::load_profile(&file)?;
            pipeline.save_profile(&user, &profile).await?;
            println!("profile stored for {user}");
        }
        Command::Progress { user, completed_workouts, adherence, weight_progress, strength, feedback } => {
            let progress = ProgressData {
                completed_workouts,
                adherence_rate: adherence,
                weight_progress,
                strength_progress: strength.into_iter().collect(),
                feedback,
                ..Default::default()
            };
            let out = pipeline.update_progress(&user, progress).await?;
            ux::show_progress(&out);
        }
        Command::Profile { workout, diet_goal, calories, meals_per_day } => {
            let diet = DietRequest {
                user_id: workout.user.clone(),
                goal: diet_goal.into(),
                calories,
                restrictions: vec![],
                meals_per_day,
                target_protein: None,
                preferred_foods: vec![],
                avoid_foods: vec![],
                preferences: None,
                profile: None,
            };
            let out = pipeline.generate_complete_profile(&workout_request(workout), &diet).await?;
            ux::show_profile(&out);
        }
        Command::Usage { user } => {
            let report = pipeline.usage(&user).await?;
            ux::show_usage(&user, &report);
        }
        Command::Status => ux::show_status(&provider::status(cfg)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let mut cfg = Config::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(p) = args.provider {
        cfg.set_provider(p);
    }
    if let Some(m) = args.model {
        cfg.model = m;
    }
    if let Some(db) = args.db {
        cfg.db_path = db;
    }
    if args.artifacts_dir.is_some() {
        cfg.artifacts_dir = args.artifacts_dir;
    }
    debug!(provider = cfg.provider.as_str(), model = %cfg.model, db = %cfg.db_path, "configuration loaded");

    let store: DynStore = Arc::new(
        SqliteStore::open(Path::new(&cfg.db_path))
            .with_context(|| format!("opening database {}", cfg.db_path))?,
    );

    let provider: DynProvider = match provider::make_provider(&cfg) {
        Ok(p) => p,
        Err(e) if !needs_provider(&args.command) => {
            debug!(error = %e, "no provider configured; continuing without it");
            Arc::new(Disabled::new(e.to_string()))
        }
        Err(e) => return Err(e).context("configuring provider"),
    };

    let pipeline = Pipeline::new(provider, store, cfg.clone());
    if let Err(e) = run(&pipeline, &cfg, args.command).await {
        ux::print_error(&e);
        std::process::exit(1);
    }
    Ok(())
}
