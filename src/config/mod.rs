use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::cli::ProviderKind;
use crate::errors::{GenError, GenResult};
use crate::wire::{GenerationKind, QuotaCategory, UserProfile, DEFAULT_MEALS_PER_DAY};

/// Sampling settings sent with each provider call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationBudget {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Budgets {
    pub workout: GenerationBudget,
    pub diet: GenerationBudget,
    pub recipe: GenerationBudget,
    pub recommendation: GenerationBudget,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            workout: GenerationBudget { temperature: 0.7, max_output_tokens: 4096 },
            // a full week of meals is by far the longest response
            diet: GenerationBudget { temperature: 0.7, max_output_tokens: 8000 },
            recipe: GenerationBudget { temperature: 0.7, max_output_tokens: 1200 },
            recommendation: GenerationBudget { temperature: 0.8, max_output_tokens: 800 },
        }
    }
}

/// Monthly generation allowance of a subscription plan. `-1` is unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimit {
    pub workouts_per_month: i64,
    pub diets_per_month: i64,
}

impl PlanLimit {
    pub fn for_category(&self, category: QuotaCategory) -> i64 {
        match category {
            QuotaCategory::Workout => self.workouts_per_month,
            QuotaCategory::Diet => self.diets_per_month,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderKind,
    pub model: String,
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_base_url: String,
    pub openai_base_url: String,
    pub timeout_secs: u64,
    pub budgets: Budgets,
    pub db_path: String,
    pub artifacts_dir: Option<String>,
    pub plan_limits: BTreeMap<String, PlanLimit>,
    pub default_meals_per_day: u8,
}

impl Default for Config {
    fn default() -> Self {
        let mut plan_limits = BTreeMap::new();
        plan_limits.insert("free".into(), PlanLimit { workouts_per_month: 3, diets_per_month: 3 });
        plan_limits.insert("premium".into(), PlanLimit { workouts_per_month: -1, diets_per_month: -1 });
        Self {
            provider: ProviderKind::Gemini,
            model: Self::default_model(ProviderKind::Gemini).into(),
            gemini_api_key: None,
            openai_api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
            openai_base_url: "https://api.openai.com/v1".into(),
            timeout_secs: 30,
            budgets: Budgets::default(),
            db_path: "levelup.db".into(),
            artifacts_dir: None,
            plan_limits,
            default_meals_per_day: DEFAULT_MEALS_PER_DAY,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> GenResult<Self> {
        let mut cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .map_err(|e| GenError::Config(format!("reading config: {e}")))?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        cfg.apply_overrides(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    pub fn from_toml(text: &str) -> GenResult<Self> {
        let mut cfg: Self =
            toml::from_str(text).map_err(|e| GenError::Config(format!("parsing config: {e}")))?;
        if cfg.model == Self::default_model(ProviderKind::Gemini) {
            cfg.model = Self::default_model(cfg.provider).to_string();
        }
        Ok(cfg)
    }

    pub fn apply_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(p) = var("LEVELUP_PROVIDER") {
            match p.to_lowercase().as_str() {
                "gemini" => self.set_provider(ProviderKind::Gemini),
                "openai" | "open-ai" => self.set_provider(ProviderKind::OpenAI),
                other => debug!(provider = other, "ignoring unknown LEVELUP_PROVIDER"),
            }
        }
        if let Some(m) = var("LEVELUP_MODEL") {
            self.model = m;
        }
        if let Some(k) = var("GEMINI_API_KEY") {
            self.gemini_api_key = Some(k);
        }
        if let Some(k) = var("OPENAI_API_KEY") {
            self.openai_api_key = Some(k);
        }
        if let Some(db) = var("LEVELUP_DB") {
            self.db_path = db;
        }
        if let Some(t) = var("LEVELUP_TIMEOUT_SECS").and_then(|t| t.parse().ok()) {
            self.timeout_secs = t;
        }
        if let Some(dir) = var("LEVELUP_ARTIFACTS_DIR") {
            self.artifacts_dir = Some(dir);
        }
    }

    /// Model used when switching provider without naming one.
    pub fn default_model(provider: ProviderKind) -> &'static str {
        match provider {
            ProviderKind::Gemini => "gemini-2.0-flash-001",
            ProviderKind::OpenAI => "gpt-4o-mini",
        }
    }

    /// Switches provider, moving off the previous provider's default model.
    pub fn set_provider(&mut self, provider: ProviderKind) {
        if self.model == Self::default_model(self.provider) {
            self.model = Self::default_model(provider).to_string();
        }
        self.provider = provider;
    }

    pub fn budget_for(&self, kind: GenerationKind) -> GenerationBudget {
        match kind {
            GenerationKind::Workout => self.budgets.workout,
            GenerationKind::Diet => self.budgets.diet,
            GenerationKind::Recipe => self.budgets.recipe,
            GenerationKind::Recommendation => self.budgets.recommendation,
        }
    }

    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            ProviderKind::Gemini => self.gemini_api_key.as_deref(),
            ProviderKind::OpenAI => self.openai_api_key.as_deref(),
        }
    }
}

/// Reads a profile file: JSON when the extension is `.json`, TOML otherwise.
pub fn load_profile(path: &Path) -> GenResult<UserProfile> {
    let text = fs::read_to_string(path).map_err(|e| GenError::Config(format!("reading profile: {e}")))?;
    let is_json = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&text).map_err(|e| GenError::Config(format!("parsing profile: {e}")))
    } else {
        toml::from_str(&text).map_err(|e| GenError::Config(format!("parsing profile: {e}")))
    }
}
