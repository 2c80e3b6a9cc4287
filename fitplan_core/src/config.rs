//! Configuration file support for fitplan.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/fitplan/config.toml`.
//! The generator's rule tables (goal → categories, difficulty fallback order)
//! live here as plain data so they can be tuned without touching the
//! generator.

use crate::{Category, Difficulty, Error, ExerciseDefinition, FitnessGoal, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub user: UserConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Local user identity
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
        }
    }
}

/// Selection rules for one fitness goal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GoalRule {
    pub categories: Vec<Category>,

    /// When non-empty, the pool is balanced across these muscle groups
    /// instead of across categories.
    #[serde(default)]
    pub focus_muscles: Vec<String>,
}

impl GoalRule {
    fn new(categories: &[Category]) -> Self {
        Self {
            categories: categories.to_vec(),
            focus_muscles: Vec::new(),
        }
    }
}

/// Goal → rule table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GoalRules {
    #[serde(default = "default_weight_loss_rule")]
    pub weight_loss: GoalRule,

    #[serde(default = "default_muscle_gain_rule")]
    pub muscle_gain: GoalRule,

    #[serde(default = "default_flexibility_rule")]
    pub flexibility: GoalRule,

    #[serde(default = "default_general_rule")]
    pub general: GoalRule,
}

impl Default for GoalRules {
    fn default() -> Self {
        Self {
            weight_loss: default_weight_loss_rule(),
            muscle_gain: default_muscle_gain_rule(),
            flexibility: default_flexibility_rule(),
            general: default_general_rule(),
        }
    }
}

impl GoalRules {
    pub fn for_goal(&self, goal: FitnessGoal) -> &GoalRule {
        match goal {
            FitnessGoal::WeightLoss => &self.weight_loss,
            FitnessGoal::MuscleGain => &self.muscle_gain,
            FitnessGoal::Flexibility => &self.flexibility,
            FitnessGoal::General => &self.general,
        }
    }
}

/// Order in which other difficulties are tried when a pool is too small
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DifficultyFallback {
    #[serde(default = "default_beginner_fallback")]
    pub beginner: Vec<Difficulty>,

    #[serde(default = "default_intermediate_fallback")]
    pub intermediate: Vec<Difficulty>,

    #[serde(default = "default_advanced_fallback")]
    pub advanced: Vec<Difficulty>,
}

impl Default for DifficultyFallback {
    fn default() -> Self {
        Self {
            beginner: default_beginner_fallback(),
            intermediate: default_intermediate_fallback(),
            advanced: default_advanced_fallback(),
        }
    }
}

impl DifficultyFallback {
    /// Requested difficulty first, then its configured fallbacks, then any
    /// difficulty the table forgot. No duplicates.
    pub fn order_for(&self, requested: Difficulty) -> Vec<Difficulty> {
        let configured = match requested {
            Difficulty::Beginner => &self.beginner,
            Difficulty::Intermediate => &self.intermediate,
            Difficulty::Advanced => &self.advanced,
        };

        let mut order = vec![requested];
        for difficulty in configured.iter().chain(Difficulty::ALL.iter()) {
            if !order.contains(difficulty) {
                order.push(*difficulty);
            }
        }
        order
    }
}

/// Workout generation parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Pools smaller than this trigger difficulty relaxation
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: usize,

    /// Upper bound on exercises in one workout
    #[serde(default = "default_max_exercises")]
    pub max_exercises: usize,

    #[serde(default)]
    pub goals: GoalRules,

    #[serde(default)]
    pub difficulty_fallback: DifficultyFallback,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_pool_size: default_min_pool_size(),
            max_exercises: default_max_exercises(),
            goals: GoalRules::default(),
            difficulty_fallback: DifficultyFallback::default(),
        }
    }
}

/// Per-level override of the inter-exercise rest beat
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RestByLevel {
    pub beginner: Option<u32>,
    pub intermediate: Option<u32>,
    pub advanced: Option<u32>,
}

/// Session engine parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Rest beat between exercises, in seconds
    #[serde(default = "default_rest_seconds")]
    pub rest_seconds: u32,

    #[serde(default)]
    pub rest_by_level: RestByLevel,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rest_seconds: default_rest_seconds(),
            rest_by_level: RestByLevel::default(),
        }
    }
}

impl SessionConfig {
    pub fn rest_seconds_for(&self, level: Difficulty) -> u32 {
        let specific = match level {
            Difficulty::Beginner => self.rest_by_level.beginner,
            Difficulty::Intermediate => self.rest_by_level.intermediate,
            Difficulty::Advanced => self.rest_by_level.advanced,
        };
        specific.unwrap_or(self.rest_seconds)
    }
}

/// Custom exercises appended to the built-in catalog
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub custom: Vec<ExerciseDefinition>,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("fitplan")
}

fn default_user_id() -> String {
    "local".into()
}

fn default_weight_loss_rule() -> GoalRule {
    GoalRule::new(&[Category::Cardio, Category::FullBody])
}

fn default_muscle_gain_rule() -> GoalRule {
    GoalRule {
        categories: vec![Category::Strength],
        focus_muscles: ["chest", "back", "quadriceps", "shoulders", "glutes", "core"]
            .iter()
            .map(|m| m.to_string())
            .collect(),
    }
}

fn default_flexibility_rule() -> GoalRule {
    GoalRule::new(&[Category::Flexibility])
}

fn default_general_rule() -> GoalRule {
    GoalRule::new(&[Category::Cardio, Category::Strength, Category::Flexibility])
}

fn default_beginner_fallback() -> Vec<Difficulty> {
    vec![Difficulty::Intermediate, Difficulty::Advanced]
}

fn default_intermediate_fallback() -> Vec<Difficulty> {
    vec![Difficulty::Beginner, Difficulty::Advanced]
}

fn default_advanced_fallback() -> Vec<Difficulty> {
    vec![Difficulty::Intermediate, Difficulty::Beginner]
}

fn default_min_pool_size() -> usize {
    4
}

fn default_max_exercises() -> usize {
    100
}

fn default_rest_seconds() -> u32 {
    3
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("fitplan").join("config.toml")
    }

    /// Reject rule tables the generator cannot work with
    pub fn validate(&self) -> Result<()> {
        let goals = &self.generation.goals;
        for (name, rule) in [
            ("weight_loss", &goals.weight_loss),
            ("muscle_gain", &goals.muscle_gain),
            ("flexibility", &goals.flexibility),
            ("general", &goals.general),
        ] {
            if rule.categories.is_empty() {
                return Err(Error::Config(format!(
                    "goal rule '{}' has no categories",
                    name
                )));
            }
        }
        if self.generation.max_exercises == 0 {
            return Err(Error::Config("max_exercises must be at least 1".into()));
        }
        Ok(())
    }
}
