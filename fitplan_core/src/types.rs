//! Core domain types for fitplan.
//!
//! This module defines the fundamental types used throughout the system:
//! - Exercise definitions and their cost models
//! - User profiles as read from the profile store
//! - Generated workouts and their composition
//! - Completed exercises and session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Seconds budgeted per repetition when estimating a rep-based exercise
pub const SECONDS_PER_REP: u32 = 2;

// ============================================================================
// Exercise Types
// ============================================================================

/// Category of exercise
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Cardio,
    Strength,
    Flexibility,
    FullBody,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Cardio,
        Category::Strength,
        Category::Flexibility,
        Category::FullBody,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cardio => "cardio",
            Category::Strength => "strength",
            Category::Flexibility => "flexibility",
            Category::FullBody => "full-body",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match normalize(s).as_str() {
            "cardio" => Ok(Category::Cardio),
            "strength" => Ok(Category::Strength),
            "flexibility" => Ok(Category::Flexibility),
            "full-body" | "fullbody" => Ok(Category::FullBody),
            other => Err(crate::Error::Other(format!("Unknown category: {}", other))),
        }
    }
}

/// Exercise difficulty / user fitness level
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match normalize(s).as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(crate::Error::Other(format!("Unknown difficulty: {}", other))),
        }
    }
}

/// How an exercise's effort is measured
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CostModel {
    /// Fixed duration; completes when the countdown expires
    Timed { seconds: u32 },
    /// Repetitions across sets; completed manually
    Reps { reps: u32, sets: u32 },
}

impl CostModel {
    /// Estimated duration in whole seconds
    pub fn estimated_seconds(&self) -> u32 {
        match *self {
            CostModel::Timed { seconds } => seconds,
            CostModel::Reps { reps, sets } => reps * sets * SECONDS_PER_REP,
        }
    }
}

/// An exercise definition (e.g., "Push-ups")
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExerciseDefinition {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub cost: CostModel,
    pub calories_per_unit: u32,
    #[serde(default)]
    pub target_muscles: BTreeSet<String>,
}

impl ExerciseDefinition {
    pub fn cost_seconds(&self) -> u32 {
        self.cost.estimated_seconds()
    }

    pub fn targets(&self, muscle: &str) -> bool {
        self.target_muscles.contains(muscle)
    }
}

// ============================================================================
// Profile Types
// ============================================================================

/// Training goal driving category selection
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FitnessGoal {
    WeightLoss,
    MuscleGain,
    Flexibility,
    General,
}

impl FitnessGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitnessGoal::WeightLoss => "weight-loss",
            FitnessGoal::MuscleGain => "muscle-gain",
            FitnessGoal::Flexibility => "flexibility",
            FitnessGoal::General => "general",
        }
    }
}

impl fmt::Display for FitnessGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for FitnessGoal {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match normalize(s).as_str() {
            "weight-loss" => Ok(FitnessGoal::WeightLoss),
            "muscle-gain" => Ok(FitnessGoal::MuscleGain),
            "flexibility" => Ok(FitnessGoal::Flexibility),
            "general" | "general-fitness" => Ok(FitnessGoal::General),
            other => Err(crate::Error::Other(format!("Unknown goal: {}", other))),
        }
    }
}

/// Profile document as held by the profile store
///
/// Every field is optional: a freshly created account has none of them, and a
/// profile missing any of them is routed to profile completion rather than
/// generation.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UserProfile {
    #[serde(default)]
    pub fitness_goal: Option<String>,
    #[serde(default)]
    pub fitness_level: Option<String>,
    #[serde(default)]
    pub available_time_minutes: Option<u32>,
}

impl UserProfile {
    pub fn new(goal: &str, level: &str, minutes: u32) -> Self {
        Self {
            fitness_goal: Some(goal.to_string()),
            fitness_level: Some(level.to_string()),
            available_time_minutes: Some(minutes),
        }
    }

    /// Names of the fields still missing
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.fitness_goal.as_deref().map_or(true, |g| g.trim().is_empty()) {
            missing.push("fitness_goal".to_string());
        }
        if self.fitness_level.as_deref().map_or(true, |l| l.trim().is_empty()) {
            missing.push("fitness_level".to_string());
        }
        if self.available_time_minutes.is_none() {
            missing.push("available_time_minutes".to_string());
        }
        missing
    }
}

// ============================================================================
// Generated Workout Types
// ============================================================================

/// Breakdown of a workout's time across training modalities
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Composition {
    pub cardio_seconds: u32,
    pub strength_seconds: u32,
    pub flexibility_seconds: u32,
}

impl Composition {
    /// Full-body work counts half toward cardio and half toward strength.
    fn add(&mut self, category: Category, seconds: u32) {
        match category {
            Category::Cardio => self.cardio_seconds += seconds,
            Category::Strength => self.strength_seconds += seconds,
            Category::Flexibility => self.flexibility_seconds += seconds,
            Category::FullBody => {
                let strength = seconds / 2;
                self.strength_seconds += strength;
                self.cardio_seconds += seconds - strength;
            }
        }
    }

    pub fn cardio_minutes(&self) -> u32 {
        self.cardio_seconds.div_ceil(60)
    }

    pub fn strength_minutes(&self) -> u32 {
        self.strength_seconds.div_ceil(60)
    }

    pub fn flexibility_minutes(&self) -> u32 {
        self.flexibility_seconds.div_ceil(60)
    }
}

/// An ordered, time-boxed workout produced for one session
///
/// Totals are derived from the exercise list and cannot be set directly; a
/// deserialized workout recomputes them.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "StoredWorkout")]
pub struct GeneratedWorkout {
    id: Uuid,
    goal: FitnessGoal,
    difficulty: Difficulty,
    exercises: Vec<ExerciseDefinition>,
    total_duration_seconds: u32,
    total_duration_minutes: u32,
    estimated_calories: u32,
    composition: Composition,
}

#[derive(Deserialize)]
struct StoredWorkout {
    id: Uuid,
    goal: FitnessGoal,
    difficulty: Difficulty,
    exercises: Vec<ExerciseDefinition>,
}

impl From<StoredWorkout> for GeneratedWorkout {
    fn from(stored: StoredWorkout) -> Self {
        let mut workout = GeneratedWorkout::new(stored.goal, stored.difficulty, stored.exercises);
        workout.id = stored.id;
        workout
    }
}

impl GeneratedWorkout {
    pub fn new(goal: FitnessGoal, difficulty: Difficulty, exercises: Vec<ExerciseDefinition>) -> Self {
        let mut composition = Composition::default();
        let mut total_seconds = 0u32;
        let mut calories = 0u32;

        for exercise in &exercises {
            let seconds = exercise.cost_seconds();
            total_seconds += seconds;
            calories += exercise.calories_per_unit;
            composition.add(exercise.category, seconds);
        }

        Self {
            id: Uuid::new_v4(),
            goal,
            difficulty,
            exercises,
            total_duration_seconds: total_seconds,
            total_duration_minutes: total_seconds.div_ceil(60),
            estimated_calories: calories,
            composition,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn goal(&self) -> FitnessGoal {
        self.goal
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn exercises(&self) -> &[ExerciseDefinition] {
        &self.exercises
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn total_duration_seconds(&self) -> u32 {
        self.total_duration_seconds
    }

    pub fn total_duration_minutes(&self) -> u32 {
        self.total_duration_minutes
    }

    pub fn estimated_calories(&self) -> u32 {
        self.estimated_calories
    }

    pub fn composition(&self) -> Composition {
        self.composition
    }
}

// ============================================================================
// Session Output Types
// ============================================================================

/// Snapshot of an exercise once it is done (performed or skipped)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletedExercise {
    pub exercise: ExerciseDefinition,
    pub completed_at: DateTime<Utc>,
    pub time_spent_seconds: u32,
    #[serde(default)]
    pub skipped: bool,
}

impl CompletedExercise {
    /// Calories credited for this exercise.
    ///
    /// Performed exercises earn their full calorie value. Skipped exercises
    /// earn a share proportional to the time spent before skipping, capped at
    /// the full value.
    pub fn calories(&self) -> u32 {
        let full = self.exercise.calories_per_unit;
        if !self.skipped {
            return full;
        }
        let planned = self.exercise.cost_seconds();
        if planned == 0 {
            return 0;
        }
        let spent = self.time_spent_seconds.min(planned);
        (u64::from(full) * u64::from(spent) / u64::from(planned)) as u32
    }
}

/// Immutable artifact of one completed, rated workout session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub workout_id: Uuid,
    pub exercises: Vec<CompletedExercise>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total_duration_seconds: u32,
    pub total_duration_minutes: u32,
    pub calories_burned: u32,
    pub rating: u8,
}

impl SessionRecord {
    pub fn skipped_count(&self) -> usize {
        self.exercises.iter().filter(|e| e.skipped).count()
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase().replace(['_', ' '], "-")
}
