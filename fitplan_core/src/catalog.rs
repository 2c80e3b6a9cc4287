//! Default exercise catalog and catalog queries.
//!
//! This module provides the built-in exercise definitions and the filter used
//! by the generator to select from them.

use crate::types::*;
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog_internal);

/// The complete set of exercises available to the generator
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub exercises: HashMap<String, ExerciseDefinition>,
}

/// Query over the catalog; unset fields match everything
#[derive(Clone, Debug, Default)]
pub struct ExerciseFilter {
    pub categories: Option<Vec<Category>>,
    pub difficulty: Option<Difficulty>,
    pub muscle: Option<String>,
    pub search: Option<String>,
}

impl ExerciseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(mut self, categories: &[Category]) -> Self {
        self.categories = Some(categories.to_vec());
        self
    }

    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn muscle(mut self, muscle: impl Into<String>) -> Self {
        self.muscle = Some(muscle.into());
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn matches(&self, exercise: &ExerciseDefinition) -> bool {
        if let Some(ref categories) = self.categories {
            if !categories.contains(&exercise.category) {
                return false;
            }
        }
        if let Some(difficulty) = self.difficulty {
            if exercise.difficulty != difficulty {
                return false;
            }
        }
        if let Some(ref muscle) = self.muscle {
            if !exercise.targets(muscle) {
                return false;
            }
        }
        if let Some(ref term) = self.search {
            let term = term.to_lowercase();
            let hit = exercise.name.to_lowercase().contains(&term)
                || exercise.category.as_str().contains(&term)
                || exercise.target_muscles.iter().any(|m| m.contains(&term));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog with built-in exercise definitions
///
/// **Note**: For read-only use, prefer `get_default_catalog()` which returns a
/// cached reference. This function is for callers that extend the catalog.
pub fn build_default_catalog() -> Catalog {
    build_default_catalog_internal()
}

impl Catalog {
    pub fn new(exercises: impl IntoIterator<Item = ExerciseDefinition>) -> Self {
        Self {
            exercises: exercises.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ExerciseDefinition> {
        self.exercises.get(id)
    }

    /// Add custom exercises, replacing built-ins that share an id
    pub fn extend(&mut self, custom: &[ExerciseDefinition]) {
        for exercise in custom {
            if self.exercises.contains_key(&exercise.id) {
                tracing::info!("Custom exercise '{}' overrides built-in", exercise.id);
            }
            self.exercises.insert(exercise.id.clone(), exercise.clone());
        }
    }

    /// The built-in catalog plus `custom`, rejected if the result is inconsistent
    pub fn with_custom(custom: &[ExerciseDefinition]) -> Result<Self> {
        if custom.is_empty() {
            return Ok(get_default_catalog().clone());
        }

        let mut catalog = build_default_catalog();
        catalog.extend(custom);

        let errors = catalog.validate();
        if !errors.is_empty() {
            return Err(Error::CatalogValidation(errors.join("; ")));
        }
        tracing::info!("Catalog has {} exercises ({} custom)", catalog.len(), custom.len());
        Ok(catalog)
    }

    /// List exercises matching the filter, sorted by id
    pub fn list_exercises(&self, filter: &ExerciseFilter) -> Vec<&ExerciseDefinition> {
        let mut found: Vec<_> = self.exercises.values().filter(|e| filter.matches(e)).collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    /// Validate the catalog for consistency and completeness
    ///
    /// Returns a list of validation errors, or empty Vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (id, exercise) in &self.exercises {
            if id.is_empty() || exercise.id.is_empty() {
                errors.push("Exercise has empty ID".to_string());
            }
            if id != &exercise.id {
                errors.push(format!(
                    "Exercise key '{}' doesn't match exercise.id '{}'",
                    id, exercise.id
                ));
            }
            if exercise.name.is_empty() {
                errors.push(format!("Exercise '{}' has empty name", id));
            }
            match exercise.cost {
                CostModel::Timed { seconds } if seconds == 0 => {
                    errors.push(format!("Exercise '{}' has zero duration", id));
                }
                CostModel::Reps { reps, sets } if reps == 0 || sets == 0 => {
                    errors.push(format!("Exercise '{}' has zero reps or sets", id));
                }
                _ => {}
            }
        }

        for category in [Category::Cardio, Category::Strength, Category::Flexibility] {
            if !self.exercises.values().any(|e| e.category == category) {
                errors.push(format!("Catalog has no {} exercises", category));
            }
        }

        errors
    }
}

fn timed(
    id: &str,
    name: &str,
    category: Category,
    difficulty: Difficulty,
    seconds: u32,
    calories: u32,
    muscles: &[&str],
) -> ExerciseDefinition {
    ExerciseDefinition {
        id: id.into(),
        name: name.into(),
        category,
        difficulty,
        cost: CostModel::Timed { seconds },
        calories_per_unit: calories,
        target_muscles: muscle_set(muscles),
    }
}

#[allow(clippy::too_many_arguments)]
fn reps(
    id: &str,
    name: &str,
    category: Category,
    difficulty: Difficulty,
    reps: u32,
    sets: u32,
    calories: u32,
    muscles: &[&str],
) -> ExerciseDefinition {
    ExerciseDefinition {
        id: id.into(),
        name: name.into(),
        category,
        difficulty,
        cost: CostModel::Reps { reps, sets },
        calories_per_unit: calories,
        target_muscles: muscle_set(muscles),
    }
}

fn muscle_set(muscles: &[&str]) -> BTreeSet<String> {
    muscles.iter().map(|m| m.to_string()).collect()
}

/// Internal function that actually builds the catalog
fn build_default_catalog_internal() -> Catalog {
    use Category::*;
    use Difficulty::*;

    Catalog::new(vec![
        // ====================================================================
        // Cardio
        // ====================================================================
        timed("jumping-jacks", "Jumping Jacks", Cardio, Beginner, 45, 10, &["full-body", "calves"]),
        timed("high-knees", "High Knees", Cardio, Beginner, 30, 8, &["quadriceps", "core"]),
        timed("butt-kicks", "Butt Kicks", Cardio, Beginner, 30, 7, &["hamstrings", "calves"]),
        timed("mountain-climbers", "Mountain Climbers", Cardio, Beginner, 30, 10, &["core", "shoulders"]),
        timed("skater-hops", "Skater Hops", Cardio, Intermediate, 40, 12, &["glutes", "quadriceps"]),
        timed("jump-rope", "Jump Rope", Cardio, Intermediate, 60, 15, &["calves", "shoulders"]),
        timed("lateral-shuffles", "Lateral Shuffles", Cardio, Intermediate, 40, 10, &["glutes", "quadriceps"]),
        timed("tuck-jumps", "Tuck Jumps", Cardio, Advanced, 30, 14, &["quadriceps", "core"]),
        timed("sprint-in-place", "Sprint in Place", Cardio, Advanced, 45, 16, &["quadriceps", "hamstrings"]),
        // ====================================================================
        // Full body
        // ====================================================================
        reps("inchworms", "Inchworms", FullBody, Beginner, 6, 2, 8, &["hamstrings", "shoulders", "core"]),
        timed("bear-crawl", "Bear Crawl", FullBody, Beginner, 30, 9, &["shoulders", "core", "quadriceps"]),
        reps("burpees", "Burpees", FullBody, Intermediate, 10, 3, 15, &["chest", "quadriceps", "core"]),
        timed("plank-jacks", "Plank Jacks", FullBody, Intermediate, 40, 11, &["core", "shoulders"]),
        reps("man-makers", "Man Makers", FullBody, Advanced, 8, 3, 20, &["chest", "back", "quadriceps"]),
        reps("turkish-get-up", "Turkish Get-up", FullBody, Advanced, 3, 2, 12, &["shoulders", "core", "glutes"]),
        // ====================================================================
        // Strength
        // ====================================================================
        reps("push-ups", "Push-ups", Strength, Beginner, 15, 3, 8, &["chest", "shoulders", "triceps", "core"]),
        reps("squats", "Bodyweight Squats", Strength, Beginner, 20, 3, 10, &["quadriceps", "glutes", "hamstrings"]),
        reps("lunges", "Forward Lunges", Strength, Beginner, 12, 3, 8, &["quadriceps", "glutes", "hamstrings"]),
        reps("glute-bridge", "Glute Bridge", Strength, Beginner, 15, 3, 6, &["glutes", "hamstrings", "core"]),
        timed("plank", "Plank Hold", Strength, Beginner, 45, 5, &["core", "shoulders"]),
        reps("deadlifts", "Deadlifts", Strength, Intermediate, 8, 3, 80, &["hamstrings", "glutes", "back"]),
        reps("pike-push-ups", "Pike Push-ups", Strength, Intermediate, 10, 3, 9, &["shoulders", "triceps"]),
        reps("bulgarian-split-squat", "Bulgarian Split Squat", Strength, Intermediate, 10, 3, 10, &["quadriceps", "glutes"]),
        reps("diamond-push-ups", "Diamond Push-ups", Strength, Intermediate, 12, 3, 9, &["chest", "triceps"]),
        reps("pull-ups", "Pull-ups", Strength, Advanced, 8, 3, 55, &["back", "biceps", "shoulders"]),
        reps("pistol-squats", "Pistol Squats", Strength, Advanced, 6, 3, 12, &["quadriceps", "glutes", "core"]),
        reps("archer-push-ups", "Archer Push-ups", Strength, Advanced, 8, 3, 11, &["chest", "triceps", "shoulders"]),
        reps("dips", "Parallel Bar Dips", Strength, Advanced, 12, 3, 10, &["chest", "triceps"]),
        // ====================================================================
        // Flexibility
        // ====================================================================
        timed("hamstring-stretch", "Standing Hamstring Stretch", Flexibility, Beginner, 60, 3, &["hamstrings"]),
        timed("cat-cow", "Cat-Cow", Flexibility, Beginner, 45, 3, &["back", "core"]),
        timed("childs-pose", "Child's Pose", Flexibility, Beginner, 60, 2, &["back", "shoulders"]),
        timed("hip-flexor-stretch", "Kneeling Hip Flexor Stretch", Flexibility, Beginner, 60, 3, &["hip-flexors"]),
        timed("worlds-greatest-stretch", "World's Greatest Stretch", Flexibility, Intermediate, 60, 5, &["hip-flexors", "hamstrings", "back"]),
        timed("pigeon-pose", "Pigeon Pose", Flexibility, Intermediate, 60, 4, &["glutes", "hip-flexors"]),
        timed("downward-dog", "Downward Dog", Flexibility, Intermediate, 45, 4, &["hamstrings", "calves", "shoulders"]),
        timed("thread-the-needle", "Thread the Needle", Flexibility, Intermediate, 45, 3, &["back", "shoulders"]),
        reps("cossack-squat", "Cossack Squat", Flexibility, Advanced, 8, 2, 6, &["adductors", "glutes"]),
        timed("wheel-pose", "Wheel Pose", Flexibility, Advanced, 30, 5, &["back", "shoulders", "hip-flexors"]),
        reps("jefferson-curl", "Jefferson Curl", Flexibility, Advanced, 8, 2, 5, &["hamstrings", "back"]),
        timed("deep-squat-hold", "Deep Squat Hold", Flexibility, Advanced, 60, 4, &["hip-flexors", "adductors"]),
    ])
}
