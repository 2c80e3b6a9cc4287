//! Workout generator.
//!
//! Turns a user profile into an ordered, time-boxed workout:
//! - Resolve goal, difficulty and time budget (with fallbacks for unknown input)
//! - Build a candidate pool, relaxing difficulty before category
//! - Balance the pool across categories or focus muscle groups
//! - Fill the time budget by cycling the pool as circuit rounds

use crate::catalog::{Catalog, ExerciseFilter};
use crate::config::{GenerationConfig, GoalRule};
use crate::{Category, Difficulty, Error, ExerciseDefinition, FitnessGoal, GeneratedWorkout, Result, UserProfile};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Per-call adjustments on top of the stored profile
#[derive(Clone, Debug, Default)]
pub struct GenerateOverrides {
    /// Produce a variant at this difficulty instead of the profile's level
    pub difficulty: Option<Difficulty>,
    /// Replace the profile's available time
    pub available_time_minutes: Option<u32>,
    /// Shuffle the pool deterministically before balancing
    pub seed: Option<u64>,
}

/// Fully resolved generation request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct WorkoutRequest {
    goal: FitnessGoal,
    difficulty: Difficulty,
    minutes: u32,
}

/// Generate a workout for the given profile
///
/// ## Selection
///
/// 1. **Pool**: catalog entries whose category belongs to the goal's rule and
///    whose difficulty matches. Pools smaller than `min_pool_size` pull in the
///    next difficulty from the fallback order. The category filter is dropped
///    only when no difficulty yields anything.
///
/// 2. **Balance**: round-robin across the rule's categories, or across its
///    focus muscle groups when it has any.
///
/// 3. **Fill**: cycle the balanced pool until the accumulated cost reaches the
///    time budget. The final exercise may overshoot by at most its own cost.
pub fn generate(
    catalog: &Catalog,
    profile: &UserProfile,
    overrides: &GenerateOverrides,
    config: &GenerationConfig,
) -> Result<GeneratedWorkout> {
    let request = resolve_request(profile, overrides)?;
    let rule = config.goals.for_goal(request.goal);

    tracing::info!(
        "Generating {} workout at {} for {} minutes",
        request.goal,
        request.difficulty,
        request.minutes
    );

    let mut pool = build_pool(catalog, rule, request.difficulty, config)?;

    if let Some(seed) = overrides.seed {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        pool.shuffle(&mut rng);
    }

    let balanced = balance(pool, rule);
    let exercises = fill_budget(&balanced, request.minutes.saturating_mul(60), config.max_exercises);

    let workout = GeneratedWorkout::new(request.goal, request.difficulty, exercises);
    tracing::debug!(
        "Generated {} exercises, {}s, {} kcal",
        workout.len(),
        workout.total_duration_seconds(),
        workout.estimated_calories()
    );
    Ok(workout)
}

/// Resolve the profile and overrides into a concrete request
fn resolve_request(profile: &UserProfile, overrides: &GenerateOverrides) -> Result<WorkoutRequest> {
    let mut missing = profile.missing_fields();
    if overrides.difficulty.is_some() {
        missing.retain(|f| f != "fitness_level");
    }
    if overrides.available_time_minutes.is_some() {
        missing.retain(|f| f != "available_time_minutes");
    }
    if !missing.is_empty() {
        return Err(Error::ProfileIncomplete(missing));
    }

    let raw_goal = profile.fitness_goal.as_deref().unwrap_or_default();
    let goal = raw_goal.parse().unwrap_or_else(|_| {
        tracing::warn!("Unknown fitness goal '{}', using general rules", raw_goal);
        FitnessGoal::General
    });

    let difficulty = match overrides.difficulty {
        Some(difficulty) => difficulty,
        None => {
            let raw_level = profile.fitness_level.as_deref().unwrap_or_default();
            raw_level.parse().unwrap_or_else(|_| {
                tracing::warn!("Unknown fitness level '{}', using beginner", raw_level);
                Difficulty::Beginner
            })
        }
    };

    let minutes = overrides
        .available_time_minutes
        .or(profile.available_time_minutes)
        .unwrap_or_default();

    Ok(WorkoutRequest {
        goal,
        difficulty,
        minutes,
    })
}

/// Collect candidates, relaxing difficulty first and category last
fn build_pool<'a>(
    catalog: &'a Catalog,
    rule: &GoalRule,
    requested: Difficulty,
    config: &GenerationConfig,
) -> Result<Vec<&'a ExerciseDefinition>> {
    if catalog.is_empty() {
        return Err(Error::EmptyCatalog);
    }

    let order = config.difficulty_fallback.order_for(requested);

    let mut pool = collect_by_difficulty(
        catalog,
        Some(rule.categories.as_slice()),
        &order,
        config.min_pool_size,
    );

    if pool.is_empty() {
        tracing::warn!(
            "No {:?} exercises at any difficulty, relaxing category filter",
            rule.categories
        );
        pool = collect_by_difficulty(catalog, None, &order, config.min_pool_size);
    }

    if pool.is_empty() {
        return Err(Error::EmptyCatalog);
    }

    Ok(pool)
}

fn collect_by_difficulty<'a>(
    catalog: &'a Catalog,
    categories: Option<&[Category]>,
    order: &[Difficulty],
    min_pool_size: usize,
) -> Vec<&'a ExerciseDefinition> {
    let mut pool = Vec::new();

    for (step, difficulty) in order.iter().enumerate() {
        if !pool.is_empty() && pool.len() >= min_pool_size {
            break;
        }

        let mut filter = ExerciseFilter::new().difficulty(*difficulty);
        if let Some(categories) = categories {
            filter = filter.categories(categories);
        }

        let found: Vec<_> = catalog
            .list_exercises(&filter)
            .into_iter()
            .filter(|e| e.cost_seconds() > 0)
            .collect();

        if step > 0 && !found.is_empty() {
            tracing::info!(
                "Pool too small ({} < {}), adding {} {} exercises",
                pool.len(),
                min_pool_size,
                found.len(),
                difficulty
            );
        }
        pool.extend(found);
    }

    pool
}

/// Interleave the pool round-robin across the rule's balancing groups
fn balance<'a>(pool: Vec<&'a ExerciseDefinition>, rule: &GoalRule) -> Vec<&'a ExerciseDefinition> {
    let group_count = if rule.focus_muscles.is_empty() {
        rule.categories.len()
    } else {
        rule.focus_muscles.len()
    };

    // Last bucket collects anything outside the rule's groups
    let mut buckets: Vec<Vec<&ExerciseDefinition>> = vec![Vec::new(); group_count + 1];
    for exercise in pool {
        let key = if rule.focus_muscles.is_empty() {
            rule.categories.iter().position(|c| *c == exercise.category)
        } else {
            rule.focus_muscles.iter().position(|m| exercise.targets(m))
        };
        buckets[key.unwrap_or(group_count)].push(exercise);
    }

    let longest = buckets.iter().map(Vec::len).max().unwrap_or(0);
    let mut balanced = Vec::new();
    for round in 0..longest {
        for bucket in &buckets {
            if let Some(exercise) = bucket.get(round) {
                balanced.push(*exercise);
            }
        }
    }
    balanced
}

/// Cycle through the ordered pool until the time budget is reached
fn fill_budget(
    ordered: &[&ExerciseDefinition],
    budget_seconds: u32,
    max_exercises: usize,
) -> Vec<ExerciseDefinition> {
    let mut selected = Vec::new();
    let mut total = 0u32;

    for exercise in ordered.iter().cycle() {
        if selected.len() >= max_exercises.max(1) {
            break;
        }
        if !selected.is_empty() && total >= budget_seconds {
            break;
        }
        total = total.saturating_add(exercise.cost_seconds());
        selected.push((*exercise).clone());
    }

    selected
}
