//! Weekly planning: one generated workout per day, Monday through Sunday.

use crate::catalog::Catalog;
use crate::config::GenerationConfig;
use crate::generator::{generate, GenerateOverrides};
use crate::{Error, GeneratedWorkout, Result, SessionRecord, UserProfile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayPlan {
    pub day_name: String,
    pub workout: GeneratedWorkout,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    completed_session: Option<Uuid>,
}

impl DayPlan {
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Id of the session record that completed this day
    pub fn completed_session(&self) -> Option<Uuid> {
        self.completed_session
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeeklyPlan {
    pub generated_at: DateTime<Utc>,
    days: Vec<DayPlan>,
}

/// Generate a workout for each day of the week
///
/// Days are independent generator calls. With a seed, day `i` uses
/// `seed + i`, which varies the order of exercises across the week; without
/// one every day comes out the same.
pub fn generate_week(
    catalog: &Catalog,
    profile: &UserProfile,
    config: &GenerationConfig,
    seed: Option<u64>,
) -> Result<WeeklyPlan> {
    let mut days = Vec::with_capacity(DAY_NAMES.len());
    for (i, day_name) in DAY_NAMES.iter().enumerate() {
        let overrides = GenerateOverrides {
            seed: seed.map(|s| s.wrapping_add(i as u64)),
            ..GenerateOverrides::default()
        };
        let workout = generate(catalog, profile, &overrides, config)?;
        tracing::debug!("{}: {} exercises", day_name, workout.len());
        days.push(DayPlan {
            day_name: day_name.to_string(),
            workout,
            completed: false,
            completed_session: None,
        });
    }

    tracing::info!("Generated weekly plan");
    Ok(WeeklyPlan {
        generated_at: Utc::now(),
        days,
    })
}

impl WeeklyPlan {
    pub fn days(&self) -> &[DayPlan] {
        &self.days
    }

    /// Look up a day index by name or three-letter prefix, case-insensitive
    pub fn day_index(name: &str) -> Option<usize> {
        let name = name.trim().to_lowercase();
        if name.len() < 3 {
            return None;
        }
        DAY_NAMES
            .iter()
            .position(|d| d.to_lowercase().starts_with(&name))
    }

    pub fn day(&self, name: &str) -> Option<&DayPlan> {
        Self::day_index(name).and_then(|i| self.days.get(i))
    }

    /// First day not yet completed
    pub fn next_incomplete(&self) -> Option<(usize, &DayPlan)> {
        self.days.iter().enumerate().find(|(_, d)| !d.completed)
    }

    pub fn completed_count(&self) -> usize {
        self.days.iter().filter(|d| d.completed).count()
    }

    /// Mark a day done with the record of the session that performed it
    ///
    /// The record must cover exactly that day's exercises, in order.
    pub fn mark_completed(&mut self, day_index: usize, record: &SessionRecord) -> Result<()> {
        let day = self
            .days
            .get_mut(day_index)
            .ok_or_else(|| Error::PlanMismatch(format!("No day at index {}", day_index)))?;

        let planned = day.workout.exercises().iter().map(|e| e.id.as_str());
        let performed = record.exercises.iter().map(|c| c.exercise.id.as_str());
        if !planned.eq(performed) {
            return Err(Error::PlanMismatch(format!(
                "Session {} does not match the workout planned for {}",
                record.id, day.day_name
            )));
        }

        day.completed = true;
        day.completed_session = Some(record.id);
        tracing::info!("Marked {} completed by session {}", day.day_name, record.id);
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::state::save_json(path, self)
    }

    /// Load a stored plan; `None` if missing, unreadable or not a full week
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match crate::state::load_json::<WeeklyPlan>(path)? {
            Some(plan) if plan.days.len() == DAY_NAMES.len() => Ok(Some(plan)),
            Some(plan) => {
                tracing::warn!(
                    "Ignoring plan at {:?} with {} days",
                    path,
                    plan.days.len()
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::get_default_catalog;
    use crate::CompletedExercise;

    fn profile() -> UserProfile {
        UserProfile::new("general", "beginner", 15)
    }

    fn record_for(workout: &GeneratedWorkout) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: Uuid::new_v4(),
            workout_id: workout.id(),
            exercises: workout
                .exercises()
                .iter()
                .map(|e| CompletedExercise {
                    exercise: e.clone(),
                    completed_at: now,
                    time_spent_seconds: e.cost_seconds(),
                    skipped: false,
                })
                .collect(),
            started_at: now,
            completed_at: now,
            total_duration_seconds: workout.total_duration_seconds(),
            total_duration_minutes: workout.total_duration_seconds() / 60,
            calories_burned: workout.estimated_calories(),
            rating: 4,
        }
    }

    #[test]
    fn test_week_has_seven_incomplete_days() {
        let plan = generate_week(
            get_default_catalog(),
            &profile(),
            &GenerationConfig::default(),
            None,
        )
        .unwrap();

        assert_eq!(plan.days().len(), 7);
        let names: Vec<_> = plan.days().iter().map(|d| d.day_name.as_str()).collect();
        assert_eq!(names, DAY_NAMES.to_vec());
        for day in plan.days() {
            assert!(!day.is_completed());
            assert!(!day.workout.is_empty());
        }
        assert_eq!(plan.completed_count(), 0);
    }

    #[test]
    fn test_seeded_week_is_reproducible() {
        let config = GenerationConfig::default();
        let a = generate_week(get_default_catalog(), &profile(), &config, Some(7)).unwrap();
        let b = generate_week(get_default_catalog(), &profile(), &config, Some(7)).unwrap();

        for (x, y) in a.days().iter().zip(b.days()) {
            let xs: Vec<_> = x.workout.exercises().iter().map(|e| &e.id).collect();
            let ys: Vec<_> = y.workout.exercises().iter().map(|e| &e.id).collect();
            assert_eq!(xs, ys);
        }
    }

    #[test]
    fn test_incomplete_profile_fails_whole_week() {
        let profile = UserProfile {
            fitness_goal: None,
            ..profile()
        };
        let result = generate_week(
            get_default_catalog(),
            &profile,
            &GenerationConfig::default(),
            None,
        );
        assert!(matches!(result, Err(Error::ProfileIncomplete(_))));
    }

    #[test]
    fn test_mark_completed_requires_matching_record() {
        let mut plan = generate_week(
            get_default_catalog(),
            &UserProfile::new("flexibility", "beginner", 10),
            &GenerationConfig::default(),
            Some(1),
        )
        .unwrap();

        let mut wrong = record_for(&plan.days()[2].workout);
        wrong.exercises.pop();
        assert!(matches!(
            plan.mark_completed(2, &wrong),
            Err(Error::PlanMismatch(_))
        ));
        assert!(!plan.days()[2].is_completed());

        let record = record_for(&plan.days()[2].workout);
        plan.mark_completed(2, &record).unwrap();
        assert!(plan.days()[2].is_completed());
        assert_eq!(plan.days()[2].completed_session(), Some(record.id));
        assert_eq!(plan.next_incomplete().unwrap().0, 0);

        assert!(matches!(
            plan.mark_completed(7, &record),
            Err(Error::PlanMismatch(_))
        ));
    }

    #[test]
    fn test_day_lookup() {
        assert_eq!(WeeklyPlan::day_index("monday"), Some(0));
        assert_eq!(WeeklyPlan::day_index("Wed"), Some(2));
        assert_eq!(WeeklyPlan::day_index("SUNDAY"), Some(6));
        assert_eq!(WeeklyPlan::day_index("s"), None);
        assert_eq!(WeeklyPlan::day_index("funday"), None);
    }

    #[test]
    fn test_save_and_load_keeps_completion() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("week.json");

        let mut plan = generate_week(
            get_default_catalog(),
            &profile(),
            &GenerationConfig::default(),
            Some(3),
        )
        .unwrap();
        let record = record_for(&plan.days()[0].workout);
        plan.mark_completed(0, &record).unwrap();
        plan.save(&path).unwrap();

        let loaded = WeeklyPlan::load(&path).unwrap().unwrap();
        assert_eq!(loaded, plan);
        assert!(loaded.day("mon").unwrap().is_completed());
        assert!(!loaded.day("tue").unwrap().is_completed());
    }

    #[test]
    fn test_load_rejects_partial_week() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("week.json");
        std::fs::write(&path, r#"{"generated_at":"2026-01-05T00:00:00Z","days":[]}"#).unwrap();

        assert_eq!(WeeklyPlan::load(&path).unwrap(), None);
    }
}
