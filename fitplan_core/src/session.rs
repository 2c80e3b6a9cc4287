//! Session engine: drives a generated workout exercise by exercise.
//!
//! The engine is a synchronous state machine. Time only moves when the caller
//! feeds it `tick()` events (one per second), so the whole session can be
//! replayed deterministically without a real clock.
//!
//! ```text
//! Briefing --start--> Running <--pause/resume--> Paused
//! Running --complete/skip/countdown--> Advancing --rest over--> Running
//! Running --complete/skip on last--> Completed --rate+submit--> Submitted
//! any non-terminal --exit--> Aborted
//! ```

use crate::clock::{Clock, SystemClock};
use crate::lock::SessionGuard;
use crate::{
    CompletedExercise, CostModel, Error, ExerciseDefinition, GeneratedWorkout, Result,
    SessionRecord,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lifecycle phase of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// Workout shown, not started
    Briefing,
    Running,
    Paused,
    /// Rest beat between two exercises
    Advancing,
    /// All exercises done, waiting for a rating
    Completed,
    /// Record emitted; terminal
    Submitted,
    /// Exited early; terminal, nothing recorded
    Aborted,
}

/// User-facing actions, used to report what is currently available
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionAction {
    Start,
    Pause,
    Resume,
    CompleteExercise,
    Skip,
    Rate,
    Submit,
    Exit,
}

/// The single active timer for the current exercise
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExerciseTimer {
    /// Counts down to zero, then completes the exercise
    Countdown { remaining_seconds: u32 },
    /// Rep target; only completed manually
    Reps { reps: u32, sets: u32 },
}

impl ExerciseTimer {
    fn for_exercise(exercise: &ExerciseDefinition) -> Self {
        match exercise.cost {
            CostModel::Timed { seconds } => ExerciseTimer::Countdown {
                remaining_seconds: seconds,
            },
            CostModel::Reps { reps, sets } => ExerciseTimer::Reps { reps, sets },
        }
    }
}

/// Transient state of one workout attempt
#[derive(Clone, Debug)]
pub struct SessionState {
    pub current_index: usize,
    pub timer: ExerciseTimer,
    pub exercise_elapsed_seconds: u32,
    pub total_elapsed_seconds: u32,
    pub rest_remaining_seconds: u32,
    pub completed_exercises: Vec<CompletedExercise>,
    pub started_at: DateTime<Utc>,
}

/// Notable transitions, returned to the caller for display
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    ExerciseStarted { index: usize },
    ExerciseFinished { index: usize, skipped: bool },
    RestStarted { next_index: usize, seconds: u32 },
    WorkoutCompleted,
}

pub struct SessionEngine<C: Clock = SystemClock> {
    workout: GeneratedWorkout,
    phase: SessionPhase,
    state: Option<SessionState>,
    rating: Option<u8>,
    rest_seconds: u32,
    guard: Option<SessionGuard>,
    clock: C,
}

impl SessionEngine<SystemClock> {
    pub fn new(workout: GeneratedWorkout, rest_seconds: u32) -> Result<Self> {
        Self::with_clock(workout, rest_seconds, SystemClock)
    }
}

impl<C: Clock> SessionEngine<C> {
    pub fn with_clock(workout: GeneratedWorkout, rest_seconds: u32, clock: C) -> Result<Self> {
        if workout.is_empty() {
            return Err(Error::Other("Cannot run a workout with no exercises".into()));
        }

        Ok(Self {
            workout,
            phase: SessionPhase::Briefing,
            state: None,
            rating: None,
            rest_seconds,
            guard: None,
            clock,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn workout(&self) -> &GeneratedWorkout {
        &self.workout
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    pub fn rating(&self) -> Option<u8> {
        self.rating
    }

    /// The exercise being performed (or rested toward)
    pub fn current_exercise(&self) -> Option<&ExerciseDefinition> {
        match self.phase {
            SessionPhase::Running | SessionPhase::Paused | SessionPhase::Advancing => self
                .state
                .as_ref()
                .and_then(|s| self.workout.exercises().get(s.current_index)),
            _ => None,
        }
    }

    /// Seconds left on the current countdown, if the exercise is timed
    pub fn remaining_seconds(&self) -> Option<u32> {
        match self.state.as_ref()?.timer {
            ExerciseTimer::Countdown { remaining_seconds } => Some(remaining_seconds),
            ExerciseTimer::Reps { .. } => None,
        }
    }

    /// Whether `action` is currently available
    pub fn is_enabled(&self, action: SessionAction) -> bool {
        use SessionPhase::*;
        match action {
            SessionAction::Start => self.phase == Briefing,
            SessionAction::Pause => self.phase == Running,
            SessionAction::Resume => self.phase == Paused,
            SessionAction::CompleteExercise | SessionAction::Skip => self.phase == Running,
            SessionAction::Rate => self.phase == Completed,
            SessionAction::Submit => self.phase == Completed && self.rating.is_some(),
            SessionAction::Exit => !matches!(self.phase, Submitted | Aborted),
        }
    }

    fn ensure(&self, action: SessionAction) -> Result<()> {
        if self.is_enabled(action) {
            Ok(())
        } else {
            Err(Error::ActionDisabled {
                action,
                phase: self.phase,
            })
        }
    }

    /// Begin the workout; the guard is held until submit or exit
    pub fn start(&mut self, guard: SessionGuard) -> Result<Vec<SessionEvent>> {
        self.ensure(SessionAction::Start)?;

        let first = &self.workout.exercises()[0];
        self.state = Some(SessionState {
            current_index: 0,
            timer: ExerciseTimer::for_exercise(first),
            exercise_elapsed_seconds: 0,
            total_elapsed_seconds: 0,
            rest_remaining_seconds: 0,
            completed_exercises: Vec::with_capacity(self.workout.len()),
            started_at: self.clock.now(),
        });
        self.guard = Some(guard);
        self.phase = SessionPhase::Running;

        tracing::info!(
            "Session started: {} exercises, workout {}",
            self.workout.len(),
            self.workout.id()
        );
        Ok(vec![SessionEvent::ExerciseStarted { index: 0 }])
    }

    /// Advance time by one second
    ///
    /// Only `Running` and `Advancing` consume ticks; in every other phase this
    /// is a no-op.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        match self.phase {
            SessionPhase::Running => {
                let Some(state) = self.state.as_mut() else {
                    return Vec::new();
                };
                state.total_elapsed_seconds += 1;
                state.exercise_elapsed_seconds += 1;

                let expired = match &mut state.timer {
                    ExerciseTimer::Countdown { remaining_seconds } => {
                        *remaining_seconds = remaining_seconds.saturating_sub(1);
                        *remaining_seconds == 0
                    }
                    ExerciseTimer::Reps { .. } => false,
                };

                if expired {
                    self.finish_current(false)
                } else {
                    Vec::new()
                }
            }
            SessionPhase::Advancing => {
                let Some(state) = self.state.as_mut() else {
                    return Vec::new();
                };
                state.total_elapsed_seconds += 1;
                state.rest_remaining_seconds = state.rest_remaining_seconds.saturating_sub(1);

                if state.rest_remaining_seconds == 0 {
                    self.phase = SessionPhase::Running;
                    vec![SessionEvent::ExerciseStarted {
                        index: state.current_index,
                    }]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    pub fn pause(&mut self) -> Result<()> {
        self.ensure(SessionAction::Pause)?;
        self.phase = SessionPhase::Paused;
        tracing::info!("Session paused");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.ensure(SessionAction::Resume)?;
        self.phase = SessionPhase::Running;
        tracing::info!("Session resumed");
        Ok(())
    }

    /// Mark the current exercise as performed
    pub fn complete_exercise(&mut self) -> Result<Vec<SessionEvent>> {
        self.ensure(SessionAction::CompleteExercise)?;
        Ok(self.finish_current(false))
    }

    /// Move past the current exercise, recording only the time actually spent
    pub fn skip(&mut self) -> Result<Vec<SessionEvent>> {
        self.ensure(SessionAction::Skip)?;
        Ok(self.finish_current(true))
    }

    /// Snapshot the current exercise and move to the next one (or finish)
    fn finish_current(&mut self, skipped: bool) -> Vec<SessionEvent> {
        let now = self.clock.now();
        let Some(state) = self.state.as_mut() else {
            return Vec::new();
        };

        let index = state.current_index;
        let exercises = self.workout.exercises();
        state.completed_exercises.push(CompletedExercise {
            exercise: exercises[index].clone(),
            completed_at: now,
            time_spent_seconds: state.exercise_elapsed_seconds,
            skipped,
        });

        tracing::debug!(
            "Exercise {} ({}) {} after {}s",
            index,
            exercises[index].id,
            if skipped { "skipped" } else { "completed" },
            state.exercise_elapsed_seconds
        );

        let mut events = vec![SessionEvent::ExerciseFinished { index, skipped }];

        if index + 1 >= exercises.len() {
            self.phase = SessionPhase::Completed;
            tracing::info!(
                "Workout completed: {} exercises in {}s",
                state.completed_exercises.len(),
                state.total_elapsed_seconds
            );
            events.push(SessionEvent::WorkoutCompleted);
            return events;
        }

        // Replacing the timer is what stops the previous exercise's countdown
        let next_index = index + 1;
        state.current_index = next_index;
        state.timer = ExerciseTimer::for_exercise(&exercises[next_index]);
        state.exercise_elapsed_seconds = 0;

        if self.rest_seconds == 0 {
            self.phase = SessionPhase::Running;
            events.push(SessionEvent::ExerciseStarted { index: next_index });
        } else {
            state.rest_remaining_seconds = self.rest_seconds;
            self.phase = SessionPhase::Advancing;
            events.push(SessionEvent::RestStarted {
                next_index,
                seconds: self.rest_seconds,
            });
        }
        events
    }

    /// Set the session rating (1..=5); may be changed until submitted
    pub fn rate(&mut self, rating: u8) -> Result<()> {
        self.ensure(SessionAction::Rate)?;
        if !(1..=5).contains(&rating) {
            return Err(Error::InvalidRating(rating));
        }
        self.rating = Some(rating);
        Ok(())
    }

    /// Emit the session record; succeeds exactly once per session
    pub fn submit(&mut self) -> Result<SessionRecord> {
        self.ensure(SessionAction::Submit)?;

        let (Some(state), Some(rating)) = (self.state.take(), self.rating) else {
            return Err(Error::ActionDisabled {
                action: SessionAction::Submit,
                phase: self.phase,
            });
        };

        let calories_burned = state.completed_exercises.iter().map(|e| e.calories()).sum();
        let record = SessionRecord {
            id: Uuid::new_v4(),
            workout_id: self.workout.id(),
            exercises: state.completed_exercises,
            started_at: state.started_at,
            completed_at: self.clock.now(),
            total_duration_seconds: state.total_elapsed_seconds,
            total_duration_minutes: state.total_elapsed_seconds / 60,
            calories_burned,
            rating,
        };

        self.phase = SessionPhase::Submitted;
        self.guard = None;

        tracing::info!(
            "Session {} submitted: {} kcal, rating {}",
            record.id,
            record.calories_burned,
            record.rating
        );
        Ok(record)
    }

    /// Abandon the session; nothing is recorded
    pub fn exit(&mut self) -> Result<()> {
        self.ensure(SessionAction::Exit)?;

        let done = self
            .state
            .as_ref()
            .map_or(0, |s| s.completed_exercises.len());
        self.state = None;
        self.rating = None;
        self.guard = None;
        self.phase = SessionPhase::Aborted;

        tracing::info!("Session exited after {} exercises, discarded", done);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::{Category, Difficulty, FitnessGoal};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn timed(id: &str, seconds: u32, calories: u32) -> ExerciseDefinition {
        ExerciseDefinition {
            id: id.into(),
            name: id.into(),
            category: Category::Cardio,
            difficulty: Difficulty::Beginner,
            cost: CostModel::Timed { seconds },
            calories_per_unit: calories,
            target_muscles: BTreeSet::new(),
        }
    }

    fn reps(id: &str, reps: u32, sets: u32, calories: u32) -> ExerciseDefinition {
        ExerciseDefinition {
            cost: CostModel::Reps { reps, sets },
            category: Category::Strength,
            ..timed(id, 1, calories)
        }
    }

    fn workout(exercises: Vec<ExerciseDefinition>) -> GeneratedWorkout {
        GeneratedWorkout::new(FitnessGoal::General, Difficulty::Beginner, exercises)
    }

    fn engine(
        exercises: Vec<ExerciseDefinition>,
        rest: u32,
        clock: &ManualClock,
    ) -> SessionEngine<&ManualClock> {
        SessionEngine::with_clock(workout(exercises), rest, clock).unwrap()
    }

    fn guard(dir: &TempDir) -> SessionGuard {
        SessionGuard::acquire(dir.path(), "tester").unwrap()
    }

    /// Tick one second on both the engine and the wall clock
    fn tick(engine: &mut SessionEngine<&ManualClock>, clock: &ManualClock) -> Vec<SessionEvent> {
        clock.advance(1);
        engine.tick()
    }

    /// Run the session to completion, completing rep exercises by hand
    fn drive_to_completion(engine: &mut SessionEngine<&ManualClock>, clock: &ManualClock) {
        let mut guard_ticks = 0;
        while engine.phase() != SessionPhase::Completed {
            guard_ticks += 1;
            assert!(guard_ticks < 10_000, "session never completed");
            match (engine.phase(), engine.state().map(|s| s.timer)) {
                (SessionPhase::Running, Some(ExerciseTimer::Reps { .. })) => {
                    tick(engine, clock);
                    engine.complete_exercise().unwrap();
                }
                _ => {
                    tick(engine, clock);
                }
            }
        }
    }

    #[test]
    fn test_visits_every_exercise_once_in_order() {
        crate::logging::init_test();
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(Utc::now());
        let exercises = vec![timed("a", 3, 5), reps("b", 2, 1, 4), timed("c", 2, 3)];
        let mut engine = engine(exercises.clone(), 2, &clock);

        engine.start(guard(&dir)).unwrap();
        drive_to_completion(&mut engine, &clock);

        let state = engine.state().unwrap();
        let visited: Vec<_> = state
            .completed_exercises
            .iter()
            .map(|c| c.exercise.id.as_str())
            .collect();
        assert_eq!(visited, vec!["a", "b", "c"]);
        assert_eq!(state.completed_exercises.len(), exercises.len());
        assert!(state.completed_exercises.iter().all(|c| !c.skipped));
    }

    #[test]
    fn test_countdown_decreases_and_expires() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(Utc::now());
        let mut engine = engine(vec![timed("a", 3, 5), timed("b", 5, 5)], 2, &clock);
        engine.start(guard(&dir)).unwrap();

        assert_eq!(engine.remaining_seconds(), Some(3));
        assert!(tick(&mut engine, &clock).is_empty());
        assert_eq!(engine.remaining_seconds(), Some(2));
        assert!(tick(&mut engine, &clock).is_empty());
        assert_eq!(engine.remaining_seconds(), Some(1));

        let events = tick(&mut engine, &clock);
        assert_eq!(
            events,
            vec![
                SessionEvent::ExerciseFinished {
                    index: 0,
                    skipped: false
                },
                SessionEvent::RestStarted {
                    next_index: 1,
                    seconds: 2
                },
            ]
        );
        assert_eq!(engine.phase(), SessionPhase::Advancing);
        assert_eq!(engine.state().unwrap().completed_exercises[0].time_spent_seconds, 3);

        // next exercise's timer is armed but does not run during the rest beat
        assert_eq!(engine.remaining_seconds(), Some(5));
        assert!(tick(&mut engine, &clock).is_empty());
        assert_eq!(engine.remaining_seconds(), Some(5));
        assert_eq!(
            tick(&mut engine, &clock),
            vec![SessionEvent::ExerciseStarted { index: 1 }]
        );
        assert_eq!(engine.phase(), SessionPhase::Running);
    }

    #[test]
    fn test_rep_exercises_never_auto_complete() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(Utc::now());
        let mut engine = engine(vec![reps("a", 5, 2, 5)], 0, &clock);
        engine.start(guard(&dir)).unwrap();

        for _ in 0..100 {
            assert!(tick(&mut engine, &clock).is_empty());
        }
        assert_eq!(engine.phase(), SessionPhase::Running);
        assert_eq!(engine.remaining_seconds(), None);

        engine.complete_exercise().unwrap();
        assert_eq!(engine.phase(), SessionPhase::Completed);
        assert_eq!(engine.state().unwrap().completed_exercises[0].time_spent_seconds, 100);
    }

    #[test]
    fn test_pause_freezes_time() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(Utc::now());
        let mut engine = engine(vec![timed("a", 10, 5)], 0, &clock);
        engine.start(guard(&dir)).unwrap();

        tick(&mut engine, &clock);
        engine.pause().unwrap();
        assert!(!engine.is_enabled(SessionAction::Skip));
        assert!(engine.is_enabled(SessionAction::Resume));

        for _ in 0..5 {
            tick(&mut engine, &clock);
        }
        assert_eq!(engine.remaining_seconds(), Some(9));
        assert_eq!(engine.state().unwrap().total_elapsed_seconds, 1);

        engine.resume().unwrap();
        tick(&mut engine, &clock);
        assert_eq!(engine.remaining_seconds(), Some(8));
    }

    #[test]
    fn test_skip_records_actual_elapsed_time() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(Utc::now());
        let exercises: Vec<_> = (1..=5).map(|i| timed(&format!("ex{}", i), 30, 10)).collect();
        let mut engine = engine(exercises, 3, &clock);
        engine.start(guard(&dir)).unwrap();

        while engine.state().unwrap().current_index < 2 || engine.phase() != SessionPhase::Running
        {
            tick(&mut engine, &clock);
        }
        for _ in 0..7 {
            tick(&mut engine, &clock);
        }
        let events = engine.skip().unwrap();
        assert_eq!(
            events[0],
            SessionEvent::ExerciseFinished {
                index: 2,
                skipped: true
            }
        );

        drive_to_completion(&mut engine, &clock);

        let completed = &engine.state().unwrap().completed_exercises;
        assert_eq!(completed.len(), 5);
        assert_eq!(completed[2].time_spent_seconds, 7);
        assert!(completed[2].skipped);
        assert!(completed.iter().enumerate().all(|(i, c)| c.skipped == (i == 2)));

        engine.rate(4).unwrap();
        let record = engine.submit().unwrap();
        // four full exercises plus 7/30 of the skipped one
        assert_eq!(record.calories_burned, 40 + 2);
        assert_eq!(record.skipped_count(), 1);
    }

    #[test]
    fn test_rating_required_and_submitted_once() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(Utc::now());
        let mut engine = engine(vec![timed("a", 2, 5)], 0, &clock);

        assert!(!engine.is_enabled(SessionAction::Rate));
        assert!(matches!(
            engine.rate(5),
            Err(Error::ActionDisabled {
                action: SessionAction::Rate,
                phase: SessionPhase::Briefing
            })
        ));

        engine.start(guard(&dir)).unwrap();
        drive_to_completion(&mut engine, &clock);

        assert!(!engine.is_enabled(SessionAction::Submit));
        assert!(matches!(engine.submit(), Err(Error::ActionDisabled { .. })));
        assert!(matches!(engine.rate(0), Err(Error::InvalidRating(0))));
        assert!(matches!(engine.rate(6), Err(Error::InvalidRating(6))));
        assert!(!engine.is_enabled(SessionAction::Submit));

        engine.rate(5).unwrap();
        assert!(engine.is_enabled(SessionAction::Submit));
        let record = engine.submit().unwrap();
        assert_eq!(record.rating, 5);
        assert_eq!(engine.phase(), SessionPhase::Submitted);

        assert!(matches!(engine.submit(), Err(Error::ActionDisabled { .. })));
        assert!(!engine.is_enabled(SessionAction::Exit));
    }

    #[test]
    fn test_record_totals_and_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let start = Utc::now();
        let clock = ManualClock::new(start);
        let mut engine = engine(vec![timed("a", 40, 7), timed("b", 20, 3)], 5, &clock);
        let workout_id = engine.workout().id();

        engine.start(guard(&dir)).unwrap();
        drive_to_completion(&mut engine, &clock);
        engine.rate(3).unwrap();
        let record = engine.submit().unwrap();

        assert_eq!(record.workout_id, workout_id);
        assert_eq!(record.started_at, start);
        assert_eq!(record.total_duration_seconds, 40 + 5 + 20);
        assert_eq!(record.total_duration_minutes, 1);
        assert_eq!(record.calories_burned, 10);
        assert_eq!(record.completed_at - record.started_at, chrono::Duration::seconds(65));
    }

    #[test]
    fn test_exit_discards_state_and_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(Utc::now());
        let mut engine = engine(vec![timed("a", 5, 5), timed("b", 5, 5)], 0, &clock);
        engine.start(guard(&dir)).unwrap();

        for _ in 0..5 {
            tick(&mut engine, &clock);
        }
        assert_eq!(engine.state().unwrap().completed_exercises.len(), 1);
        assert!(SessionGuard::acquire(dir.path(), "tester").is_err());

        engine.exit().unwrap();
        assert_eq!(engine.phase(), SessionPhase::Aborted);
        assert!(engine.state().is_none());
        assert!(matches!(engine.submit(), Err(Error::ActionDisabled { .. })));
        assert!(matches!(engine.exit(), Err(Error::ActionDisabled { .. })));
        assert!(SessionGuard::acquire(dir.path(), "tester").is_ok());
    }

    #[test]
    fn test_disabled_actions_leave_state_untouched() {
        let clock = ManualClock::new(Utc::now());
        let mut engine = engine(vec![timed("a", 5, 5)], 0, &clock);

        assert!(engine.pause().is_err());
        assert!(engine.skip().is_err());
        assert!(engine.complete_exercise().is_err());
        assert!(engine.tick().is_empty());
        assert_eq!(engine.phase(), SessionPhase::Briefing);
        assert!(engine.state().is_none());
        assert!(engine.is_enabled(SessionAction::Start));
        assert!(engine.is_enabled(SessionAction::Exit));
    }

    #[test]
    fn test_zero_rest_goes_straight_to_next_exercise() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(Utc::now());
        let mut engine = engine(vec![reps("a", 1, 1, 1), timed("b", 5, 5)], 0, &clock);
        engine.start(guard(&dir)).unwrap();

        let events = engine.complete_exercise().unwrap();
        assert_eq!(events[1], SessionEvent::ExerciseStarted { index: 1 });
        assert_eq!(engine.phase(), SessionPhase::Running);
        assert_eq!(engine.current_exercise().unwrap().id, "b");
    }

    #[test]
    fn test_only_one_session_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(Utc::now());
        let mut first = engine(vec![timed("a", 5, 5)], 0, &clock);
        first.start(guard(&dir)).unwrap();

        let second = SessionGuard::acquire(dir.path(), "tester");
        assert!(matches!(second, Err(Error::SessionLocked(_))));
    }

    #[test]
    fn test_empty_workout_rejected() {
        assert!(SessionEngine::new(workout(vec![]), 3).is_err());
    }
}
