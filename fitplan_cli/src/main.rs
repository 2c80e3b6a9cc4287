use clap::{Parser, Subcommand};
use fitplan_core::progress::record_with_retry;
use fitplan_core::session::ExerciseTimer;
use fitplan_core::*;
use std::cell::Cell;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

/// Attempts made to save a session when nobody is around to answer a prompt
const AUTO_RETRY_ATTEMPTS: u32 = 3;

#[derive(Parser)]
#[command(name = "fitplan")]
#[command(about = "Personalized workout generator and session runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// User id (defaults to the configured user)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or update the fitness profile
    Profile {
        /// weight-loss, muscle-gain, flexibility or general
        #[arg(long)]
        goal: Option<String>,

        /// beginner, intermediate or advanced
        #[arg(long)]
        level: Option<String>,

        /// Available time per workout
        #[arg(long)]
        minutes: Option<u32>,
    },

    /// Generate and print a workout
    Generate {
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Show the stored weekly plan, generating one if needed
    Week {
        /// Replace the stored plan with a new one
        #[arg(long)]
        regenerate: bool,

        /// Seed for reproducible variety across days
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List catalog exercises
    Exercises {
        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        difficulty: Option<String>,

        #[arg(long)]
        muscle: Option<String>,

        /// Match against name, category and muscles
        #[arg(long)]
        search: Option<String>,
    },

    /// Run a workout session
    Run {
        /// Run this day's workout from the weekly plan
        #[arg(long)]
        day: Option<String>,

        #[command(flatten)]
        overrides: OverrideArgs,

        /// Complete every exercise without waiting (for testing); needs --rating
        #[arg(long, requires = "rating")]
        auto_complete: bool,

        /// Rating to submit (1-5); prompted for when omitted
        #[arg(long)]
        rating: Option<u8>,

        /// Show the workout without starting a session
        #[arg(long)]
        dry_run: bool,
    },

    /// Show lifetime progress
    Stats,

    /// Export session history to CSV
    Export {
        /// Output file (defaults to sessions.csv in the user's data directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct OverrideArgs {
    /// Generate at this difficulty instead of the profile's level
    #[arg(long)]
    difficulty: Option<String>,

    /// Time budget in minutes instead of the profile's
    #[arg(long)]
    minutes: Option<u32>,

    /// Seed for a reproducible exercise order
    #[arg(long)]
    seed: Option<u64>,
}

impl OverrideArgs {
    fn resolve(&self) -> Result<GenerateOverrides> {
        let difficulty = match &self.difficulty {
            Some(d) => Some(d.parse::<Difficulty>()?),
            None => None,
        };
        Ok(GenerateOverrides {
            difficulty,
            available_time_minutes: self.minutes,
            seed: self.seed,
        })
    }
}

/// Resolved locations and settings for one invocation
struct Context {
    data_dir: PathBuf,
    user: String,
    config: Config,
}

impl Context {
    fn profiles(&self) -> JsonProfileStore {
        JsonProfileStore::new(&self.data_dir)
    }

    fn progress(&self) -> JsonProgressStore {
        JsonProgressStore::new(&self.data_dir)
    }

    fn week_path(&self) -> PathBuf {
        self.progress().user_dir(&self.user).join("week.json")
    }

    fn lock_dir(&self) -> PathBuf {
        self.data_dir.join("locks")
    }

    fn catalog(&self) -> Result<Catalog> {
        Catalog::with_custom(&self.config.catalog.custom)
    }

    fn profile(&self) -> Result<UserProfile> {
        Ok(self.profiles().get_profile(&self.user)?.unwrap_or_default())
    }
}

fn main() -> Result<()> {
    fitplan_core::logging::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = Context {
        data_dir: cli
            .data_dir
            .clone()
            .unwrap_or_else(|| config.data.data_dir.clone()),
        user: cli.user.clone().unwrap_or_else(|| config.user.id.clone()),
        config,
    };
    tracing::debug!("Data dir {:?}, user '{}'", ctx.data_dir, ctx.user);

    match cli.command {
        Commands::Profile {
            goal,
            level,
            minutes,
        } => cmd_profile(&ctx, goal, level, minutes),
        Commands::Generate { overrides } => cmd_generate(&ctx, &overrides),
        Commands::Week { regenerate, seed } => cmd_week(&ctx, regenerate, seed),
        Commands::Exercises {
            category,
            difficulty,
            muscle,
            search,
        } => cmd_exercises(&ctx, category, difficulty, muscle, search),
        Commands::Run {
            day,
            overrides,
            auto_complete,
            rating,
            dry_run,
        } => cmd_run(&ctx, day, &overrides, auto_complete, rating, dry_run),
        Commands::Stats => cmd_stats(&ctx),
        Commands::Export { out } => cmd_export(&ctx, out),
    }
}

fn cmd_profile(
    ctx: &Context,
    goal: Option<String>,
    level: Option<String>,
    minutes: Option<u32>,
) -> Result<()> {
    let profile = if goal.is_none() && level.is_none() && minutes.is_none() {
        ctx.profile()?
    } else {
        if let Some(ref g) = goal {
            if g.parse::<FitnessGoal>().is_err() {
                eprintln!("Note: unknown goal '{}', general rules will be used", g);
            }
        }
        if let Some(ref l) = level {
            if l.parse::<Difficulty>().is_err() {
                eprintln!("Note: unknown level '{}', beginner will be used", l);
            }
        }
        ctx.profiles().update_profile(&ctx.user, |p| {
            if goal.is_some() {
                p.fitness_goal = goal;
            }
            if level.is_some() {
                p.fitness_level = level;
            }
            if minutes.is_some() {
                p.available_time_minutes = minutes;
            }
        })?
    };

    println!("Profile for '{}'", ctx.user);
    println!("  Goal:    {}", profile.fitness_goal.as_deref().unwrap_or("(not set)"));
    println!("  Level:   {}", profile.fitness_level.as_deref().unwrap_or("(not set)"));
    match profile.available_time_minutes {
        Some(m) => println!("  Minutes: {}", m),
        None => println!("  Minutes: (not set)"),
    }

    let missing = profile.missing_fields();
    if !missing.is_empty() {
        println!();
        println!("Missing: {}", missing.join(", "));
    }
    Ok(())
}

fn cmd_generate(ctx: &Context, overrides: &OverrideArgs) -> Result<()> {
    let catalog = ctx.catalog()?;
    let workout = generate(
        &catalog,
        &ctx.profile()?,
        &overrides.resolve()?,
        &ctx.config.generation,
    )
    .map_err(explain)?;

    print_workout(&workout);
    Ok(())
}

fn cmd_week(ctx: &Context, regenerate: bool, seed: Option<u64>) -> Result<()> {
    let path = ctx.week_path();

    let plan = match WeeklyPlan::load(&path)? {
        Some(plan) if !regenerate => plan,
        _ => {
            let catalog = ctx.catalog()?;
            let plan = generate_week(&catalog, &ctx.profile()?, &ctx.config.generation, seed)
                .map_err(explain)?;
            plan.save(&path)?;
            println!("✓ New weekly plan saved");
            plan
        }
    };

    println!();
    println!(
        "Week of {} ({}/7 done)",
        plan.generated_at.format("%Y-%m-%d"),
        plan.completed_count()
    );
    for day in plan.days() {
        println!(
            "  [{}] {:<10} {:>3} exercises  {:>3} min  {:>4} kcal",
            if day.is_completed() { "x" } else { " " },
            day.day_name,
            day.workout.len(),
            day.workout.total_duration_minutes(),
            day.workout.estimated_calories()
        );
    }
    match plan.next_incomplete() {
        Some((_, day)) => println!("\nNext up: {}", day.day_name),
        None => println!("\nAll days done. Use --regenerate for a new week."),
    }
    Ok(())
}

fn cmd_exercises(
    ctx: &Context,
    category: Option<String>,
    difficulty: Option<String>,
    muscle: Option<String>,
    search: Option<String>,
) -> Result<()> {
    let catalog = ctx.catalog()?;

    let mut filter = ExerciseFilter::new();
    if let Some(c) = category {
        filter = filter.categories(&[c.parse::<Category>()?]);
    }
    if let Some(d) = difficulty {
        filter = filter.difficulty(d.parse::<Difficulty>()?);
    }
    if let Some(m) = muscle {
        filter = filter.muscle(m);
    }
    if let Some(s) = search {
        filter = filter.search(s);
    }

    let found = catalog.list_exercises(&filter);
    for exercise in &found {
        println!(
            "{:<22} {:<26} {:<12} {:<13} {:>8} {:>4} kcal",
            exercise.id,
            exercise.name,
            exercise.category,
            exercise.difficulty,
            format_cost(exercise),
            exercise.calories_per_unit
        );
    }
    println!("{} exercises", found.len());
    Ok(())
}

fn cmd_run(
    ctx: &Context,
    day: Option<String>,
    overrides: &OverrideArgs,
    auto_complete: bool,
    rating: Option<u8>,
    dry_run: bool,
) -> Result<()> {
    let (workout, day_index) = match day {
        Some(name) => {
            let index = WeeklyPlan::day_index(&name)
                .ok_or_else(|| Error::Other(format!("Unknown day '{}'", name)))?;
            let plan = WeeklyPlan::load(&ctx.week_path())?.ok_or_else(|| {
                Error::Other("No weekly plan stored; run `fitplan week` first".into())
            })?;
            let day = plan
                .day(&name)
                .ok_or_else(|| Error::Other(format!("Unknown day '{}'", name)))?;
            if day.is_completed() {
                println!("{} is already completed; running it again.", day.day_name);
            }
            (day.workout.clone(), Some(index))
        }
        None => {
            let catalog = ctx.catalog()?;
            let workout = generate(
                &catalog,
                &ctx.profile()?,
                &overrides.resolve()?,
                &ctx.config.generation,
            )
            .map_err(explain)?;
            (workout, None)
        }
    };

    print_workout(&workout);

    if dry_run {
        println!("\n[Dry run - session not started]");
        return Ok(());
    }

    let guard = SessionGuard::acquire(&ctx.lock_dir(), &ctx.user).map_err(|e| {
        if let Error::SessionLocked(ref user) = e {
            eprintln!("A session is already running for '{}'.", user);
        }
        e
    })?;
    tracing::debug!("Session lock acquired for '{}'", guard.user_id());

    let rest = ctx.config.session.rest_seconds_for(workout.difficulty());
    let mut engine = SessionEngine::new(workout, rest)?;
    let console = if auto_complete {
        None
    } else {
        println!("Enter: done   s: skip   p: pause/resume   q: quit");
        Some(Console::spawn())
    };

    let events = engine.start(guard)?;
    report(&engine, &events);

    let finished = match &console {
        None => drive_auto(&mut engine)?,
        Some(console) => drive_interactive(&mut engine, console)?,
    };
    if !finished || !rate_session(&mut engine, rating, console.as_ref())? {
        engine.exit()?;
        println!("Session exited. Nothing was recorded.");
        return Ok(());
    }

    let record = engine.submit()?;
    let mut store = ctx.progress();
    let outcome = record_with_retry(&mut store, &ctx.user, &record, |e, attempt| match &console {
        None => {
            eprintln!("Saving failed (attempt {}): {}", attempt, e);
            attempt < AUTO_RETRY_ATTEMPTS
        }
        Some(console) => console.confirm(&format!("Saving failed: {}. Retry?", e)),
    })?;

    println!();
    match outcome {
        RecordOutcome::Recorded => println!("✓ Session logged!"),
        RecordOutcome::AlreadyRecorded => println!("✓ Session was already logged"),
    }
    println!(
        "  {} exercises ({} skipped), {} min, {} kcal, rated {}/5",
        record.exercises.len(),
        record.skipped_count(),
        record.total_duration_minutes,
        record.calories_burned,
        record.rating
    );

    if let Some(index) = day_index {
        let path = ctx.week_path();
        if let Some(mut plan) = WeeklyPlan::load(&path)? {
            match plan.mark_completed(index, &record) {
                Ok(()) => {
                    plan.save(&path)?;
                    println!("✓ {} marked complete", plan.days()[index].day_name);
                }
                Err(e) => eprintln!("Weekly plan not updated: {}", e),
            }
        }
    }
    Ok(())
}

fn cmd_stats(ctx: &Context) -> Result<()> {
    let store = ctx.progress();
    let progress = store.load_progress(&ctx.user)?;
    let now = chrono::Utc::now();
    let history = store.history(&ctx.user)?;
    let this_week = fitplan_core::history::recent(&history, now, 7).len();

    println!("Progress for '{}'", ctx.user);
    println!("  Workouts:        {}", progress.total_workouts);
    println!("  Calories burned: {} kcal", progress.total_calories_burned);
    println!("  Minutes trained: {}", progress.total_minutes);
    println!(
        "  Current streak:  {} days",
        progress.streak_on(now.date_naive())
    );
    println!("  Longest streak:  {} days", progress.longest_streak_days);
    match progress.last_workout_date {
        Some(date) => println!("  Last workout:    {}", date),
        None => println!("  Last workout:    never"),
    }
    println!("  Last 7 days:     {} sessions", this_week);
    Ok(())
}

fn cmd_export(ctx: &Context, out: Option<PathBuf>) -> Result<()> {
    let store = ctx.progress();
    let out = out.unwrap_or_else(|| store.user_dir(&ctx.user).join("sessions.csv"));

    let records = store.history(&ctx.user)?;
    let count = fitplan_core::history::export_csv(&records, &out)?;

    println!("✓ Exported {} sessions", count);
    println!("  CSV: {}", out.display());
    Ok(())
}

/// Point the user at profile completion before the error is returned
fn explain(e: Error) -> Error {
    if let Error::ProfileIncomplete(ref missing) = e {
        eprintln!("Your profile is incomplete (missing: {}).", missing.join(", "));
        eprintln!("Complete it with: fitplan profile --goal <goal> --level <level> --minutes <n>");
    }
    e
}

/// Run every exercise to its planned length without waiting
fn drive_auto(engine: &mut SessionEngine) -> Result<bool> {
    while engine.phase() != SessionPhase::Completed {
        let rep_target_met = match (engine.phase(), engine.state(), engine.current_exercise()) {
            (SessionPhase::Running, Some(state), Some(exercise)) => {
                matches!(state.timer, ExerciseTimer::Reps { .. })
                    && state.exercise_elapsed_seconds >= exercise.cost_seconds()
            }
            _ => false,
        };

        let events = if rep_target_met {
            engine.complete_exercise()?
        } else {
            engine.tick()
        };
        report(engine, &events);
    }
    Ok(true)
}

/// Feed real-time ticks and typed commands; false if the user quit
fn drive_interactive(engine: &mut SessionEngine, console: &Console) -> Result<bool> {
    while engine.phase() != SessionPhase::Completed {
        match console.next() {
            Input::Tick => {
                let events = engine.tick();
                if events.is_empty() {
                    if let (SessionPhase::Running, Some(left)) =
                        (engine.phase(), engine.remaining_seconds())
                    {
                        if left <= 3 || left % 10 == 0 {
                            println!("  {}s", left);
                        }
                    }
                }
                report(engine, &events);
            }
            Input::Line(line) => match line.trim().to_lowercase().as_str() {
                "" | "d" | "done" => {
                    if engine.is_enabled(SessionAction::CompleteExercise) {
                        let events = engine.complete_exercise()?;
                        report(engine, &events);
                    } else {
                        println!("Nothing to complete right now");
                    }
                }
                "s" | "skip" => {
                    if engine.is_enabled(SessionAction::Skip) {
                        let events = engine.skip()?;
                        report(engine, &events);
                    } else {
                        println!("Nothing to skip right now");
                    }
                }
                "p" | "pause" => {
                    if engine.is_enabled(SessionAction::Pause) {
                        engine.pause()?;
                        println!("Paused. 'p' to resume.");
                    } else if engine.is_enabled(SessionAction::Resume) {
                        engine.resume()?;
                        println!("Resumed.");
                    }
                }
                "q" | "quit" | "exit" => return Ok(false),
                other => println!("Unknown command '{}'", other),
            },
            Input::Eof => return Ok(false),
        }
    }
    Ok(true)
}

/// Apply the rating; false if the user left without giving one
fn rate_session(
    engine: &mut SessionEngine,
    rating: Option<u8>,
    console: Option<&Console>,
) -> Result<bool> {
    if let Some(rating) = rating {
        engine.rate(rating)?;
        return Ok(true);
    }

    let Some(console) = console else {
        eprintln!("No rating given; pass --rating to log the session.");
        return Ok(false);
    };

    loop {
        let Some(line) = console.read_line("Rate this workout (1-5): ") else {
            return Ok(false);
        };
        match line.trim().parse::<u8>() {
            Ok(rating) => match engine.rate(rating) {
                Ok(()) => return Ok(true),
                Err(Error::InvalidRating(_)) => println!("Rating must be between 1 and 5"),
                Err(e) => return Err(e),
            },
            Err(_) => println!("Please enter a number from 1 to 5"),
        }
    }
}

fn report(engine: &SessionEngine, events: &[SessionEvent]) {
    let exercises = engine.workout().exercises();
    for event in events {
        match *event {
            SessionEvent::ExerciseStarted { index } => {
                let exercise = &exercises[index];
                println!(
                    "\n▶ [{}/{}] {} ({})",
                    index + 1,
                    exercises.len(),
                    exercise.name,
                    format_cost(exercise)
                );
            }
            SessionEvent::ExerciseFinished { skipped, .. } => {
                println!("  {}", if skipped { "↷ skipped" } else { "✓ done" });
            }
            SessionEvent::RestStarted {
                next_index,
                seconds,
            } => {
                println!("  Rest {}s, next up: {}", seconds, exercises[next_index].name);
            }
            SessionEvent::WorkoutCompleted => println!("\nWorkout complete!"),
        }
    }
}

fn print_workout(workout: &GeneratedWorkout) {
    let composition = workout.composition();

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {} WORKOUT ({})", workout.goal().as_str().to_uppercase(), workout.difficulty());
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!(
        "  ~{} min, ~{} kcal  (cardio {} / strength {} / flexibility {} min)",
        workout.total_duration_minutes(),
        workout.estimated_calories(),
        composition.cardio_minutes(),
        composition.strength_minutes(),
        composition.flexibility_minutes()
    );
    println!();
    for (i, exercise) in workout.exercises().iter().enumerate() {
        println!(
            "  {:>3}. {:<26} {:<12} {:>8} {:>4} kcal",
            i + 1,
            exercise.name,
            exercise.category,
            format_cost(exercise),
            exercise.calories_per_unit
        );
    }
    println!();
}

fn format_cost(exercise: &ExerciseDefinition) -> String {
    match exercise.cost {
        CostModel::Timed { seconds } => format!("{}s", seconds),
        CostModel::Reps { reps, sets } => format!("{} x {}", sets, reps),
    }
}

enum Input {
    Tick,
    Line(String),
    Eof,
}

/// One-second ticker plus line reader, merged into a single channel
struct Console {
    rx: Receiver<Input>,
    closed: Cell<bool>,
}

impl Console {
    fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();

        let ticks = tx.clone();
        std::thread::spawn(move || loop {
            std::thread::sleep(Duration::from_secs(1));
            if ticks.send(Input::Tick).is_err() {
                break;
            }
        });

        std::thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(Input::Line(line)).is_err() {
                    return;
                }
            }
            let _ = tx.send(Input::Eof);
        });

        Self {
            rx,
            closed: Cell::new(false),
        }
    }

    fn next(&self) -> Input {
        if self.closed.get() {
            return Input::Eof;
        }
        match self.rx.recv() {
            Ok(Input::Eof) | Err(_) => {
                self.closed.set(true);
                Input::Eof
            }
            Ok(input) => input,
        }
    }

    fn read_line(&self, prompt: &str) -> Option<String> {
        print!("{}", prompt);
        let _ = io::stdout().flush();
        loop {
            match self.next() {
                Input::Tick => continue,
                Input::Line(line) => return Some(line),
                Input::Eof => return None,
            }
        }
    }

    fn confirm(&self, question: &str) -> bool {
        match self.read_line(&format!("{} [Y/n] ", question)) {
            Some(answer) => !matches!(answer.trim().to_lowercase().as_str(), "n" | "no"),
            None => false,
        }
    }
}
