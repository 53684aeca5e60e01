//! focusring CLI — simulated rounds and configuration inspection.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use focusring::sim::{GazeScript, SyntheticEyeSource};
use focusring::{Arena, DistractorBlob, FocusConfig, FocusSession, RoundState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "focusring")]
#[command(about = "Gaze-driven focus boundary game engine (synthetic round runner)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full synthetic round (calibration + 45 s of play) and report
    /// the score.
    Simulate(CliSimulateArgs),

    /// Print the default engine configuration as JSON.
    ConfigInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScriptArg {
    /// Stare at the screen center.
    Fixed,
    /// Circle the boundary region.
    Orbit,
    /// Seeded random walk across the screen.
    Walk,
}

#[derive(Debug, Clone, Args)]
struct CliSimulateArgs {
    /// Screen width in pixels.
    #[arg(long, default_value = "1600.0")]
    screen_width: f64,

    /// Screen height in pixels.
    #[arg(long, default_value = "900.0")]
    screen_height: f64,

    /// Simulated capture rate in frames per second.
    #[arg(long, default_value = "30.0")]
    fps: f64,

    /// Gaze script driving the simulated viewer.
    #[arg(long, value_enum, default_value_t = ScriptArg::Orbit)]
    script: ScriptArg,

    /// Seed for the gaze walk and blob spawning.
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Number of distractor blobs bouncing around the arena.
    #[arg(long, default_value = "2")]
    blobs: usize,

    /// Drop every Nth camera frame to exercise the hold path (0 disables).
    #[arg(long, default_value = "0")]
    drop_every: usize,

    /// Path to write the round report (JSON); stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate(args) => run_simulate(&args),
        Commands::ConfigInfo => run_config_info(),
    }
}

// ── config-info ──────────────────────────────────────────────────────────

fn run_config_info() -> CliResult<()> {
    let config = FocusConfig::default();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

// ── simulate ─────────────────────────────────────────────────────────────

fn spawn_blobs(args: &CliSimulateArgs, rng: &mut StdRng) -> Vec<DistractorBlob> {
    (0..args.blobs)
        .map(|_| {
            let speed = rng.gen_range(120.0..260.0);
            let angle = rng.gen_range(0.0..std::f64::consts::TAU);
            DistractorBlob {
                pos: [
                    args.screen_width / 2.0 + rng.gen_range(-80.0..80.0),
                    args.screen_height / 2.0 + rng.gen_range(-60.0..60.0),
                ],
                vel: [speed * angle.cos(), speed * angle.sin()],
                radius: rng.gen_range(30.0..70.0),
                influence: rng.gen_range(-25.0..25.0),
            }
        })
        .collect()
}

fn make_script(args: &CliSimulateArgs) -> GazeScript {
    let center = [args.screen_width / 2.0, args.screen_height / 2.0];
    match args.script {
        ScriptArg::Fixed => GazeScript::fixed(center),
        ScriptArg::Orbit => GazeScript::orbit(center, 200.0, 0.6),
        ScriptArg::Walk => GazeScript::walk(
            center,
            30.0,
            [args.screen_width, args.screen_height],
            args.seed,
        ),
    }
}

fn run_simulate(args: &CliSimulateArgs) -> CliResult<()> {
    if args.fps <= 0.0 {
        return Err("fps must be positive".into());
    }

    let mut config = FocusConfig::default();
    config.mapper.screen_width = args.screen_width;
    config.mapper.screen_height = args.screen_height;
    config.boundary.center = [args.screen_width / 2.0, args.screen_height / 2.0];

    let mut session = FocusSession::new(config);
    let source = SyntheticEyeSource::new(120, 80, [args.screen_width, args.screen_height]);
    let mut script = make_script(args);

    let arena = Arena {
        width: args.screen_width,
        height: args.screen_height,
    };
    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut blobs = spawn_blobs(args, &mut rng);

    let dt = 1.0 / args.fps;
    let mut now = 0.0;
    let mut frame_index: usize = 0;
    let mut shown_target = None;

    session.request_start(now);
    tracing::info!("calibration started: fixate each target in turn");

    loop {
        match session.state() {
            RoundState::Calibrating => {
                let status = session
                    .calibration_status(now)
                    .ok_or("calibrating without a session")?;
                if shown_target != Some(status.target_index) {
                    shown_target = Some(status.target_index);
                    tracing::info!(
                        "target {}/{} at ({:.0}, {:.0})",
                        status.target_index + 1,
                        status.target_count,
                        status.target[0],
                        status.target[1]
                    );
                }
                // The simulated viewer fixates the displayed target.
                let frame = source.frame_for_gaze(status.target);
                session.tick(now, Some(&frame), &blobs);
            }
            RoundState::Running => {
                let gaze_target = script.position(now);
                for b in &mut blobs {
                    b.advance(dt, &arena);
                }
                let dropped = args.drop_every > 0 && frame_index % args.drop_every == 0;
                if dropped {
                    session.tick(now, None, &blobs);
                } else {
                    let frame = source.frame_for_gaze(gaze_target);
                    session.tick(now, Some(&frame), &blobs);
                }
            }
            RoundState::Finished => break,
            RoundState::Idle => {
                if let Some(e) = session.last_calibration_error() {
                    return Err(format!("calibration failed: {}", e).into());
                }
                return Err("session left Idle unexpectedly".into());
            }
        }
        now += dt;
        frame_index += 1;
    }

    let report = session.report().ok_or("finished round must report")?;
    tracing::info!(
        "round finished: {} touches, {:.2} s in contact",
        report.touch_count,
        report.touch_duration_seconds
    );

    let json = serde_json::to_string_pretty(&report)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!("report written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
