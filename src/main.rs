//! FaceDown CLI
//!
//! Usage:
//!   facedown run --minutes 25                 # Simulated session, live countdown
//!   facedown run --minutes 5 --speed 60       # Same, one minute per second
//!   facedown history                          # Your recent sessions
//!   facedown history --pod study-group        # A pod's recent sessions
//!   facedown serve --addr 127.0.0.1:3000      # HTTP + WebSocket API
//!   facedown --json history                   # JSON output

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use facedown::config::FaceDownConfig;
use facedown::core::{
    run_server, AnonymousIdentity, JsonDirStore, ScaledClock, SessionController,
    SessionServices, SessionStore, SimulatedSensor, SystemClock,
};
use facedown::types::{Pod, SessionRecord, SessionState};
use facedown::{PRESET_FOCUS_MINUTES, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "facedown",
    version = VERSION,
    about = "FaceDown - focus sessions scored by how long the phone stays face down",
    long_about = "FaceDown runs a countdown while sampling device motion at 10 Hz.\n\n\
                  Each sample is classified face-down (gravity.z < -0.75) and\n\
                  steady (|acceleration| < 0.15 g). A session passes with at least\n\
                  80% face-down and 70% steady samples.\n\n\
                  States:\n  \
                  IDLE      - Created, not started\n  \
                  RUNNING   - Countdown and monitoring active\n  \
                  FINISHED  - Timed out or stopped, result recorded"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON config file (partial files allowed)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for session records and the anonymous identity
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a session against the simulated sensor
    Run {
        /// Session length in minutes (presets: 25 focus, 50 deep work, 5 quick test)
        #[arg(short, long, default_value_t = PRESET_FOCUS_MINUTES)]
        minutes: u32,

        /// Pod to record the session under
        #[arg(long)]
        pod: Option<String>,

        /// Time multiplier for demos (60 = one minute per second)
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },

    /// Show recent sessions
    History {
        /// Show a pod's sessions instead of your own
        #[arg(long)]
        pod: Option<String>,

        /// Maximum number of sessions
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Run as HTTP API server
    Serve {
        /// Server address
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("facedown=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };

    let identity = Arc::new(AnonymousIdentity::with_file(config.data_dir.join("identity")));
    identity.sign_in_anonymously();
    let store = Arc::new(JsonDirStore::new(config.data_dir.join("sessions")));
    let services = SessionServices::new(identity.clone(), store.clone());

    match &args.command {
        Command::Run { minutes, pod, speed } => {
            run_session(&args, config, services, *minutes, Pod::from(pod.clone()), *speed).await
        }
        Command::History { pod, limit } => {
            let user_id = identity.sign_in_anonymously().to_string();
            run_history(&args, &config, store.as_ref(), &user_id, pod.as_deref(), *limit)
        }
        Command::Serve { addr } => run_serve(addr, services, config).await,
    }
}

/// Defaults, then the config file, then CLI flags
fn load_config(args: &Args) -> Result<FaceDownConfig, facedown::config::ConfigError> {
    let mut config = match &args.config {
        Some(path) => FaceDownConfig::load(path)?,
        None => FaceDownConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    debug!(?config, "configuration loaded");
    Ok(config)
}

/// Run one simulated session with live output
async fn run_session(
    args: &Args,
    mut config: FaceDownConfig,
    services: SessionServices,
    minutes: u32,
    pod: Pod,
    speed: f64,
) {
    if !(speed > 0.0) {
        eprintln!("--speed must be positive");
        std::process::exit(2);
    }
    let services = if speed != 1.0 {
        config.tick_interval_ms = scaled_ms(config.tick_interval_ms, speed);
        config.scoring.sample_interval_ms = scaled_ms(config.scoring.sample_interval_ms, speed);
        // record nominal start/end times, not the compressed wall clock
        services.with_clock(Arc::new(ScaledClock::new(Arc::new(SystemClock), speed)))
    } else {
        services
    };

    let mut controller = SessionController::new(
        minutes,
        pod,
        Arc::new(SimulatedSensor::default()),
        services,
        config,
    );

    print_header(minutes, controller.pod(), args.no_color);

    let mut updates = controller.subscribe();
    let json = args.json;
    let no_color = args.no_color;
    let printer = tokio::spawn(async move {
        loop {
            let update = match updates.recv().await {
                Ok(update) => update,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if json {
                println!("{}", serde_json::to_string(&update).unwrap_or_default());
            } else if no_color {
                println!("{}", update.to_parseable_string());
            } else {
                println!("{}", update.to_terminal_string());
            }
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let reason = controller.run(shutdown).await;

    let saved = controller.wait_for_save().await;
    let record = controller.last_record().cloned();
    let state = controller.state();
    drop(controller);
    let _ = printer.await;

    if state != SessionState::Finished {
        eprintln!("Session not started: {}", reason);
        std::process::exit(1);
    }

    match record {
        Some(record) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&record).unwrap_or_default());
            } else {
                print_verdict(&record);
            }
        }
        None => println!("Session finished, result not recorded ({})", reason.description()),
    }
    if let Some(Err(e)) = saved {
        eprintln!("{} result not saved: {}", "⚠".yellow(), e);
    }
}

fn scaled_ms(ms: u64, speed: f64) -> u64 {
    ((ms as f64 / speed).round() as u64).max(1)
}

/// Show recent sessions for the current user or a pod
fn run_history(
    args: &Args,
    config: &FaceDownConfig,
    store: &dyn SessionStore,
    user_id: &str,
    pod: Option<&str>,
    limit: Option<usize>,
) {
    let result = match pod {
        Some(pod_id) => {
            store.fetch_pod_sessions(pod_id, limit.unwrap_or(config.pod_history_limit))
        }
        None => store.fetch_user_sessions(user_id, limit.unwrap_or(config.user_history_limit)),
    };
    let sessions = match result {
        Ok(sessions) => sessions,
        Err(e) => {
            eprintln!("History error [{}]: {}", e.code(), e);
            std::process::exit(1);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&sessions).unwrap_or_default());
        return;
    }
    if sessions.is_empty() {
        println!("No sessions yet.");
        return;
    }
    for record in &sessions {
        if args.no_color {
            println!("{}", record.to_parseable_string());
        } else {
            let verdict = if record.passed {
                "PASSED".green().bold()
            } else {
                "FAILED".red().bold()
            };
            println!(
                "{} {} {:>5.1} min  face down {:>5.1}%  steady {:>5.1}%  {}",
                record.start_time.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                verdict,
                record.duration_minutes(),
                record.face_down_percentage,
                record.steady_percentage,
                record.pod.to_string().cyan(),
            );
        }
    }
    let passed = sessions.iter().filter(|r| r.passed).count();
    println!();
    println!("{} of {} passed", passed, sessions.len());
}

/// Print header
fn print_header(minutes: u32, pod: &Pod, no_color: bool) {
    let title = format!("FaceDown v{} - {} minute session", VERSION, minutes);
    if no_color {
        println!("========================================");
        println!("  {}", title);
        println!("========================================");
    } else {
        println!("{}", title.bold());
    }
    if let Pod::Id(id) = pod {
        println!("Pod: {}", id);
    }
    println!("Place the phone face down. Ctrl-C stops early.");
    println!();
}

/// Print the final verdict
fn print_verdict(record: &SessionRecord) {
    println!();
    let verdict = if record.passed {
        "✓ SESSION PASSED".green().bold()
    } else {
        "✗ SESSION FAILED".red().bold()
    };
    println!("{}", verdict);
    println!("  Duration:   {:.1} min", record.duration_minutes());
    println!("  Face down:  {:.1}%", record.face_down_percentage);
    println!("  Steady:     {:.1}%", record.steady_percentage);
}

/// Run HTTP API server
async fn run_serve(addr: &str, services: SessionServices, config: FaceDownConfig) {
    println!();
    println!("FaceDown API Server v{}", VERSION);
    println!();
    if let Err(e) = run_server(addr, services, config).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
