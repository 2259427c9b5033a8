use std::path::Path;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel as xch;
use eyre::{Result, WrapErr};
use putt_config::Config;
use putt_core::error::CourseError;
use putt_core::{Command, ErrorCode, ErrorReporter, Mode, NUM_ACTUATORS, TaskStats};
use serde_json::json;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod decode;
mod error_fmt;
mod sim;

use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};

/// How long a simulated switch is held closed.
const SIM_PRESS: Duration = Duration::from_millis(40);

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    color_eyre::install()?;

    // Config problems surface before logging is up.
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run {
            duration_ms,
            fill,
            clear,
            auto_dispense,
            putts,
            stats,
        } => run(
            &cfg,
            RunArgs {
                duration: duration_ms.map(Duration::from_millis),
                fill,
                clear,
                auto_dispense,
                putts,
                stats,
                json: cli.json,
            },
        ),
        Commands::SelfCheck => self_check(&cfg, cli.json),
        Commands::Decode { hex, kind } => {
            let cmd = decode::decode(kind, &hex)?;
            if cli.json {
                println!("{}", decode::command_json(&cmd));
            } else {
                print!("{}", decode::command_text(&cmd));
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let cfg = putt_config::load_file(path)
        .map_err(|e| eyre::Report::new(CourseError::Config(format!("{e:#}"))))?;
    cfg.validate()
        .map_err(|e| eyre::Report::new(CourseError::Config(format!("{e:#}"))))?;
    Ok(cfg)
}

fn init_tracing(json: bool, cli_level: Option<&str>, cfg: &Config) -> Result<()> {
    let level = cli_level.or(cfg.logging.level.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let file = match cfg.logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {} has no file name", path.display()))?;
            let appender = match cfg.logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_writer(writer).boxed())
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("install tracing subscriber")?;
    Ok(())
}

struct RunArgs {
    duration: Option<Duration>,
    fill: Option<u8>,
    clear: bool,
    auto_dispense: bool,
    putts: u32,
    stats: bool,
    json: bool,
}

fn run(cfg: &Config, args: RunArgs) -> Result<()> {
    let sim::SimCourse { system, inputs, .. } = sim::build(cfg)?;
    let running = system.start()?;
    let ctl = running.controller();

    if args.auto_dispense {
        ctl.apply(&Command::Settings {
            auto_dispense: true,
        })?;
    }
    if let Some(pos) = args.fill {
        ctl.apply(&Command::SetCourse {
            mode: Mode::Static,
            positions: [pos; NUM_ACTUATORS],
        })?;
    }
    if args.clear {
        ctl.apply(&Command::ClearSequence)?;
    }

    let (stop_tx, stop_rx) = xch::bounded::<()>(1);
    let ctrlc_tx = stop_tx.clone();
    ctrlc::set_handler(move || {
        // A second Ctrl-C while the first is pending is dropped.
        let _ = ctrlc_tx.try_send(());
    })
    .wrap_err("install Ctrl-C handler")?;

    let golfer = (args.putts > 0).then(|| {
        let inputs = inputs.clone();
        let putts = args.putts;
        std::thread::spawn(move || sim::play_putts(&inputs, putts, SIM_PRESS))
    });

    tracing::info!(duration_ms = ?args.duration.map(|d| d.as_millis()), "course running");
    if wait_for_stop(&stop_rx, args.duration) {
        tracing::info!("stop requested");
    }
    drop(stop_tx);

    if golfer.is_some_and(|h| h.join().is_err()) {
        tracing::warn!("simulated golfer panicked");
    }

    let tasks = running.shutdown();
    print_summary(&ctl, &tasks, args.stats, args.json);
    Ok(())
}

/// Block until Ctrl-C or until `duration` runs out. True if a stop arrived.
fn wait_for_stop(stop_rx: &xch::Receiver<()>, duration: Option<Duration>) -> bool {
    match duration {
        Some(d) => stop_rx.recv_timeout(d).is_ok(),
        None => stop_rx.recv().is_ok(),
    }
}

fn print_summary(ctl: &putt_core::Controller, tasks: &[TaskStats], show_stats: bool, json: bool) {
    let stats = ctl.estimation().stats();
    let errors = ctl.errors().active();
    let positions = ctl.actuators().current_positions();

    if json {
        let tasks: Vec<_> = tasks
            .iter()
            .map(|t| json!({ "name": t.name, "ticks": t.ticks, "overruns": t.overruns }))
            .collect();
        let out = json!({
            "balls_hit": stats.balls_hit,
            "balls_in_hole": stats.balls_in_hole,
            "errors": errors,
            "error_flags": ctl.errors().get_all(),
            "positions": positions.to_vec(),
            "tasks": tasks,
        });
        println!("{out}");
        return;
    }

    println!(
        "balls hit: {}, in hole: {}",
        stats.balls_hit, stats.balls_in_hole
    );
    if errors.is_empty() {
        println!("errors: none");
    } else {
        println!("errors: {}", errors.join(", "));
    }
    println!("course:");
    print!("{}", decode::course_grid(&positions));
    if show_stats {
        for t in tasks {
            println!(
                "task {:<8} ticks={} overruns={}",
                t.name, t.ticks, t.overruns
            );
        }
    }
}

fn self_check(cfg: &Config, json: bool) -> Result<()> {
    let sim::SimCourse {
        mut system, bus, ..
    } = sim::build(cfg)?;
    system.init()?;

    let ctl = system.controller();
    // First boot: nothing to restore is not a fault of the rig.
    let never_saved = !Path::new(&cfg.storage.course_state_path).exists();
    if never_saved {
        ctl.errors().clear_error(ErrorCode::Storage);
    }
    let active = ctl.errors().active();
    if !active.is_empty() {
        eyre::bail!("self-check found active error codes: {}", active.join(", "));
    }

    let plan = system.actuators().plan();
    let chips = bus.with(|pwm| pwm.chips());
    if json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "chips": chips,
                "actuators": plan.len(),
                "rollout_groups": plan.group_count(),
                "course_saved": !never_saved,
            })
        );
    } else {
        let chips: Vec<String> = chips.iter().map(|c| format!("0x{c:02x}")).collect();
        println!(
            "chips up: {}; {} actuators in {} rollout groups",
            chips.join(", "),
            plan.len(),
            plan.group_count()
        );
        if never_saved {
            println!("no saved course yet");
        }
        println!("self-check ok");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn wait_ends_when_duration_runs_out() {
        let (_tx, rx) = xch::bounded::<()>(1);
        let start = Instant::now();
        assert!(!wait_for_stop(&rx, Some(Duration::from_millis(30))));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn stop_signal_cuts_the_wait_short() {
        let (tx, rx) = xch::bounded::<()>(1);
        tx.try_send(()).unwrap();
        // Full channel: a repeated signal is dropped, not blocked on.
        assert!(tx.try_send(()).is_err());
        let start = Instant::now();
        assert!(wait_for_stop(&rx, Some(Duration::from_secs(10))));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
