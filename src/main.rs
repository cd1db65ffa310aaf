use anyhow::{Context, Result};
use checker_chesser::capture::ScreenCapture;
use checker_chesser::config::Config;
use checker_chesser::mirror::{EchoGuard, MoveActuator, RdevPointer};
use checker_chesser::monitor::Suggestion;
use checker_chesser::uci::AnalysisLine;
use checker_chesser::{Assistant, EngineSession, Event, Orientation, Region};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use dialoguer::{Confirm, Input};
use std::path::PathBuf;
use std::sync::Arc;

fn cli() -> Command {
    Command::new("CheckerChesser")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reads a chessboard from the screen and suggests engine moves")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("JSON config file; flags below override it")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("engine")
                .long("engine")
                .value_name("PATH")
                .help("UCI engine executable, or a directory containing one")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("region")
                .long("region")
                .value_name("LEFT,TOP,WIDTH,HEIGHT")
                .help("Board rectangle on the primary monitor, in pixels")
                .value_parser(value_parser!(Region)),
        )
        .arg(
            Arg::new("flipped")
                .long("flipped")
                .help("Board is drawn with black at the bottom")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("interval-ms")
                .long("interval-ms")
                .value_name("MS")
                .help("Pause between captures")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("movetime-ms")
                .long("movetime-ms")
                .value_name("MS")
                .help("Engine time per position")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("lines")
                .long("lines")
                .value_name("N")
                .help("Show the top N engine lines for each position")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("mirror")
                .long("mirror")
                .help("Play suggested moves on the screen board with the mouse")
                .action(ArgAction::SetTrue),
        )
}

fn build_config(matches: &ArgMatches) -> Result<Config> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(path) = matches.get_one::<PathBuf>("engine") {
        config.engine_path = path.clone();
    }
    if let Some(region) = matches.get_one::<Region>("region") {
        config.region = Some(*region);
    }
    if matches.get_flag("flipped") {
        config.orientation = Orientation::Flipped;
    }
    if let Some(ms) = matches.get_one::<u64>("interval-ms") {
        config.poll_interval_ms = *ms;
    }
    if let Some(ms) = matches.get_one::<u64>("movetime-ms") {
        config.movetime_ms = *ms;
    }
    if let Some(lines) = matches.get_one::<usize>("lines") {
        config.analysis_lines = *lines;
    }
    if matches.get_flag("mirror") {
        config.mirror = true;
    }
    config.validate()?;
    Ok(config)
}

/// Asks for the board rectangle when neither the config nor the flags gave one.
fn prompt_region(config: &mut Config) -> Result<Region> {
    println!("Measure the board with a screenshot tool: top-left corner, then its size.");
    let text: String = Input::new()
        .with_prompt("Board region (left,top,width,height)")
        .validate_with(|input: &String| -> Result<(), String> {
            input.parse::<Region>().map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()
        .context("Failed to read board region")?;
    let flipped = Confirm::new()
        .with_prompt("Is black at the bottom of the board?")
        .default(config.orientation.is_flipped())
        .interact()
        .context("Failed to read board orientation")?;
    config.orientation = Orientation::from_flipped(flipped);
    Ok(text.parse()?)
}

fn print_suggestion(suggestion: &Suggestion) {
    println!("Detected FEN: {}", suggestion.fen);
    match &suggestion.best_move {
        Some(mv) => println!("Best move: {mv}"),
        None => println!("Best move: (none)"),
    }
}

fn print_lines(lines: &[AnalysisLine]) {
    for line in lines {
        let pv: Vec<String> = line.pv.iter().map(ToString::to_string).collect();
        println!(
            "  {}. {} ({}) {}",
            line.rank,
            line.best_move,
            line.decoded_score(),
            pv.join(" ")
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let mut config = build_config(&matches)?;
    let region = match config.region {
        Some(region) => region,
        None => prompt_region(&mut config)?,
    };

    println!("CheckerChesser starting...");
    println!("Watching region {region} ({:?})", config.orientation);
    println!("Press Ctrl+C to stop.");

    let engine = Arc::new(EngineSession::new());
    let actuator = MoveActuator::new(Box::new(RdevPointer::default()));
    let (mut assistant, mut events) = Assistant::new(engine, actuator);
    let mut echo = EchoGuard::default();

    assistant.start_engine(config.engine_path.clone());

    let outcome: Result<()> = loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Stopping...");
                break Ok(());
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => break Ok(()),
            },
        };

        match event {
            Event::EngineStarted(Ok(path)) => {
                log::info!("using engine {}", path.display());
                assistant
                    .start_monitoring(ScreenCapture::new(), config.monitor_settings(region))
                    .await;
            }
            Event::EngineStarted(Err(e)) => {
                break Err(e).context("Engine could not be started (check --engine)");
            }
            Event::Suggestion(suggestion) => {
                print_suggestion(&suggestion);
                if config.analysis_lines > 1 {
                    assistant.request_analysis(
                        suggestion.fen.clone(),
                        config.analysis_lines,
                        config.movetime(),
                    );
                }
                if config.mirror && echo.admit(&suggestion.fen) {
                    if let Some(mv) = suggestion.best_move {
                        echo.expect_after(&suggestion.fen, &mv);
                        assistant.mirror_move(mv, region, config.orientation);
                    }
                }
            }
            Event::Analysis { lines, .. } => print_lines(&lines),
            Event::EngineMove { fen, best_move } => {
                log::debug!("engine move for {fen}: {best_move:?}");
            }
            Event::MirrorDone { mv, result } => match result {
                Ok(()) => log::debug!("mirrored {mv}"),
                Err(_) => echo.clear(),
            },
        }
    };

    assistant.shutdown().await;
    outcome
}
