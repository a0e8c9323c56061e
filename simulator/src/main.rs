use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use workflow::config::{SessionConfig, LONG_SESSION_PULSES};
use workflow::inspect::{inspect_file, preview_lines};
use workflow::runner::Runner;

mod generator;
mod workflow;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Radar scan-and-capture IQ simulator",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Run a capture session (the default)
    Run(RunArgs),
    /// Decode and print the header of an .iq or .simstate file
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    /// Load session settings from YAML; flags given here override it
    #[arg(long)]
    config: Option<PathBuf>,
    /// Scan as M:S:E:D (mode P or R, start, end, delta)
    #[arg(long, value_name = "M:S:E:D", allow_hyphen_values = true)]
    sweep: Option<String>,
    #[arg(short, long, allow_hyphen_values = true)]
    azimuth: Option<f32>,
    #[arg(short, long, allow_hyphen_values = true)]
    elevation: Option<f32>,
    /// Number of pulses to simulate
    #[arg(short, long, visible_short_alias = 'f', visible_alias = "frames")]
    pulses: Option<usize>,
    /// Warm-up pulses (default 2000 for sessions over 1000 pulses)
    #[arg(short = 'W', long)]
    warmup: Option<usize>,
    /// Pulse repetition time in seconds
    #[arg(short = 't', long)]
    prt: Option<f32>,
    #[arg(short, long)]
    seed: Option<u32>,
    /// Write an IQ file
    #[arg(short = 'o', long)]
    output: bool,
    /// Write a simulation state file at the end
    #[arg(long)]
    savestate: bool,
    #[arg(long)]
    outdir: Option<String>,
    #[arg(long)]
    noprogress: bool,
    /// Only list the scan angles; nothing is simulated
    #[arg(short = 'N', long)]
    preview: bool,
    /// Debris count for the next body type (repeatable)
    #[arg(short = 'd', long)]
    debris: Vec<u32>,
    /// Background bodies per range cell
    #[arg(short = 'D', long)]
    density: Option<f32>,
    /// Wavelength in meters
    #[arg(long)]
    lambda: Option<f32>,
    /// Pulse width in seconds
    #[arg(short = 'w', long)]
    pulsewidth: Option<f32>,
    /// Cooperating nodes; node 0 writes every file
    #[arg(long)]
    nodes: Option<usize>,
    /// Ring the terminal bell when the session completes
    #[arg(long)]
    alarm: bool,
    /// Never ring the bell, even with --alarm
    #[arg(short, long)]
    quiet: bool,
    /// Skip confirmation questions
    #[arg(short = 'y', long)]
    dontask: bool,
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Args, Debug, Clone)]
struct InspectArgs {
    file: PathBuf,
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn apply_to(&self, config: &mut SessionConfig) {
        if let Some(sweep) = &self.sweep {
            config.sweep = sweep.clone();
        }
        if let Some(azimuth) = self.azimuth {
            config.azimuth = azimuth;
        }
        if let Some(elevation) = self.elevation {
            config.elevation = elevation;
        }
        if self.pulses.is_some() {
            config.pulses = self.pulses;
        }
        if self.warmup.is_some() {
            config.warm_up = self.warmup;
        }
        if self.prt.is_some() {
            config.prt = self.prt;
        }
        if self.seed.is_some() {
            config.engine.seed = self.seed;
        }
        config.output_iq |= self.output;
        config.save_state |= self.savestate;
        if self.outdir.is_some() {
            config.output_dir = self.outdir.clone();
        }
        if self.noprogress {
            config.show_progress = false;
        }
        if !self.debris.is_empty() {
            config.engine.debris = self.debris.clone();
        }
        if self.density.is_some() {
            config.engine.density = self.density;
        }
        if self.lambda.is_some() {
            config.engine.lambda = self.lambda;
        }
        if self.pulsewidth.is_some() {
            config.engine.pulse_width = self.pulsewidth;
        }
        if let Some(nodes) = self.nodes {
            config.nodes = nodes;
        }
        config.alarm |= self.alarm;
        if self.quiet {
            config.alarm = false;
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Inspect(args)) => inspect(args),
        Some(Command::Run(args)) => run(args),
        None => run(cli.run),
    }
}

fn inspect(args: InspectArgs) -> anyhow::Result<()> {
    init_logging(0);
    let inspection = inspect_file(&args.file)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
    } else {
        println!("{}", inspection.render_text());
    }
    Ok(())
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    init_logging(args.verbose);
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    args.apply_to(&mut config);

    if args.preview {
        let scan = config.scan_state()?;
        for line in preview_lines(&scan, config.num_pulses()?) {
            println!("{}", line);
        }
        return Ok(());
    }

    if config.pulses.unwrap_or(0) > LONG_SESSION_PULSES && !config.writes_files() {
        if !args.dontask && io::stdin().is_terminal() {
            config.output_iq = ask_for_output(&mut io::stdin().lock())?;
        } else {
            log::warn!("Simulating more than 1,000 pulses but no file will be generated (add -o).");
        }
    }
    let alarm = config.alarm;

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating the session runtime")?;
    let summary = runtime.block_on(Runner::new(config).execute())?;

    let metrics = summary.metrics;
    log::info!(
        "Captured {} pulses ({} boundary events); wrote {} file(s), {} B",
        metrics.pulses_captured,
        metrics.boundary_events,
        metrics.files_written,
        metrics.bytes_written
    );
    if alarm {
        eprint!("\x07\x07\x07\x07\x07");
    }
    if !summary.report.is_complete() {
        bail!(
            "{} output file(s) could not be written",
            summary.report.failures.len()
        );
    }
    Ok(())
}

/// Offers to turn on the IQ file for a long session that would write nothing.
fn ask_for_output(input: &mut impl BufRead) -> anyhow::Result<bool> {
    print!(
        "Simulating more than 1,000 pulses but no file will be generated.\n\
         Do you want to generate an output file instead (Y/N/N) ? "
    );
    io::stdout().flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim_start().chars().next(), Some('y' | 'Y')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_flags_run_a_session() {
        let cli = Cli::try_parse_from([
            "radarsim", "--sweep", "P:-12:12:0.01", "-p", "2400", "-o", "-s", "100", "-a", "-3.5",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        let mut config = SessionConfig::default();
        cli.run.apply_to(&mut config);
        assert_eq!(config.pulses, Some(2400));
        assert_eq!(config.engine.seed, Some(100));
        assert_eq!(config.azimuth, -3.5);
        assert!(config.output_iq);
        assert!(!config.save_state);
    }

    #[test]
    fn repeated_debris_and_frames_alias() {
        let cli = Cli::try_parse_from([
            "radarsim",
            "-f",
            "50",
            "-d",
            "100",
            "-d",
            "20",
            "--savestate",
        ])
        .unwrap();
        let mut config = SessionConfig::default();
        cli.run.apply_to(&mut config);
        assert_eq!(config.pulses, Some(50));
        assert_eq!(config.engine.debris, vec![100, 20]);
        assert!(config.save_state);
    }

    #[test]
    fn flags_override_the_yaml_file() {
        let mut config = SessionConfig {
            pulses: Some(10),
            nodes: 4,
            ..Default::default()
        };
        let cli = Cli::try_parse_from(["radarsim", "run", "-p", "20", "--noprogress"]).unwrap();
        match cli.command {
            Some(Command::Run(args)) => args.apply_to(&mut config),
            _ => panic!("expected the run subcommand"),
        }
        assert_eq!(config.pulses, Some(20));
        assert_eq!(config.nodes, 4);
        assert!(!config.show_progress);
    }

    #[test]
    fn quiet_silences_the_alarm() {
        let mut config = SessionConfig::default();
        let cli = Cli::try_parse_from(["radarsim", "--alarm", "-y"]).unwrap();
        assert!(cli.run.dontask);
        cli.run.apply_to(&mut config);
        assert!(config.alarm);

        let cli = Cli::try_parse_from(["radarsim", "--alarm", "-q"]).unwrap();
        cli.run.apply_to(&mut config);
        assert!(!config.alarm);
    }

    #[test]
    fn only_a_yes_enables_the_output_file() {
        let mut yes = io::Cursor::new("Yes\n");
        assert!(ask_for_output(&mut yes).unwrap());
        let mut enter = io::Cursor::new("\n");
        assert!(!ask_for_output(&mut enter).unwrap());
        let mut no = io::Cursor::new("n\n");
        assert!(!ask_for_output(&mut no).unwrap());
    }

    #[test]
    fn inspect_takes_a_file() {
        let cli = Cli::try_parse_from(["radarsim", "inspect", "sim.iq", "--json"]).unwrap();
        match cli.command {
            Some(Command::Inspect(args)) => {
                assert_eq!(args.file, PathBuf::from("sim.iq"));
                assert!(args.json);
            }
            _ => panic!("expected the inspect subcommand"),
        }
    }
}
