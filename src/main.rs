//! mathclip - extract equations from HTML pages

use std::process::ExitCode;

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use mathclip::{Format, SchedulerConfig, Session, Settings, parse_html_bytes};

#[derive(Parser)]
#[command(name = "mathclip")]
#[command(version, about = "Extract rendered equations from HTML", long_about = None)]
#[command(after_help = "EXAMPLES:
    mathclip page.html                  Print every equation as MathML
    mathclip -f latex page.html         Print LaTeX sources
    mathclip --json -f unicode page.html
    mathclip -i page.html               Show what was detected")]
struct Cli {
    /// Input HTML file
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output format: mathml, latex, unicode or asciimath
    #[arg(short, long, default_value = "mathml", value_parser = parse_format)]
    format: Format,

    /// Print JSON records instead of plain blocks
    #[arg(long)]
    json: bool,

    /// Show detection statistics instead of equations
    #[arg(short, long)]
    info: bool,

    /// More log output (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_format(name: &str) -> Result<Format, String> {
    name.parse().map_err(|e: mathclip::Error| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("mathclip={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> mathclip::Result<()> {
    let bytes = std::fs::read(&cli.input)?;
    let dom = parse_html_bytes(&bytes);
    let settings = Settings {
        format: cli.format,
        ..Settings::default()
    };
    let mut session = Session::new(dom, settings, SchedulerConfig::default())?;
    session.run_until_idle(0);

    if cli.info {
        let stats = session.stats();
        println!("File: {}", cli.input);
        println!("Engine: {}", stats.engine.as_str());
        println!("Equations: {}", stats.total);
        let mut counts = std::collections::BTreeMap::new();
        for entry in session.registry().iter() {
            *counts.entry(entry.kind.as_str()).or_insert(0usize) += 1;
        }
        for (kind, count) in counts {
            println!("  {kind}: {count}");
        }
        return Ok(());
    }

    let extracted = session.extract_all(cli.format);
    let missing = extracted.iter().filter(|e| e.content.is_none()).count();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&extracted)?);
    } else {
        let blocks: Vec<&str> = extracted.iter().filter_map(|e| e.content.as_deref()).collect();
        if !blocks.is_empty() {
            println!("{}", blocks.join("\n\n"));
        }
    }
    if missing > 0 {
        eprintln!("{missing} equation(s) had no {} source", cli.format);
    }
    Ok(())
}
