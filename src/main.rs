mod debug_report;

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Instant;

use hoverlens::{
    Annotations, Config, ElementBuilder, EngineSettings, NativeScripts, PageSnapshot, Probe, Rect, RuleEngine, RuleSet,
    Size,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use url::Url;

const DEFAULT_LOCATION: &str = "https://example.com/";

fn main() {
    init_logging();

    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let config = match Config::from_path(&cli.sieve_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {}: {err}", cli.sieve_path);
            std::process::exit(1);
        }
    };

    let (rules, skipped) = RuleSet::compile(&config.sieve, &NativeScripts::new());
    for err in &skipped {
        warn!(%err, "rule skipped");
    }

    let (page, target) = build_page(&cli);
    let started = Instant::now();
    let mut engine = RuleEngine::new(Arc::new(rules), EngineSettings::from(&config.hz));
    let outcome = engine.find(&page, &Annotations::new(), &Probe::Element(target), None);
    let elapsed = started.elapsed();

    let probe = cli.src.as_deref().or(cli.href.as_deref()).unwrap_or_default();
    let run = debug_report::Run { probe, rules: engine.rules(), skipped: &skipped, outcome: &outcome, elapsed };
    debug_report::print_run(&run, cli.color);
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("HOVERLENS_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).with_target(false).init();
}

struct CliConfig {
    sieve_path: String,
    location: Url,
    href: Option<String>,
    src: Option<String>,
    color: bool,
}

/// A body holding one anchor, one image, or an image inside an anchor.
/// Returns the innermost element as the hover target.
fn build_page(cli: &CliConfig) -> (PageSnapshot, hoverlens::ElementId) {
    let (mut page, body) = PageSnapshot::with_body(cli.location.clone(), Size::new(1280.0, 800.0));
    let rect = Rect::new(20.0, 20.0, 200.0, 150.0);
    let mut target = body;
    if let Some(href) = &cli.href {
        target = page.add(Some(target), ElementBuilder::new("a").href(href).rect(rect));
    }
    if let Some(src) = &cli.src {
        target = page.add(Some(target), ElementBuilder::new("img").src(src).rect(rect).natural(200.0, 150.0));
    }
    (page, target)
}

fn parse_args() -> Result<CliConfig, String> {
    let mut sieve_path: Option<String> = None;
    let mut location = DEFAULT_LOCATION.to_string();
    let mut href: Option<String> = None;
    let mut src: Option<String> = None;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("hoverlens {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--href" => href = Some(args.next().ok_or_else(|| "error: --href expects a value".to_string())?),
            "--src" => src = Some(args.next().ok_or_else(|| "error: --src expects a value".to_string())?),
            "--page" => location = args.next().ok_or_else(|| "error: --page expects a value".to_string())?,
            "--sieve" | "-s" => {
                let value = args.next().ok_or_else(|| "error: --sieve expects a value".to_string())?;
                set_once(&mut sieve_path, value)?;
            }
            _ if arg.starts_with("--href=") => href = Some(arg.trim_start_matches("--href=").to_string()),
            _ if arg.starts_with("--src=") => src = Some(arg.trim_start_matches("--src=").to_string()),
            _ if arg.starts_with("--page=") => location = arg.trim_start_matches("--page=").to_string(),
            _ if arg.starts_with("--sieve=") => set_once(&mut sieve_path, arg.trim_start_matches("--sieve=").to_string())?,
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => set_once(&mut sieve_path, arg)?,
        }
    }

    let sieve_path = sieve_path.ok_or_else(|| format!("error: no sieve file provided\n\n{}", help_text()))?;
    if href.is_none() && src.is_none() {
        return Err(format!("error: nothing to hover, pass --href and/or --src\n\n{}", help_text()));
    }
    let location = Url::parse(&location).map_err(|err| format!("error: invalid --page '{location}': {err}"))?;

    Ok(CliConfig { sieve_path, location, href, src, color })
}

fn set_once(slot: &mut Option<String>, value: String) -> Result<(), String> {
    if slot.is_some() {
        return Err("error: sieve file provided multiple times".to_string());
    }
    *slot = Some(value);
    Ok(())
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "hoverlens {version}

Runs a sieve against a single hovered link or image and reports what it resolves to.

Usage:
  hoverlens [OPTIONS] <prefs.json> --href <url>
  hoverlens [OPTIONS] --sieve <prefs.json> --src <url>

Options:
  -s, --sieve <file>         Preference JSON holding the `sieve` rules.
  --href <url>               Hover an anchor with this href.
  --src <url>                Hover an image with this src (inside the anchor
                             when --href is also given).
  --page <url>               Location of the page. Default: {default_location}
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Environment:
  HOVERLENS_LOG              Log filter (tracing env-filter syntax). Default: warn
  HOVERLENS_DEBUG_RULES      Trace every rule the engine tries.

Exit codes:
  0  Success.
  1  The preference file could not be read.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
        default_location = DEFAULT_LOCATION
    )
}
