use std::time::Duration;

use hoverlens::{ConfigError, FindOutcome, RuleSet, TargetDetails};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub struct Run<'a> {
    pub probe: &'a str,
    pub rules: &'a RuleSet,
    pub skipped: &'a [ConfigError],
    pub outcome: &'a FindOutcome,
    pub elapsed: Duration,
}

pub fn print_run(run: &Run<'_>, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Resolving: {}", run.probe), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Sieve ━━━", ansi::GRAY));
    print_sieve(run, &palette);

    println!("\n{}", palette.paint("━━━ Result ━━━", ansi::GRAY));
    match run.outcome {
        FindOutcome::Resolved(found) => {
            println!("  {}", palette.paint(format!("✓ {} candidate(s)", found.urls.len()), ansi::GREEN));
            print_candidates(&found.urls, &palette);
            print_details(&found.details, &palette);
        }
        FindOutcome::Pending(pending, details) => {
            let rule = run.rules.get(pending.rule_id).map_or("?", |r| r.name.as_str());
            println!("  {} {}", palette.paint("⧗ resolve request", ansi::YELLOW), palette.dim(format!("rule: {rule}")));
            println!("      {} {}", palette.dim("url:"), palette.bold(&pending.url));
            for (idx, group) in pending.groups.iter().enumerate() {
                println!("      {} {}", palette.paint(format!("${idx}"), ansi::BLUE), group);
            }
            if pending.skip_resolve {
                println!("      {}", palette.dim("answered locally, no fetch"));
            }
            print_details(details, &palette);
        }
        FindOutcome::NoMatch => {
            println!("{}", palette.dim("  No media found"));
            println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
            println!("  • No rule's link or img pattern matched");
            println!("  • A rule matched but its rewrite declined");
            println!("  • The result pointed back at the element itself");
            println!("\n{}", palette.dim("  Tip: Set HOVERLENS_DEBUG_RULES=1 HOVERLENS_LOG=debug to trace rule matching"));
        }
        FindOutcome::CompileError(err) => {
            println!("  {} {}", palette.paint("✗ script error", ansi::RED), err);
        }
    }

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!("  Total: {}", palette.paint(format!("{:?}", run.elapsed), ansi::GREEN));
    println!();
}

fn print_sieve(run: &Run<'_>, palette: &ansi::Palette) {
    println!("  {} {}", palette.paint("rules:", ansi::BLUE), palette.paint(run.rules.len().to_string(), ansi::GREEN));
    for err in run.skipped.iter().take(5) {
        println!("    {} {}", palette.paint("skipped", ansi::YELLOW), palette.dim(err.to_string()));
    }
    if run.skipped.len() > 5 {
        println!("    {}", palette.dim(format!("... +{} more", run.skipped.len() - 5)));
    }
}

fn print_candidates(urls: &[String], palette: &ansi::Palette) {
    for (idx, url) in urls.iter().enumerate() {
        let (url, tag) = match url.strip_prefix('#') {
            Some(rest) => (rest, palette.paint("hi-res", ansi::YELLOW)),
            None => (url.as_str(), String::new()),
        };
        println!("  {} {} {}", palette.paint(format!("[{idx}]"), ansi::GRAY), palette.bold(palette.paint(url, ansi::GREEN)), tag);
    }
}

fn print_details(details: &TargetDetails, palette: &ansi::Palette) {
    if let Some(caption) = &details.caption {
        println!("      {} {}", palette.dim("caption:"), palette.paint(caption, ansi::CYAN));
    }
    if let Some(thumb) = details.thumbnail.as_ref().and_then(|t| t.url.as_deref()) {
        println!("      {} {}", palette.dim("thumbnail:"), thumb);
    }
    if !details.fallback_zoom.is_empty() {
        println!("      {} {}", palette.dim("fallback zoom:"), details.fallback_zoom.join(", "));
    }
}
