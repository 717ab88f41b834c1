use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use longreader_core::{
    Article, DebugDump, LongreaderError, MemoryStore, OutputFormat, ParserConfig, ParserService, fetch_file,
    fetch_stdin, parse_html,
};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

mod echo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for the parsed article
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Markdown,
    Json,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: markdown, json", s)),
        }
    }
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Markdown => OutputFormat::Markdown,
            Format::Json => OutputFormat::Json,
        }
    }
}

/// Turn a web article into clean, readable markdown
#[derive(Parser, Debug)]
#[command(name = "longreader")]
#[command(author = "Longreader Contributors")]
#[command(version = VERSION)]
#[command(about = "Turn web articles into clean markdown", long_about = None)]
struct Args {
    /// URL to fetch, local HTML file, or "-" for stdin
    #[arg(value_name = "INPUT")]
    input: String,

    /// Source URL of a local or stdin document (used for metadata and relative links)
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Output format (markdown, json)
    #[arg(short, long, default_value = "markdown", value_name = "FORMAT")]
    format: Format,

    /// Include TOML frontmatter (Markdown only)
    #[arg(long)]
    frontmatter: bool,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "30", value_name = "SECS")]
    timeout: u64,

    /// Minimum length of the extracted markdown
    #[arg(long, default_value = "100", value_name = "CHARS")]
    min_size: usize,

    /// Keep more of the page instead of dropping link-heavy blocks
    #[arg(long)]
    favor_recall: bool,

    /// Strip images from output
    #[arg(long)]
    no_images: bool,

    /// Write the raw HTML and rendered markdown into this directory
    #[arg(long, value_name = "DIR")]
    debug_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn is_remote(&self) -> bool {
        self.input.starts_with("http://") || self.input.starts_with("https://")
    }

    fn parser_config(&self) -> ParserConfig {
        let mut builder = ParserConfig::builder()
            .fetch_timeout(self.timeout)
            .min_output_size(self.min_size)
            .favor_precision(!self.favor_recall)
            .include_images(!self.no_images);

        if let Some(dir) = &self.debug_dir {
            builder = builder.dev_mode(true).debug_dir(dir.clone());
        }

        builder.build()
    }

    /// Source URL recorded for local input.
    fn local_source(&self) -> String {
        match (&self.url, self.input.as_str()) {
            (Some(url), _) => url.clone(),
            (None, "-") => "stdin".to_string(),
            (None, path) => path.to_string(),
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let started = Instant::now();
    let mut timings = Vec::new();
    let config = args.parser_config();

    if args.verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
    }

    if args.frontmatter && args.format == Format::Json {
        echo::print_warning("--frontmatter only applies to markdown output");
    }

    let article = if args.is_remote() {
        if args.url.is_some() {
            echo::print_warning("--url is ignored when INPUT is a URL");
        }
        if args.verbose {
            echo::print_step(1, 2, &format!("Fetching and parsing {}", args.input.bright_white().underline()));
        }

        let step = Instant::now();
        let service = ParserService::with_http(Arc::new(MemoryStore::new()), config)
            .context("Failed to build HTTP client")?;
        let article = service.parse_url(&args.input).await.context("Failed to parse article")?;
        timings.push(("Fetch and parse".to_string(), step.elapsed()));
        article
    } else {
        if args.verbose {
            let source = if args.input == "-" { "stdin" } else { args.input.as_str() };
            echo::print_step(1, 2, &format!("Reading from {}", source.bright_white()));
        }

        let step = Instant::now();
        let html = if args.input == "-" {
            fetch_stdin().context("Failed to read from stdin")?
        } else {
            fetch_file(&args.input).with_context(|| format!("Failed to read file: {}", args.input))?
        };
        timings.push(("Read".to_string(), step.elapsed()));

        if args.verbose {
            eprintln!("  {} {}\n", "Size:".dimmed(), echo::format_size(html.len()).bright_white());
        }

        let step = Instant::now();
        let source = args.local_source();
        let article = parse_html(&html, &source, &config.extract).context("Failed to parse article")?;
        timings.push(("Parse".to_string(), step.elapsed()));

        if let Some(dir) = &args.debug_dir {
            dump_local(&DebugDump::new(dir), &source, &html, &article);
        }
        article
    };

    if args.verbose {
        echo::print_article_details(&article);
        echo::print_step(2, 2, "Writing output");
    }

    let output = article
        .to_format(args.format.into(), args.frontmatter)
        .context("Failed to render article")?;

    match &args.output {
        Some(path) => {
            fs::write(path, output).with_context(|| format!("Failed to write to file: {}", path.display()))?;
            echo::print_success(&format!("Output written to {}", path.display().bright_white()));
        }
        None => print!("{}", output),
    }

    if args.verbose {
        echo::print_timing_summary(started.elapsed(), &timings);
    }

    Ok(())
}

fn dump_local(dump: &DebugDump, source: &str, html: &str, article: &Article) {
    match dump.write(source, html, article) {
        Ok((_, markdown)) => echo::print_info(&format!("Debug dump written to {}", markdown.display())),
        Err(e) => echo::print_warning(&format!("Failed to write debug dump: {}", e)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("{:?}", e);
            echo::print_error(&e.to_string());
            if let Some(err) = e.downcast_ref::<LongreaderError>() {
                echo::print_info(&err.user_message());
            }
            ExitCode::FAILURE
        }
    }
}
