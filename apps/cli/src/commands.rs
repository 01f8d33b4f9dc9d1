//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use sheetsmith_core::assembler::{self, FileStatus};
use sheetsmith_core::pipeline::{self, BuildConfig, BuildResult, ProgressReporter};
use sheetsmith_shared::{
    MissingAttributePolicy, OutputFormat, PageBreaks, RenderConfig, init_config, init_config_in,
    parse_attribute_arg, resolve_config,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sheetsmith: assemble documentation sets into one document.
#[derive(Parser)]
#[command(
    name = "sheetsmith",
    version,
    about = "Assemble AsciiDoc-flavoured topic files into a single HTML or PDF-ready document.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Assemble a root document into a single output file.
    Build {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file (defaults to `<stem>.html` or `<stem>-assembled.adoc`
        /// next to the root document).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not write the `<output>.manifest.json` sidecar.
        #[arg(long)]
        no_manifest: bool,
    },

    /// Load and render without writing anything; report problems.
    Check {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List tag regions of every reachable source document.
    Tags {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Compare a build manifest with the files on disk.
    Verify {
        /// Path to `<output>.manifest.json`.
        manifest: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Root document plus render overrides shared by `build`, `check` and `tags`.
#[derive(Args, Debug, Clone)]
pub(crate) struct SourceArgs {
    /// Root document.
    pub root: PathBuf,

    /// Config file (defaults to `sheetsmith.toml` next to the root, then the
    /// user config).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format: asciidoc or html.
    #[arg(short, long)]
    pub format: Option<OutputFormat>,

    /// Set an attribute (repeatable). Overrides document entries.
    #[arg(short = 'a', long = "attribute", value_name = "NAME=VALUE")]
    pub attributes: Vec<String>,

    /// Exclude a tag region (repeatable, `update_*` matches by prefix).
    #[arg(long = "exclude-tag", value_name = "TAG")]
    pub exclude_tags: Vec<String>,

    /// Keep only lines inside these tag regions (repeatable).
    #[arg(long = "only-tag", value_name = "TAG")]
    pub only_tags: Vec<String>,

    /// Missing attribute policy: error or passthrough.
    #[arg(long, value_name = "POLICY")]
    pub missing_attribute: Option<MissingAttributePolicy>,

    /// Document title.
    #[arg(long)]
    pub title: Option<String>,

    /// Document author.
    #[arg(long)]
    pub author: Option<String>,

    /// Document version, exposed as `{version}` and `{revnumber}`.
    #[arg(long = "doc-version", value_name = "VERSION")]
    pub doc_version: Option<String>,

    /// Page breaks: none or chapters.
    #[arg(long, value_name = "MODE")]
    pub page_breaks: Option<PageBreaks>,

    /// Omit the table of contents.
    #[arg(long)]
    pub no_toc: bool,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init {
        /// Write `./sheetsmith.toml` instead of the user config.
        #[arg(long)]
        project: bool,
    },
    /// Show resolved configuration.
    Show {
        /// Explicit config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Project directory to look for `sheetsmith.toml` in.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sheetsmith=info",
        1 => "sheetsmith=debug",
        _ => "sheetsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Build {
            source,
            output,
            no_manifest,
        } => cmd_build(&source, output, no_manifest),
        Command::Check { source, json } => cmd_check(&source, json),
        Command::Tags { source } => cmd_tags(&source),
        Command::Verify { manifest, json } => cmd_verify(&manifest, json),
        Command::Config { action } => match action {
            ConfigAction::Init { project } => cmd_config_init(project),
            ConfigAction::Show { config, dir } => cmd_config_show(config.as_deref(), &dir),
        },
    }
}

/// Merge the resolved config file with command-line overrides.
fn render_config(source: &SourceArgs) -> Result<RenderConfig> {
    let project_dir = source
        .root
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let app = resolve_config(source.config.as_deref(), project_dir)?;
    let mut config = RenderConfig::from(&app);

    if let Some(format) = source.format {
        config.format = format;
    }
    if let Some(policy) = source.missing_attribute {
        config.missing_attribute = policy;
    }
    if let Some(page_breaks) = source.page_breaks {
        config.page_breaks = page_breaks;
    }
    if source.no_toc {
        config.toc = false;
    }
    if source.title.is_some() {
        config.title = source.title.clone();
    }
    if source.author.is_some() {
        config.author = source.author.clone();
    }
    if source.doc_version.is_some() {
        config.version = source.doc_version.clone();
    }
    for arg in &source.attributes {
        let (name, value) = parse_attribute_arg(arg)?;
        config.attributes.insert(name, value);
    }
    if !source.exclude_tags.is_empty() {
        config.exclude_tags = source.exclude_tags.clone();
    }
    if !source.only_tags.is_empty() {
        config.only_tags = source.only_tags.clone();
    }

    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_build(source: &SourceArgs, output: Option<PathBuf>, no_manifest: bool) -> Result<()> {
    let render = render_config(source)?;
    let config = BuildConfig {
        root: source.root.clone(),
        output,
        render,
        write_manifest: !no_manifest,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    info!(
        root = %source.root.display(),
        format = config.render.format.as_str(),
        "building document"
    );

    let reporter = CliProgress::new();
    let result = match pipeline::build(&config, &reporter) {
        Ok(result) => result,
        Err(e) => {
            reporter.clear();
            return Err(e.into());
        }
    };

    println!();
    println!("  Document built successfully!");
    println!("  Title:    {}", result.title);
    println!("  Sources:  {}", result.documents);
    println!("  Sections: {}", result.toc_entries);
    println!("  Output:   {} ({} bytes)", result.output.display(), result.bytes);
    if let Some(manifest) = &result.manifest_path {
        println!("  Manifest: {}", manifest.display());
    }
    println!("  Time:     {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_check(source: &SourceArgs, json: bool) -> Result<()> {
    let render = render_config(source)?;
    let report = pipeline::check(&source.root, &render)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    println!("  {} is valid.", source.root.display());
    println!("  Title:    {}", report.title);
    println!("  Sources:  {}", report.documents.len());
    for doc in &report.documents {
        println!("    {doc}");
    }
    if !report.tags.is_empty() {
        let tags: Vec<&str> = report.tags.iter().map(String::as_str).collect();
        println!("  Tags:     {}", tags.join(", "));
    }
    println!("  Headings: {}", report.headings);
    println!("  Size:     {} bytes ({})", report.bytes, render.format.as_str());
    println!();

    Ok(())
}

fn cmd_tags(source: &SourceArgs) -> Result<()> {
    let render = render_config(source)?;
    let listing = pipeline::list_tags(&source.root, &render)?;

    if listing.is_empty() {
        println!("No tag regions found.");
        return Ok(());
    }

    for doc in &listing {
        println!("{}", doc.path);
        for region in &doc.regions {
            let noun = if region.lines == 1 { "line" } else { "lines" };
            println!(
                "  {:<24} {:>5}-{:<5} {} {noun}",
                region.name, region.start_line, region.end_line, region.lines
            );
        }
    }

    Ok(())
}

fn cmd_verify(manifest: &Path, json: bool) -> Result<()> {
    let report = assembler::verify_manifest(manifest)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("  Manifest: {}", manifest.display());
        println!("  Title:    {}", report.title);
        println!(
            "  Output:   {} ({})",
            report.output.path,
            status_label(report.output.status)
        );
        println!("  Sources:  {}", report.sources.len());
        for source in report.stale_sources() {
            println!("    {:<9} {}", status_label(source.status), source.path);
        }
        println!();
    }

    if !report.is_clean() {
        let stale = report.stale_sources().count();
        return Err(eyre!(
            "build is out of date: output {}, {stale} source(s) changed or missing",
            status_label(report.output.status)
        ));
    }
    Ok(())
}

fn status_label(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Unchanged => "unchanged",
        FileStatus::Changed => "changed",
        FileStatus::Missing => "missing",
    }
}

fn cmd_config_init(project: bool) -> Result<()> {
    let path = if project {
        init_config_in(&std::env::current_dir()?)?
    } else {
        init_config()?
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: Option<&Path>, dir: &Path) -> Result<()> {
    let config = resolve_config(config, dir)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn document_loaded(&self, path: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Loaded [{current}/{total}] {path}"));
    }

    fn done(&self, _result: &BuildResult) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/cheatsheet/index.adoc")
    }

    #[test]
    fn parses_build_flags() {
        let cli = Cli::try_parse_from([
            "sheetsmith",
            "-vv",
            "build",
            "index.adoc",
            "-f",
            "html",
            "-a",
            "product=Quarkus",
            "--exclude-tag",
            "update_*",
            "--missing-attribute",
            "passthrough",
            "-o",
            "out.html",
            "--no-manifest",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Build {
                source,
                output,
                no_manifest,
            } => {
                assert_eq!(source.format, Some(OutputFormat::Html));
                assert_eq!(source.attributes, vec!["product=Quarkus"]);
                assert_eq!(source.exclude_tags, vec!["update_*"]);
                assert_eq!(source.missing_attribute, Some(MissingAttributePolicy::Passthrough));
                assert_eq!(output, Some(PathBuf::from("out.html")));
                assert!(no_manifest);
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn cli_flags_override_project_config() {
        let cli = Cli::try_parse_from([
            "sheetsmith",
            "check",
            fixture_root().to_str().unwrap(),
            "-f",
            "asciidoc",
            "--doc-version",
            "3.3.0",
            "-a",
            "product=Quarkus",
        ])
        .unwrap();
        let Command::Check { source, .. } = cli.command else {
            panic!("expected check");
        };

        let config = render_config(&source).unwrap();
        assert_eq!(config.format, OutputFormat::Asciidoc);
        assert_eq!(config.version.as_deref(), Some("3.3.0"));
        assert_eq!(config.author.as_deref(), Some("Quarkus Team"));
        assert_eq!(config.exclude_tags, vec!["update_*"]);
        assert_eq!(config.attributes.get("product").map(String::as_str), Some("Quarkus"));
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(Cli::try_parse_from(["sheetsmith", "build", "a.adoc", "-f", "pdf"]).is_err());
    }
}
