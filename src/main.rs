use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use doclineage_core::{DocumentMetadata, LineageConfig, OutputFormat, Stamp};
use doclineage_history::catalog::build_catalog;
use doclineage_history::listing::build_listings;
use doclineage_history::{Engine, MiningOutput, RepoSource, Resolution};

const CONFIG_FILE: &str = ".doclineage.toml";

#[derive(Parser)]
#[command(
    name = "doclineage",
    version,
    about = "Mine git history for document lifecycle dates",
    long_about = "doclineage walks the first-parent history of one or more repositories and\n\
                   derives, per document, when it was created, last updated, last changed\n\
                   status and finalized. Renames are followed so dates survive file moves.\n\n\
                   Examples:\n  \
                     doclineage mine --repo ./EIPs            Mine a repository (text summary)\n  \
                     doclineage mine --format json -o out.json  Write the catalog as JSON\n  \
                     doclineage resolve 20                    Show the canonical identifier\n  \
                     doclineage listing                       Group documents by type and category\n  \
                     doclineage init                          Create a .doclineage.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .doclineage.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text  Human-readable summaries (default)\n  \
                         json  Machine-readable JSON with camelCase keys"
    )]
    format: OutputFormat,

    /// Enable verbose (debug) logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct RepoArgs {
    /// Repository to mine; repeat to merge several histories (default: current directory)
    #[arg(long = "repo", default_value = ".")]
    repos: Vec<PathBuf>,

    /// Branch to walk in every repository (default: HEAD)
    #[arg(long)]
    branch: Option<String>,
}

impl RepoArgs {
    fn sources(&self) -> Vec<RepoSource> {
        self.repos
            .iter()
            .map(|path| {
                let source = RepoSource::new(path);
                match &self.branch {
                    Some(branch) => source.with_branch(branch.clone()),
                    None => source,
                }
            })
            .collect()
    }
}

#[derive(Subcommand)]
enum Command {
    /// Mine lifecycle metadata from git history
    #[command(long_about = "Mine lifecycle metadata from git history.\n\n\
        Walks history newest-first, follows renames and removals through an alias\n\
        table and prints the resulting catalog. Declared header dates take\n\
        precedence over derived ones unless --raw is given.\n\n\
        Examples:\n  doclineage mine --repo ./EIPs --repo ./ERCs\n  doclineage mine --format json --raw")]
    Mine {
        #[command(flatten)]
        repos: RepoArgs,

        /// Write output to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Print mined metadata without catalog transforms
        #[arg(long)]
        raw: bool,
    },
    /// Resolve an identifier through the alias table
    #[command(long_about = "Resolve an identifier through the alias table.\n\n\
        Prints the canonical identifier a retired identifier was renamed to, or\n\
        'removed' if its lineage ends in a deletion.\n\n\
        Examples:\n  doclineage resolve 2535 --repo ./EIPs")]
    Resolve {
        /// Identifier to resolve
        id: String,

        #[command(flatten)]
        repos: RepoArgs,
    },
    /// Group mined documents into listings by type and category
    Listing {
        #[command(flatten)]
        repos: RepoArgs,
    },
    /// Create a default .doclineage.toml configuration file
    #[command(long_about = "Create a default .doclineage.toml configuration file.\n\n\
        Fails if .doclineage.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<LineageConfig> {
    let path = match path {
        Some(path) => path,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if !default_path.exists() {
                tracing::debug!("no {CONFIG_FILE} found; using defaults");
                return Ok(LineageConfig::default());
            }
            default_path
        }
    };
    let config = LineageConfig::from_file(path)?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

fn progress_bar() -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new(0);
    if let Ok(style) =
        indicatif::ProgressStyle::with_template("{spinner:.cyan} walking history [{bar:30}] {pos}/{len} ({elapsed})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

fn run_engine(config: &LineageConfig, repos: &RepoArgs, verbose: bool) -> Result<MiningOutput> {
    let mut engine = Engine::new(config.clone())?;
    if !verbose && std::io::stderr().is_terminal() {
        engine = engine.with_progress(progress_bar());
    }
    let output = engine.run(&repos.sources())?;
    eprintln!(
        "Walked {} commits: {} documents, {} aliases.",
        output.stats.commits,
        output.documents.len(),
        output.aliases.len()
    );
    Ok(output)
}

fn date(stamp: Option<&Stamp>) -> String {
    stamp.map_or_else(|| "-".into(), Stamp::iso_date)
}

fn render_text(output: &MiningOutput, config: &LineageConfig) -> String {
    let mut out = String::new();
    for (id, doc) in &output.documents {
        out.push_str(&document_line(id, doc, config));
        out.push('\n');
    }
    if !output.aliases.is_empty() {
        out.push_str("\nAliases:\n");
        for (from, to) in output.aliases.iter() {
            out.push_str(&format!("  {from} -> {}\n", to.unwrap_or("(removed)")));
        }
    }
    let stats = &output.stats;
    out.push_str(&format!(
        "\n{} commits, {} records, {} renames, {} removals, {} parse failures, {} skipped complete\n",
        stats.commits,
        stats.records,
        stats.renames,
        stats.removals,
        stats.parse_failures,
        stats.skipped_complete
    ));
    out
}

fn document_line(id: &str, doc: &DocumentMetadata, config: &LineageConfig) -> String {
    format!(
        "{id:<8} {:<10} created {}  updated {}  status-change {}  finalized {}",
        doc.status(&config.status).unwrap_or("?"),
        date(doc.created_at.as_ref()),
        date(doc.last_updated_at.as_ref()),
        date(doc.last_status_change_at.as_ref()),
        date(doc.finalized_at.as_ref()),
    )
}

fn write_output(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .into_diagnostic()
                .wrap_err(format!("writing {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{content}"),
    }
    Ok(())
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("doclineage v{version} - document lifecycle dates from git history\n");

    println!("Quick start:");
    println!("  doclineage init                 Create a .doclineage.toml config file");
    println!("  doclineage mine --repo .        Mine the repository in the current directory\n");

    println!("All commands:");
    println!("  mine      Derive lifecycle metadata and print the catalog");
    println!("  resolve   Follow an identifier through renames and removals");
    println!("  listing   Group documents by type and category");
    println!("  init      Create default configuration\n");

    println!("Run 'doclineage <command> --help' for details.");
}

const DEFAULT_CONFIG: &str = r#"# doclineage configuration

[documents]
# Repository-relative directories holding documents (empty = whole tree)
directories = ["EIPS", "ERCS"]
# Regex matched against each path; the first capture group is the identifier
pattern = '(?i)(?:eip|erc)-(\w+)\.md$'
# Count header-declared dates (created, finalized, ...) as known
trust_declared_dates = true

[status]
field = "status"
terminal = ["Final", "Living"]
# Redirect stubs whose versions are ignored
skip = ["Moved"]

[matching]
# Minimum Jaccard similarity of line sets for an add/remove pair to count as a rename
threshold = 0.5
binary_probe_bytes = 8000

[catalog]
types = ["Standards Track", "Informational", "Meta"]
# exclude = ["2535"]
default_title_prefix = "EIP"

[catalog.categories]
"Standards Track" = ["Core", "ERC", "Interface", "Networking"]

[catalog.title_prefixes]
ERC = "ERC"
"#;

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        None => print_welcome(),
        Some(Command::Mine { repos, output, raw }) => {
            let config = load_config(cli.config.as_deref())?;
            let mined = run_engine(&config, &repos, cli.verbose)?;
            let content = match cli.format {
                OutputFormat::Json => {
                    let documents = if raw {
                        serde_json::to_value(&mined.documents).into_diagnostic()?
                    } else {
                        serde_json::to_value(build_catalog(&mined.documents, &config.catalog))
                            .into_diagnostic()?
                    };
                    let json = serde_json::json!({
                        "documents": documents,
                        "aliases": mined.aliases,
                        "stats": mined.stats,
                    });
                    let mut rendered = serde_json::to_string_pretty(&json).into_diagnostic()?;
                    rendered.push('\n');
                    rendered
                }
                OutputFormat::Text => render_text(&mined, &config),
            };
            write_output(&content, output.as_deref())?;
        }
        Some(Command::Resolve { id, repos }) => {
            let config = load_config(cli.config.as_deref())?;
            let mined = run_engine(&config, &repos, cli.verbose)?;
            let resolution = mined.aliases.resolve(&id);
            match cli.format {
                OutputFormat::Json => {
                    let (kind, canonical) = match &resolution {
                        Resolution::Canonical(c) => ("canonical", Some(c.as_str())),
                        Resolution::Removed => ("removed", None),
                        Resolution::Cycle => ("cycle", None),
                    };
                    let json = serde_json::json!({
                        "id": id,
                        "resolution": kind,
                        "canonical": canonical,
                        "known": canonical.is_some_and(|c| mined.documents.contains_key(c)),
                    });
                    println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
                }
                OutputFormat::Text => match resolution {
                    Resolution::Canonical(c) if mined.documents.contains_key(&c) => println!("{c}"),
                    Resolution::Canonical(c) => println!("{c} (no document)"),
                    Resolution::Removed => println!("removed"),
                    Resolution::Cycle => {
                        miette::bail!("alias chain for '{id}' loops; see warnings above")
                    }
                },
            }
        }
        Some(Command::Listing { repos }) => {
            let config = load_config(cli.config.as_deref())?;
            let mut mined = run_engine(&config, &repos, cli.verbose)?;
            mined
                .documents
                .retain(|id, _| !config.catalog.exclude.contains(id));
            let listings = build_listings(&mined.documents, &config.catalog);
            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&listings).into_diagnostic()?);
                }
                OutputFormat::Text => {
                    for listing in &listings {
                        println!(
                            "{} [{}] ({}): {}",
                            listing.title,
                            listing.slug,
                            listing.identifiers.len(),
                            listing.identifiers.join(", ")
                        );
                    }
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "doclineage", &mut std::io::stdout());
        }
    }

    Ok(())
}
