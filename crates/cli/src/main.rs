use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::mpsc;

use ark_metadata_core::config::{config_path, load_config, set_config_key, AppConfig};
use ark_metadata_core::error::MetadataError;
use ark_metadata_core::lookup::ark::ArkSource;
use ark_metadata_core::lookup::{AbortFlag, CoverOutcome, MetadataQuery, MetadataSource, TaskOutcome};
use ark_metadata_core::metadata::Identifiers;

#[derive(Parser)]
#[command(name = "ark-metadata")]
#[command(about = "Book metadata and cover lookup on ark.no")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Answer requests from a fixture directory instead of the network
    #[arg(long, global = true)]
    fixtures: Option<String>,

    /// Extract candidates in parallel worker threads
    #[arg(long, global = true)]
    fan_out: bool,

    /// Per-request timeout in seconds (overrides config)
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up metadata by ISBN, or by title and author
    Identify {
        #[command(flatten)]
        query: QueryArgs,
    },

    /// Download a cover image
    Cover {
        #[command(flatten)]
        query: QueryArgs,

        /// Output image path (extension added from the image type if missing)
        #[arg(short, long, default_value = "cover")]
        output: String,
    },

    /// Print the product URL for an ISBN
    Resolve {
        /// ISBN-10 or ISBN-13
        isbn: String,
    },

    /// Print the identifier embedded in a product URL
    IdFromUrl {
        url: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Book title
    #[arg(long)]
    title: Option<String>,

    /// Author (repeatable; the first one is searched)
    #[arg(long = "author")]
    authors: Vec<String>,

    /// ISBN
    #[arg(long)]
    isbn: Option<String>,
}

impl QueryArgs {
    fn to_query(&self) -> MetadataQuery {
        let mut identifiers = Identifiers::new();
        if let Some(isbn) = &self.isbn {
            identifiers.insert("isbn".to_string(), isbn.clone());
        }
        MetadataQuery {
            title: self.title.clone(),
            authors: self.authors.clone(),
            identifiers,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Initialize default config file
    Init,
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Key (dot-separated path)
        key: String,
        /// Value
        value: String,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Identify { query } => with_source(&cli, |src| run_identify(src, query, cli.json)),
        Commands::Cover { query, output } => with_source(&cli, |src| run_cover(src, query, output, cli.json)),
        Commands::Resolve { isbn } => with_source(&cli, |src| run_resolve(src, isbn, cli.json)),
        Commands::IdFromUrl { url } => with_source(&cli, |src| run_id_from_url(src, url, cli.json)),
        Commands::Config { action } => run_config(action, cli.json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn with_source(cli: &Cli, run: impl FnOnce(&ArkSource) -> CliResult) -> CliResult {
    let src = build_source(cli)?;
    run(&src)
}

fn build_source(cli: &Cli) -> Result<ArkSource, MetadataError> {
    let mut cfg = load_config();
    if cli.fan_out {
        cfg.lookup.fan_out = true;
    }
    if let Some(secs) = cli.timeout {
        cfg.lookup.timeout_secs = secs;
    }
    ArkSource::from_config(&cfg, cli.fixtures.as_deref().map(Path::new))
}

fn run_identify(src: &ArkSource, args: &QueryArgs, json: bool) -> CliResult {
    let query = args.to_query();
    if query.title.is_none() && query.authors.is_empty() && query.identifiers.is_empty() {
        return Err("Give at least one of --title, --author or --isbn".into());
    }
    let (results, report) = src.identify_ranked(&AbortFlag::new(), &query, src.options().timeout)?;
    for c in &report.candidates {
        if let TaskOutcome::Failed(reason) = &c.outcome {
            eprintln!("Failed: {} - {}", c.url, reason);
        }
    }
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No results found");
        return Ok(());
    }
    for (i, r) in results.iter().enumerate() {
        println!("Result {}: {} by {}", i + 1, r.title, r.authors.join(", "));
        if let Some(isbn) = r.isbn() {
            println!("  ISBN: {}", isbn);
        }
        if let Some(p) = &r.publisher {
            println!("  Publisher: {}", p);
        }
        if let Some(d) = &r.pubdate {
            println!("  Published: {}", d.format("%Y-%m-%d"));
        }
        if !r.languages.is_empty() {
            println!("  Languages: {}", r.languages.join(", "));
        }
        if let Some(s) = &r.series {
            match r.series_index {
                Some(n) => println!("  Series: {} #{}", s, n),
                None => println!("  Series: {}", s),
            }
        }
    }
    Ok(())
}

fn run_cover(src: &ArkSource, args: &QueryArgs, output: &str, json: bool) -> CliResult {
    let query = args.to_query();
    let (tx, rx) = mpsc::channel();
    let outcome = src.download_cover(&tx, &AbortFlag::new(), &query, src.options().timeout);
    drop(tx);
    let url = match outcome {
        CoverOutcome::Downloaded { url } => url,
        CoverOutcome::NotFound => return Err("No cover found".into()),
        CoverOutcome::Aborted => return Err("Cover download aborted".into()),
        CoverOutcome::Failed(reason) => return Err(format!("Cover download failed: {}", reason).into()),
    };
    let cover = rx.try_recv()?;
    let mut out_path = Path::new(output).to_path_buf();
    if out_path.extension().is_none() {
        out_path.set_extension(cover.extension());
    }
    std::fs::write(&out_path, &cover.data)?;
    if json {
        let info = serde_json::json!({
            "url": url,
            "path": out_path.display().to_string(),
            "media_type": cover.media_type,
            "bytes": cover.data.len(),
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("Saved cover from {} to {}", url, out_path.display());
    }
    Ok(())
}

fn run_resolve(src: &ArkSource, isbn: &str, json: bool) -> CliResult {
    let mut identifiers = Identifiers::new();
    identifiers.insert("isbn".to_string(), isbn.to_string());
    let url = src.resolve_url(&identifiers).ok_or_else(|| format!("Not a valid ISBN: {}", isbn))?;
    if json {
        println!("{}", serde_json::json!({ "url": url }));
    } else {
        println!("{}", url);
    }
    Ok(())
}

fn run_id_from_url(src: &ArkSource, url: &str, json: bool) -> CliResult {
    let (scheme, value) = src.id_from_url(url).ok_or_else(|| format!("No identifier in URL: {}", url))?;
    if json {
        println!("{}", serde_json::json!({ "scheme": scheme, "value": value }));
    } else {
        println!("{}:{}", scheme, value);
    }
    Ok(())
}

fn run_config(action: &ConfigAction, json: bool) -> CliResult {
    match action {
        ConfigAction::Init => {
            let path = config_path().ok_or("Could not determine config directory")?;
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let toml = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(&path, toml)?;
            println!("Wrote default config to {}", path.display());
        }
        ConfigAction::Show => {
            let cfg = load_config();
            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else {
                println!("{}", toml::to_string_pretty(&cfg)?);
            }
        }
        ConfigAction::Set { key, value } => {
            let path = config_path().ok_or("Could not determine config directory")?;
            let mut cfg: AppConfig = if path.exists() {
                let s = std::fs::read_to_string(&path)?;
                toml::from_str(&s).unwrap_or_default()
            } else {
                AppConfig::default()
            };

            set_config_key(&mut cfg, key, value)?;

            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let toml = toml::to_string_pretty(&cfg)?;
            std::fs::write(&path, toml)?;
            if !json {
                println!("Updated {}", key);
            }
        }
    }
    Ok(())
}
