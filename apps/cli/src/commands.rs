//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use repath_core::{DecideContext, DecideRequest, DecisionEngine, PackInput, resolve_best_item};
use repath_packs::{
    FsPackStore, ManifestOptions, build_manifest, load_merged_pack, parse_pack, sha256_hex,
    validate_pack, validate_references, write_manifest,
};
use repath_shared::{AppConfig, init_config, load_config};
use repath_text::Tokenizer;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// repath: ranked reuse, recycling, and disposal pathways from local packs.
#[derive(Parser)]
#[command(
    name = "repath",
    version,
    about = "Decide what to do with an item using jurisdiction knowledge packs.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Pack root directory (overrides `[packs] root`).
    #[arg(long, global = true, env = "REPATH_PACKS_ROOT")]
    pub packs_root: Option<PathBuf>,

    /// Use the naive token normalizer even if a stemmer is configured.
    #[arg(long, global = true)]
    pub no_stemmer: bool,

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
    /// Rank pathways for an item and print the decision as JSON.
    Decide {
        /// Pack identifier; also used as the context municipality.
        #[arg(long)]
        pack: String,

        /// Item label, as picked from a list.
        #[arg(long, conflicts_with = "query_text")]
        label: Option<String>,

        /// Free-text description of the item.
        #[arg(long)]
        query_text: Option<String>,

        /// ISO country code of the requester.
        #[arg(long)]
        country_code: Option<String>,

        #[arg(long)]
        city: Option<String>,

        #[arg(long)]
        zip: Option<String>,

        /// Marketplace subdomain slug, e.g. `fortcollins`.
        #[arg(long)]
        city_slug: Option<String>,

        /// Observation as key=value (repeatable). `true`/`false` become booleans.
        #[arg(long = "obs", value_name = "KEY=VALUE")]
        obs: Vec<String>,
    },

    /// Show the catalog item a query resolves to.
    Query {
        /// Pack identifier.
        #[arg(long)]
        pack: String,

        /// Query words.
        #[arg(required = true)]
        terms: Vec<String>,
    },

    /// Validate one pack, or every pack under the root.
    Validate {
        /// Pack identifier (defaults to all packs).
        #[arg(long)]
        pack: Option<String>,
    },

    /// Write manifest.json and search.json for every pack.
    Manifest {
        /// Output directory (overrides `[manifest] out_dir`).
        #[arg(long)]
        out: Option<PathBuf>,

        /// Public URL prefix for pack URLs (overrides `[packs] base_url`).
        #[arg(long)]
        base_url: Option<String>,

        /// Pack JSON schema to fingerprint, if present.
        #[arg(long, default_value = "schema/pack.schema.json")]
        schema: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "repath=info",
        1 => "repath=debug",
        _ => "repath=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
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

/// Settings shared by every pack command, after config and flags are merged.
struct Session {
    config: AppConfig,
    store: FsPackStore,
    tokenizer: Tokenizer,
}

impl Session {
    fn open(packs_root: Option<PathBuf>, no_stemmer: bool) -> Result<Self> {
        let config = load_config()?;
        let root = packs_root.unwrap_or_else(|| PathBuf::from(&config.packs.root));
        let tokenizer = if no_stemmer {
            Tokenizer::naive()
        } else {
            Tokenizer::from_kind(config.text.effective_stemmer())
        };
        debug!(root = %root.display(), stemmer = tokenizer.stemmer_name(), "session ready");

        Ok(Self {
            config,
            store: FsPackStore::new(root),
            tokenizer,
        })
    }
}

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let Cli {
        packs_root,
        no_stemmer,
        command,
        ..
    } = cli;
    let session = || Session::open(packs_root.clone(), no_stemmer);

    match command {
        Command::Decide {
            pack,
            label,
            query_text,
            country_code,
            city,
            zip,
            city_slug,
            obs,
        } => {
            let context = DecideContext {
                municipality_id: Some(pack.clone()),
                country_code,
                city,
                zip,
                city_slug,
                obs: parse_observations(&obs)?.into_iter().collect(),
                ..Default::default()
            };
            let request = DecideRequest {
                pack_id: Some(pack),
                label,
                query_text,
                context: Some(context),
            };
            cmd_decide(&session()?, &request)
        }
        Command::Query { pack, terms } => cmd_query(&session()?, &pack, &terms.join(" ")),
        Command::Validate { pack } => cmd_validate(&session()?, pack.as_deref()),
        Command::Manifest {
            out,
            base_url,
            schema,
        } => cmd_manifest(&session()?, out, base_url.as_deref(), &schema),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Parse `key=value` observation flags.
fn parse_observations(raw: &[String]) -> Result<Vec<(String, Value)>> {
    raw.iter()
        .map(|entry| {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| eyre!("invalid --obs '{entry}': expected KEY=VALUE"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(eyre!("invalid --obs '{entry}': empty key"));
            }
            let value = match value.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                other => Value::String(other.to_string()),
            };
            Ok((key.to_string(), value))
        })
        .collect()
}

fn cmd_decide(session: &Session, request: &DecideRequest) -> Result<()> {
    let engine = DecisionEngine::new(session.tokenizer.clone());
    let response = engine.decide(request, PackInput::Source(&session.store))?;
    info!(
        pack_id = %response.pack_id,
        pathways = response.pathways.len(),
        questions = response.questions.len(),
        "decision ready"
    );
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn cmd_query(session: &Session, pack_id: &str, query: &str) -> Result<()> {
    let pack = load_merged_pack(pack_id, &session.store)?;
    match resolve_best_item(&pack, query, &session.tokenizer) {
        Some(item) => println!("{}", serde_json::to_string_pretty(item)?),
        None => println!("No match"),
    }
    Ok(())
}

fn cmd_validate(session: &Session, pack_id: Option<&str>) -> Result<()> {
    let ids = match pack_id {
        Some(id) => vec![id.to_string()],
        None => session.store.list_pack_ids()?,
    };
    if ids.is_empty() {
        return Err(eyre!(
            "no packs found under '{}'",
            session.store.root().display()
        ));
    }

    let mut failures = 0usize;
    for id in &ids {
        let raw = session.store.read_raw(id)?;
        let pack = parse_pack(&raw).map_err(|e| eyre!("{id}: invalid JSON: {e}"))?;
        let mut issues = validate_pack(&pack);
        match load_merged_pack(id, &session.store) {
            Ok(merged) => issues.extend(validate_references(&merged)),
            Err(e) => warn!(pack_id = %id, error = %e, "skipping reference checks"),
        }

        for issue in &issues {
            eprintln!("{id}: {issue}");
        }
        failures += issues.len();
    }

    if failures > 0 {
        return Err(eyre!("{failures} validation issue(s) found"));
    }
    println!("Validated {} pack(s)", ids.len());
    Ok(())
}

fn cmd_manifest(
    session: &Session,
    out: Option<PathBuf>,
    base_url: Option<&str>,
    schema: &Path,
) -> Result<()> {
    let base_url = match base_url {
        Some(raw) => Some(Url::parse(raw).map_err(|e| eyre!("invalid base URL '{raw}': {e}"))?),
        None => session.config.pack_base_url()?,
    };
    let schema_sha256 = if schema.is_file() {
        Some(sha256_hex(&std::fs::read(schema)?))
    } else {
        debug!(schema = %schema.display(), "no schema file, omitting fingerprint");
        None
    };
    let options = ManifestOptions {
        base_url,
        schema_sha256,
    };

    let bundle = build_manifest(&session.store, &options, &session.tokenizer)?;
    let out_dir = out.unwrap_or_else(|| PathBuf::from(&session.config.manifest.out_dir));
    let (manifest_path, search_path) = write_manifest(&bundle, &out_dir)?;

    println!("Wrote {} pack(s)", bundle.manifest.len());
    println!("  {}", manifest_path.display());
    println!("  {}", search_path.display());
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
