//! playbooks CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use playbooks::{
    commands::{
        cmd_backfill, cmd_complete_experiment, cmd_create_experiment, cmd_declare_winner,
        cmd_delete_experiment, cmd_delete_playbook, cmd_generate, cmd_generate_variants,
        cmd_import, cmd_init, cmd_list_experiments, cmd_list_playbooks, cmd_list_variants,
        cmd_show_experiment, cmd_show_playbook, cmd_start_experiment, cmd_status, cmd_track,
        cmd_untrack, print_batch_report, print_experiment_detail, print_experiments,
        print_generate_stats, print_import_stats, print_init_result, print_playbook_detail,
        print_playbooks, print_status, print_tracking_report, print_untrack_result,
        print_variants, read_bundle,
    },
    config::Config,
    error::{Error, Result},
    meta::MetaDb,
    models::{ContentFormat, SuccessMetric},
    playbook::GenerateRequest,
    progress::LogWriterFactory,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "playbooks")]
#[command(version, about = "Mine winning content formulas and test them with experiments", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize playbooks configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Import content, daily metrics and groups from a JSON bundle
    Import {
        /// Path to the bundle file
        file: PathBuf,

        /// Skip auto-tracking of newly imported content
        #[arg(long)]
        no_track: bool,
    },

    /// Generate playbooks from top-performing content
    Generate {
        /// Organization ID
        #[arg(long)]
        org: String,

        /// Lookback window in days (defaults to config)
        #[arg(long)]
        lookback: Option<u32>,

        /// Restrict to a group of integrations
        #[arg(long)]
        group: Option<String>,

        /// Restrict to one integration
        #[arg(long)]
        integration: Option<String>,

        /// Restrict to one format (post, reel, story)
        #[arg(long)]
        format: Option<ContentFormat>,

        /// Also generate variants for each new playbook
        #[arg(long)]
        variants: bool,
    },

    /// Inspect and manage playbooks
    Playbooks {
        #[command(subcommand)]
        action: PlaybookAction,
    },

    /// Generate and list playbook variants
    Variants {
        #[command(subcommand)]
        action: VariantAction,
    },

    /// Manage experiments
    Experiment {
        #[command(subcommand)]
        action: ExperimentAction,
    },

    /// Attribute a content item to matching experiment variants
    Track {
        /// Content item ID
        content_id: String,
    },

    /// Remove a content item from an experiment variant
    Untrack {
        /// Experiment variant link ID
        experiment_variant_id: String,
        /// Content item ID
        content_id: String,
    },

    /// Run tracking over every content item of an organization
    Backfill {
        /// Organization ID
        #[arg(long)]
        org: String,
    },

    /// Show system status
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum PlaybookAction {
    /// List an organization's playbooks
    List {
        #[arg(long)]
        org: String,
    },
    /// Show a playbook with its sources and variants
    Show { id: String },
    /// Soft-delete a playbook
    Delete { id: String },
}

#[derive(Subcommand)]
enum VariantAction {
    /// Replace a playbook's variants with a fresh set of five
    Generate { playbook_id: String },
    /// List a playbook's live variants
    List { playbook_id: String },
}

#[derive(Subcommand)]
enum ExperimentAction {
    /// Create a draft experiment over 2-3 variants of a playbook
    Create {
        #[arg(long)]
        org: String,

        #[arg(long)]
        playbook: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// reach, engagement or combined
        #[arg(long, default_value = "engagement")]
        metric: SuccessMetric,

        /// Playbook variant ID (repeat 2-3 times)
        #[arg(long = "variant", required = true)]
        variants: Vec<String>,
    },
    /// Show an experiment with its variants
    Show { id: String },
    /// List an organization's experiments
    List {
        #[arg(long)]
        org: String,
    },
    /// Move a draft experiment to active
    Start { id: String },
    /// Move an active experiment to completed
    Complete { id: String },
    /// Soft-delete an experiment
    Delete { id: String },
    /// Record the winning variant link
    Winner {
        id: String,
        experiment_variant_id: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(LogWriterFactory::default()))
        .with(filter)
        .init();

    if let Commands::Init { force } = cli.command {
        let base_dir = cli.config.as_ref().map(|path| {
            if path.extension().is_some_and(|e| e == "toml") {
                path.parent().map(PathBuf::from).unwrap_or_else(Config::default_base_dir)
            } else {
                path.clone()
            }
        });
        let result = cmd_init(base_dir, force).await?;
        return output(cli.json, &result, print_init_result);
    }

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "playbooks", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let db = MetaDb::new(&config.paths.db_file).await?;
    let json = cli.json;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => {}

        Commands::Import { file, no_track } => {
            let bundle = read_bundle(&file)?;
            let stats = cmd_import(&config, &db, &bundle, !no_track).await?;
            output(json, &stats, print_import_stats)?;
        }

        Commands::Generate {
            org,
            lookback,
            group,
            integration,
            format,
            variants,
        } => {
            let mut request = GenerateRequest::new(org);
            request.lookback_days = lookback;
            request.group_id = group;
            request.integration_id = integration;
            request.format = format;

            let stats = cmd_generate(&config, &db, &request, variants).await?;
            output(json, &stats, print_generate_stats)?;
        }

        Commands::Playbooks { action } => match action {
            PlaybookAction::List { org } => {
                let playbooks = cmd_list_playbooks(&db, &org).await?;
                output(json, &playbooks, |p| print_playbooks(p))?;
            }
            PlaybookAction::Show { id } => {
                let detail = cmd_show_playbook(&db, &id).await?;
                output(json, &detail, print_playbook_detail)?;
            }
            PlaybookAction::Delete { id } => {
                cmd_delete_playbook(&db, &id).await?;
                println!("✓ Playbook '{}' deleted", id);
            }
        },

        Commands::Variants { action } => {
            let variants = match action {
                VariantAction::Generate { playbook_id } => {
                    cmd_generate_variants(&db, &playbook_id).await?
                }
                VariantAction::List { playbook_id } => cmd_list_variants(&db, &playbook_id).await?,
            };
            output(json, &variants, |v| print_variants(v))?;
        }

        Commands::Experiment { action } => handle_experiment(&db, action, json).await?,

        Commands::Track { content_id } => {
            let report = cmd_track(&config, &db, &content_id).await?;
            output(json, &report, print_tracking_report)?;
        }

        Commands::Untrack {
            experiment_variant_id,
            content_id,
        } => {
            let result = cmd_untrack(&db, &experiment_variant_id, &content_id).await?;
            output(json, &result, print_untrack_result)?;
        }

        Commands::Backfill { org } => {
            let batch = cmd_backfill(&config, &db, &org).await?;
            output(json, &batch, print_batch_report)?;
        }

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;
            output(json, &status, print_status)?;
        }
    }

    Ok(())
}

async fn handle_experiment(db: &MetaDb, action: ExperimentAction, json: bool) -> Result<()> {
    let detail = match action {
        ExperimentAction::Create {
            org,
            playbook,
            name,
            description,
            metric,
            variants,
        } => cmd_create_experiment(db, &org, &playbook, &name, description, metric, variants).await?,
        ExperimentAction::Show { id } => cmd_show_experiment(db, &id).await?,
        ExperimentAction::List { org } => {
            let experiments = cmd_list_experiments(db, &org).await?;
            return output(json, &experiments, |e| print_experiments(e));
        }
        ExperimentAction::Start { id } => cmd_start_experiment(db, &id).await?,
        ExperimentAction::Complete { id } => cmd_complete_experiment(db, &id).await?,
        ExperimentAction::Delete { id } => {
            cmd_delete_experiment(db, &id).await?;
            println!("✓ Experiment '{}' deleted", id);
            return Ok(());
        }
        ExperimentAction::Winner {
            id,
            experiment_variant_id,
        } => cmd_declare_winner(db, &id, &experiment_variant_id).await?,
    };

    output(json, &detail, print_experiment_detail)
}

fn output<T: Serialize + ?Sized>(json: bool, value: &T, print: impl Fn(&T)) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print(value);
    }
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => {
            let config = Config::load_from(None)?;
            if !config.is_initialized() {
                return Err(Error::NotInitialized);
            }
            Ok(config)
        }
    }
}
