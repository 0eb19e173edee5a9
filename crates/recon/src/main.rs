use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use interco_core::{parse_month, MatchStatus, ScopeRequest, Transaction};
use interco_recon::{ReconConfig, Reconciler};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "interco", about = "Inter-company loan reconciliation.")]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database, overrides the config file
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store normalized ledger rows from a JSON array.
    Import {
        /// JSON file holding an array of transactions
        file: PathBuf,
        /// Register the two source ledger files as one upload pair
        #[arg(long, num_args = 2, value_names = ["LEFT", "RIGHT"])]
        files: Option<Vec<String>>,
    },
    /// Suggest matches for unmatched transactions.
    Run {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Only rows from this upload pair
        #[arg(long, conflicts_with_all = ["lender", "borrower", "month", "year"])]
        upload_pair: Option<String>,
    },
    /// List matches.
    Matches {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Only matches touching rows from this upload pair
        #[arg(long, conflicts_with_all = ["lender", "borrower", "month", "year"])]
        upload_pair: Option<String>,
        /// suggested, confirmed or rejected
        #[arg(long)]
        status: Option<MatchStatus>,
    },
    /// List transactions without an active match.
    Unmatched {
        #[command(flatten)]
        scope: ScopeArgs,
        /// Only rows from this upload pair
        #[arg(long, conflicts_with_all = ["lender", "borrower", "month", "year"])]
        upload_pair: Option<String>,
    },
    /// List every transaction of an upload pair.
    Transactions { upload_pair: String },
    /// Confirm the suggested match of a transaction.
    Accept {
        uid: String,
        #[arg(long)]
        by: String,
    },
    /// Reject the suggested match of a transaction.
    Reject {
        uid: String,
        #[arg(long)]
        by: String,
    },
    /// List company pairs.
    Pairs {
        #[arg(value_enum, default_value_t = PairKind::Stored)]
        kind: PairKind,
    },
    /// Declare a company pair.
    Declare { lender: String, borrower: String },
    /// List upload pairs.
    Uploads,
}

#[derive(Args)]
struct ScopeArgs {
    #[arg(long)]
    lender: Option<String>,
    #[arg(long)]
    borrower: Option<String>,
    /// Number, name or abbreviation
    #[arg(long)]
    month: Option<String>,
    #[arg(long)]
    year: Option<i32>,
}

impl ScopeArgs {
    fn request(self) -> anyhow::Result<ScopeRequest> {
        let month = match self.month {
            Some(m) => match parse_month(&m) {
                Some(n) => Some(n),
                None => bail!("unrecognised month '{m}'"),
            },
            None => None,
        };
        Ok(ScopeRequest {
            lender_company: self.lender,
            borrower_company: self.borrower,
            month,
            year: self.year,
        })
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PairKind {
    Stored,
    Detected,
    Manual,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ReconConfig::load(path)?,
        None => ReconConfig::default(),
    };
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    let recon = Reconciler::open(&config)
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;

    match cli.command {
        Commands::Import { file, files } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let records: Vec<Transaction> = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", file.display()))?;
            let pair = match files {
                Some(files) => match <[String; 2]>::try_from(files) {
                    Ok(files) => Some(recon.register_upload_pair(files).await?),
                    Err(_) => bail!("--files takes exactly two names"),
                },
                None => None,
            };
            let count = recon
                .ingest_transactions(records, pair.as_ref().map(|p| p.pair_id.as_str()))
                .await?;
            match pair {
                Some(pair) => println!("Imported {count} transactions as {}", pair.pair_id),
                None => println!("Imported {count} transactions"),
            }
        }
        Commands::Run { scope, upload_pair } => {
            let report = match upload_pair {
                Some(pair_id) => recon.run_upload_pair(&pair_id).await?,
                None => recon.run_reconciliation(scope.request()?).await?,
            };
            print_json(&report)?;
        }
        Commands::Matches {
            scope,
            upload_pair,
            status,
        } => {
            let views = match upload_pair {
                Some(pair_id) => recon.list_upload_pair_matches(&pair_id, status).await?,
                None => recon.list_matches(scope.request()?, status).await?,
            };
            print_json(&views)?;
        }
        Commands::Unmatched { scope, upload_pair } => {
            let rows = match upload_pair {
                Some(pair_id) => recon.list_unmatched_by_upload_pair(&pair_id).await?,
                None => recon.list_unmatched(scope.request()?).await?,
            };
            print_json(&rows)?;
        }
        Commands::Transactions { upload_pair } => {
            print_json(&recon.list_upload_pair_transactions(&upload_pair).await?)?;
        }
        Commands::Accept { uid, by } => {
            print_json(&recon.accept_match(&uid, &by).await?)?;
        }
        Commands::Reject { uid, by } => {
            print_json(&recon.reject_match(&uid, &by).await?)?;
        }
        Commands::Pairs { kind } => {
            let pairs = match kind {
                PairKind::Stored => recon.list_company_pairs().await?,
                PairKind::Detected => recon.list_detected_pairs().await?,
                PairKind::Manual => recon.list_manual_pairs().await?,
            };
            print_json(&pairs)?;
        }
        Commands::Declare { lender, borrower } => {
            if recon.declare_company_pair(&lender, &borrower).await? {
                println!("Declared {lender} -> {borrower}");
            } else {
                println!("{lender} -> {borrower} was already declared");
            }
        }
        Commands::Uploads => {
            print_json(&recon.list_upload_pairs().await?)?;
        }
    }

    Ok(())
}
