use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use studiolink::config::Config;
use studiolink::db::{DbEmail, DbEntity, LinkDb};
use studiolink::pipeline::run_batch;
use studiolink::review;
use studiolink::suggestion::{Decision, SuggestionStatus};

#[derive(Parser)]
#[command(name = "studiolink")]
#[command(about = "Suggest links between inbound email and studio proposals/projects", long_about = None)]
struct Cli {
    /// Database path (defaults to ~/.studiolink/studiolink.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Config path (defaults to ~/.studiolink/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process unprocessed emails into pending suggestions
    Run,
    /// Ingest a JSON array of emails
    Ingest {
        #[arg(long)]
        file: PathBuf,
    },
    /// Import (upsert) a JSON array of proposals/projects
    ImportEntities {
        #[arg(long)]
        file: PathBuf,
    },
    /// List suggestions by status
    Suggestions {
        #[arg(long, default_value = "pending")]
        status: String,
    },
    /// Approve or deny one pending suggestion
    Decide {
        suggestion_id: String,
        /// "approve" or "deny"
        decision: String,
        #[arg(long, env = "USER")]
        reviewer: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Approve or deny many suggestions; items are independent
    DecideBatch {
        /// "approve" or "deny"
        decision: String,
        suggestion_ids: Vec<String>,
        #[arg(long, env = "USER")]
        reviewer: String,
    },
    /// Undo an applied suggestion's link
    Revert {
        suggestion_id: String,
        #[arg(long, env = "USER")]
        reviewer: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let db = match cli.db {
        Some(path) => LinkDb::open_at(path),
        None => LinkDb::open(),
    }
    .map_err(|e| e.to_string())?;

    match cli.command {
        Commands::Run => {
            let report = run_batch(&db, &config).map_err(|e| e.to_string())?;
            print_json(&report)
        }
        Commands::Ingest { file } => {
            let emails: Vec<DbEmail> = read_json(&file)?;
            let mut inserted = 0;
            for email in &emails {
                if db.insert_email(email).map_err(|e| e.to_string())? {
                    inserted += 1;
                }
            }
            println!("{inserted} new emails ({} already known)", emails.len() - inserted);
            Ok(())
        }
        Commands::ImportEntities { file } => {
            let entities: Vec<DbEntity> = read_json(&file)?;
            for entity in &entities {
                db.upsert_entity(entity).map_err(|e| e.to_string())?;
            }
            println!("{} entities imported", entities.len());
            Ok(())
        }
        Commands::Suggestions { status } => {
            let status = SuggestionStatus::from_str_lossy(&status);
            let suggestions = db
                .get_suggestions_by_status(status)
                .map_err(|e| e.to_string())?;
            print_json(&suggestions)
        }
        Commands::Decide {
            suggestion_id,
            decision,
            reviewer,
            notes,
        } => {
            let decision = parse_decision(&decision)?;
            let suggestion =
                review::decide(&db, &suggestion_id, decision, &reviewer, notes.as_deref())
                    .map_err(|e| e.to_string())?;
            print_json(&suggestion)
        }
        Commands::DecideBatch {
            decision,
            suggestion_ids,
            reviewer,
        } => {
            let decision = parse_decision(&decision)?;
            let outcomes = review::decide_batch(&db, &suggestion_ids, decision, &reviewer);
            print_json(&outcomes)
        }
        Commands::Revert {
            suggestion_id,
            reviewer,
        } => {
            let outcome =
                review::revert(&db, &suggestion_id, &reviewer).map_err(|e| e.to_string())?;
            print_json(&outcome)
        }
    }
}

fn parse_decision(raw: &str) -> Result<Decision, String> {
    match raw {
        "approve" => Ok(Decision::Approve),
        "deny" => Ok(Decision::Deny),
        other => Err(format!("unknown decision \"{other}\" (expected approve or deny)")),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{rendered}");
    Ok(())
}
