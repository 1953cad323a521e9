//! Cockpit Logbook CLI
//!
//! # Usage
//!
//! ```bash
//! # Debrief interactively; /commit saves the draft to the logbook
//! logbook_cli chat
//!
//! # Dashboard figures
//! logbook_cli stats
//!
//! # Search the archive
//! logbook_cli search crosswind --limit 5
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use cockpit_logbook::logbook::{recent, search};
use cockpit_logbook::session::GREETING;
use cockpit_logbook::{
    CompletionClient, ConversationSession, DraftRecord, GeminiBackend, JsonlLogbook,
    LogbookConfig, LogbookEntry, LogbookStats, LogbookStore, TurnError, TurnStatus,
};

#[derive(Parser)]
#[command(name = "logbook_cli")]
#[command(version)]
#[command(about = "Conversational flight debrief logbook")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file (environment variables are used otherwise)
    #[arg(long, short, global = true, env = "LOGBOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Logbook file, overrides the configured path
    #[arg(long, global = true)]
    logbook: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Debrief a flight interactively
    Chat,

    /// Show logbook statistics
    Stats,

    /// Search memos and tags
    Search {
        /// Keyword (case-insensitive); empty lists the newest entries
        #[arg(default_value = "")]
        query: String,

        /// Maximum number of entries to show
        #[arg(long, short, default_value_t = 5)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "ERROR:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => LogbookConfig::load_from_file(path)
            .with_context(|| format!("Loading {}", path.display()))?,
        None => LogbookConfig::from_env()?,
    };
    if let Some(path) = cli.logbook {
        config.logbook_path = path;
    }
    let store = JsonlLogbook::new(config.logbook_path.clone());

    match cli.command {
        Commands::Chat => chat(&config, &store).await,
        Commands::Stats => stats(&store),
        Commands::Search { query, limit } => search_entries(&store, &query, limit),
    }
}

async fn chat(config: &LogbookConfig, store: &JsonlLogbook) -> Result<()> {
    config.validate()?;
    let backend = Arc::new(GeminiBackend::from_config(config)?);
    let client = CompletionClient::from_config(backend, config)?;
    let mut session = ConversationSession::new(config.tag_policy);
    let mut editor = DefaultEditor::new()?;

    let models: Vec<&str> = client.endpoints().iter().map(|e| e.model.as_str()).collect();
    println!("{}", GREETING.green().bold());
    println!(
        "{}",
        format!(
            "Session {} | models {} | logbook {}",
            session.id(),
            models.join(" > "),
            store.path().display()
        )
        .dimmed()
    );
    println!(
        "{}",
        "Commands: /draft  /commit [YYYY-MM-DD]  /reset  /quit".dimmed()
    );

    loop {
        let line = match editor.readline("PILOT> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        editor.add_history_entry(line)?;

        match line.split_once(' ').map_or((line, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit", _) => break,
            ("/draft", _) => print_draft(session.draft()),
            ("/reset", _) => {
                session.reset();
                println!("{}", GREETING.green().bold());
            }
            ("/commit", date) => {
                let date = if date.is_empty() {
                    Local::now().date_naive()
                } else {
                    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                        Ok(date) => date,
                        Err(e) => {
                            println!("{} {}: {}", "ERR:".red(), date, e);
                            continue;
                        }
                    }
                };
                let entry = session.commit(date);
                store.append(std::slice::from_ref(&entry))?;
                println!("{} {}", "DATA SAVED".green().bold(), entry.title());
            }
            _ => {
                println!("{}", "PROCESSING DATA...".dimmed());
                match session.handle_turn(&client, line).await {
                    Ok(outcome) => {
                        println!("{}", outcome.reply.cyan());
                        if outcome.status == TurnStatus::MalformedPayload {
                            println!("{}", "(payload unreadable, draft unchanged)".yellow());
                        }
                        print_draft(&outcome.draft);
                    }
                    Err(e @ TurnError::BackendUnavailable { .. }) => {
                        println!("{} {}", "ERR:".red().bold(), e);
                    }
                    Err(e) => println!("{} {}", "ERR:".red(), e),
                }
            }
        }
    }

    Ok(())
}

fn print_draft(draft: &DraftRecord) {
    println!("{}", "── DRAFT ──".bold());
    println!("  {:<6} {}", "PHASE".bold(), draft.phase);
    println!("  {:<6} {}", "ARPT".bold(), draft.location);
    println!("  {:<6} {}", "TAGS".bold(), draft.tags_display());
    println!("  {}", "FACTS".bold());
    for line in draft.summary.lines() {
        println!("    {}", line);
    }
    if !draft.note.is_empty() {
        println!("  {}", "NOTES".bold());
        println!("    {}", draft.note);
    }
}

fn stats(store: &JsonlLogbook) -> Result<()> {
    let entries = store.read()?;
    let stats = LogbookStats::from_entries(&entries);
    let na = || "N/A".to_string();

    println!("{}", store.path().display().to_string().dimmed());
    println!("{} {}", "TOTAL ENTRIES".cyan().bold(), stats.total_entries);
    println!(
        "{} {}",
        "LAST AIRPORT ".cyan().bold(),
        stats.last_location.unwrap_or_else(na)
    );
    println!(
        "{} {}",
        "TOP ISSUE    ".cyan().bold(),
        stats.top_tag.map(|t| t.to_string()).unwrap_or_else(na)
    );
    for (tag, count) in &stats.tag_counts {
        println!("  {:<3} {:>3} {}", tag, count, "█".repeat(*count).green());
    }
    Ok(())
}

fn search_entries(store: &JsonlLogbook, query: &str, limit: usize) -> Result<()> {
    let entries = store.read()?;
    let hits: Vec<&LogbookEntry> = if query.trim().is_empty() {
        recent(&entries, limit)
    } else {
        search(&entries, query).into_iter().take(limit).collect()
    };

    if hits.is_empty() {
        println!("{}", "NO DATA FOUND.".yellow());
        return Ok(());
    }

    for entry in hits {
        println!("{}", entry.title().bold());
        println!("  {} {}", "TAGS:".cyan(), entry.tags_display());
        for line in entry.summary.lines() {
            println!("  {}", line);
        }
        if !entry.note.is_empty() {
            println!("  {} {}", "INSTRUCTOR:".green(), entry.note);
        }
    }
    Ok(())
}
