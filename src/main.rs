use anyhow::{Context as AnyhowContext, Result};
use clap::{Parser, Subcommand};
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use std::collections::HashSet;
use std::env;
use std::io::IsTerminal;
use std::num::NonZeroUsize;
use std::sync::Arc;
use termcolor::{Color, ColorChoice, StandardStream};
use tokio::io::BufReader;

mod client;
mod config;
mod constants;
mod context;
mod controller;
mod dashboard;
mod display;
mod error;
mod protocol;
mod truncate;

use constants::constants::BROWSE_ALL_QUERY;
use context::AppContext;
use dashboard::Dashboard;
use display::{print_status, render_records, RenderOptions};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend base URL (overrides config files and SQLDASH_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Print debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive dashboard (default command)
    Dashboard,
    /// Show the questions most similar to QUESTION
    Search {
        /// Free-text question
        question: String,
        /// Number of results (defaults to search.default_k)
        #[arg(short)]
        k: Option<NonZeroUsize>,
        /// Show SQL queries untruncated
        #[arg(long)]
        full: bool,
    },
    /// List stored entries without a query
    Browse {
        /// Number of results (defaults to search.browse_k)
        #[arg(short)]
        k: Option<NonZeroUsize>,
        /// Show SQL queries untruncated
        #[arg(long)]
        full: bool,
    },
    /// Add a question/SQL pair
    Add {
        #[arg(short, long)]
        question: String,
        #[arg(short, long)]
        sql: String,
    },
    /// Delete an entry by index id
    Delete { index_id: String },
}

fn init_logging(verbose: bool) -> Result<MultiProgress> {
    let default_filter = if verbose { "sqldash=debug" } else { "warn" };
    let logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
            .build();
    let level = logger.filter();

    // Route log lines through the progress bars so spinners don't garble them
    let progress = MultiProgress::new();
    LogWrapper::new(progress.clone(), logger)
        .try_init()
        .context("Failed to initialize logging")?;
    log::set_max_level(level);

    Ok(progress)
}

fn stdout() -> StandardStream {
    let choice = if std::io::stdout().is_terminal() {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

fn print_results(ctx: &AppContext, json: bool, full: bool) -> Result<()> {
    let results = ctx.controller.results();

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    let expanded = HashSet::new();
    let opts = RenderOptions {
        truncate_at: ctx.config_manager.truncate_at(),
        full,
        expanded: &expanded,
    };
    render_records(&mut stdout(), &results, &opts)?;
    Ok(())
}

async fn search(ctx: &AppContext, question: &str, k: Option<NonZeroUsize>) -> Result<()> {
    let spinner = ctx.spinner();
    let outcome = match k {
        Some(k) => ctx.controller.search(question, k.get()).await,
        None => ctx.controller.set_search_query(question).await,
    };
    spinner.finish_and_clear();

    outcome.with_context(|| format!("Search for {:?} failed", question))?;
    Ok(())
}

async fn browse(ctx: &AppContext, k: Option<NonZeroUsize>) -> Result<()> {
    let spinner = ctx.spinner();
    let outcome = match k {
        Some(k) => ctx.controller.search(BROWSE_ALL_QUERY, k.get()).await,
        None => ctx.controller.initialize().await,
    };
    spinner.finish_and_clear();

    outcome.context("Failed to load entries")?;
    Ok(())
}

async fn add(ctx: &AppContext, question: &str, sql: &str) -> Result<()> {
    ctx.controller.open_dialog();
    ctx.controller.set_draft_question(question);
    ctx.controller.set_draft_sql(sql);

    let spinner = ctx.spinner();
    let outcome = ctx.controller.submit_draft().await;
    spinner.finish_and_clear();

    outcome.context("Failed to add entry")?;
    print_status(&mut stdout(), Color::Green, "Entry added")?;
    Ok(())
}

async fn delete(ctx: &AppContext, index_id: &str) -> Result<()> {
    let spinner = ctx.spinner();
    let outcome = ctx.controller.delete_entry(index_id).await;
    spinner.finish_and_clear();

    outcome.with_context(|| format!("Failed to delete {}", index_id))?;
    print_status(&mut stdout(), Color::Green, &format!("Deleted {}", index_id))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let progress = init_logging(cli.verbose)?;

    let workspace = env::current_dir().context("Failed to get current directory")?;
    let ctx = AppContext::new(&workspace, cli.api_url, progress)?;

    match cli.command.unwrap_or(Commands::Dashboard) {
        Commands::Dashboard => {
            let dashboard = Dashboard::new(
                Arc::clone(&ctx.controller),
                stdout(),
                ctx.config_manager.truncate_at(),
            );
            dashboard.run(BufReader::new(tokio::io::stdin())).await?;
        }
        Commands::Search { question, k, full } => {
            search(&ctx, &question, k).await?;
            print_results(&ctx, cli.json, full)?;
        }
        Commands::Browse { k, full } => {
            browse(&ctx, k).await?;
            print_results(&ctx, cli.json, full)?;
        }
        Commands::Add { question, sql } => add(&ctx, &question, &sql).await?,
        Commands::Delete { index_id } => delete(&ctx, &index_id).await?,
    }

    Ok(())
}
