use anyhow::Result;
use log::debug;
use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use termcolor::{Color, WriteColor};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::task::JoinSet;

use crate::client::Backend;
use crate::controller::{SearchOutcome, SearchSyncController};
use crate::display::{print_status, render_view, RenderOptions};

/// One line of dashboard input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    Clear,
    Browse,
    Add,
    Retry,
    Cancel,
    Delete(String),
    Toggle(String),
    Help,
    Quit,
    Unknown(String),
}

const HELP: &str = "\
Type a question to search. Commands:
  :clear             clear the search box
  :browse            reload the browse-all listing
  :add               add a question/SQL pair (SQL ends at a blank line)
  :retry / :cancel   resubmit or discard a failed :add
  :del <index_id>    delete an entry
  :toggle <index_id> expand or collapse a long SQL query
  :help              show this help
  :quit              exit";

pub fn parse_command(line: &str) -> Command {
    let Some(rest) = line.strip_prefix(':') else {
        return Command::Search(line.to_string());
    };

    let mut parts = rest.trim().splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let arg = parts.next().map(str::trim).unwrap_or("");

    match (name, arg.is_empty()) {
        ("clear", _) => Command::Clear,
        ("browse", _) => Command::Browse,
        ("add", _) => Command::Add,
        ("retry", _) => Command::Retry,
        ("cancel", _) => Command::Cancel,
        ("del" | "delete", false) => Command::Delete(arg.to_string()),
        ("toggle", false) => Command::Toggle(arg.to_string()),
        ("help", _) => Command::Help,
        ("quit" | "q" | "exit", _) => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

/// Interactive session driving a `SearchSyncController` from line input.
///
/// Searches run as background tasks so typing is never blocked; each one
/// redraws the view when its response is committed.
pub struct Dashboard<B, W> {
    controller: Arc<SearchSyncController<B>>,
    expanded: Arc<Mutex<HashSet<String>>>,
    out: Arc<Mutex<W>>,
    truncate_at: usize,
}

impl<B, W> Clone for Dashboard<B, W> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            expanded: Arc::clone(&self.expanded),
            out: Arc::clone(&self.out),
            truncate_at: self.truncate_at,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<B, W> Dashboard<B, W>
where
    B: Backend + 'static,
    W: WriteColor + Send + 'static,
{
    pub fn new(controller: Arc<SearchSyncController<B>>, out: W, truncate_at: usize) -> Self {
        Self {
            controller,
            expanded: Arc::new(Mutex::new(HashSet::new())),
            out: Arc::new(Mutex::new(out)),
            truncate_at,
        }
    }

    fn redraw(&self) -> io::Result<()> {
        let view = self.controller.snapshot();
        let expanded = lock(&self.expanded);
        let opts = RenderOptions {
            truncate_at: self.truncate_at,
            full: false,
            expanded: &expanded,
        };
        render_view(&mut *lock(&self.out), &view, &opts)
    }

    fn status(&self, color: Color, message: &str) -> io::Result<()> {
        print_status(&mut *lock(&self.out), color, message)
    }

    fn prompt(&self, label: &str) -> io::Result<()> {
        let mut out = lock(&self.out);
        writeln!(out, "{}", label)?;
        out.flush()
    }

    /// Redraw when a search produced something worth showing
    fn after_search(&self, outcome: Result<SearchOutcome, crate::error::ApiError>) -> io::Result<()> {
        match outcome {
            Ok(SearchOutcome::Superseded) => Ok(()),
            Ok(_) => self.redraw(),
            Err(e) => {
                self.redraw()?;
                self.status(Color::Red, &format!("Search failed: {}", e))
            }
        }
    }

    fn spawn_search(&self, tasks: &mut JoinSet<()>, text: String) {
        let dashboard = self.clone();
        tasks.spawn(async move {
            let outcome = dashboard.controller.set_search_query(&text).await;
            if let Err(e) = dashboard.after_search(outcome) {
                debug!("Failed to draw search results: {}", e);
            }
        });
    }

    async fn submit(&self) -> io::Result<()> {
        match self.controller.submit_draft().await {
            Ok(()) => {
                self.status(Color::Green, "Entry added")?;
                if !self.controller.snapshot().search_query.is_empty() {
                    self.redraw()?;
                }
                Ok(())
            }
            Err(e) => self.status(
                Color::Red,
                &format!("Upload failed: {}. Use :retry or :cancel", e),
            ),
        }
    }

    /// Collect the create-dialog fields from input, then submit
    async fn add_entry<R>(&self, lines: &mut Lines<R>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        self.controller.open_dialog();

        self.prompt("Question:")?;
        let question = lines.next_line().await?.unwrap_or_default();
        self.controller.set_draft_question(question.trim());

        self.prompt("SQL Query (end with a blank line):")?;
        let mut sql = Vec::new();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                break;
            }
            sql.push(line);
        }
        self.controller.set_draft_sql(&sql.join("\n"));

        self.submit().await?;
        Ok(())
    }

    fn toggle(&self, index_id: String) -> io::Result<()> {
        {
            let mut expanded = lock(&self.expanded);
            if !expanded.remove(&index_id) {
                expanded.insert(index_id);
            }
        }
        self.redraw()
    }

    /// Run until `:quit` or end of input, then wait for searches still in flight
    pub async fn run<R>(&self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        self.prompt(HELP)?;

        self.redraw_loading()?;
        let outcome = self.controller.initialize().await;
        self.after_search(outcome)?;

        let mut lines = input.lines();
        let mut tasks = JoinSet::new();

        while let Some(line) = lines.next_line().await? {
            while tasks.try_join_next().is_some() {}

            match parse_command(&line) {
                Command::Search(text) => self.spawn_search(&mut tasks, text),
                Command::Clear => self.spawn_search(&mut tasks, String::new()),
                Command::Browse => {
                    self.redraw_loading()?;
                    let outcome = self.controller.initialize().await;
                    self.after_search(outcome)?;
                }
                Command::Add => self.add_entry(&mut lines).await?,
                Command::Retry => {
                    if self.controller.snapshot().dialog_open {
                        self.submit().await?;
                    } else {
                        self.status(Color::Yellow, "Nothing to retry")?;
                    }
                }
                Command::Cancel => {
                    self.controller.cancel_dialog();
                    self.status(Color::Yellow, "Draft discarded")?;
                }
                Command::Delete(index_id) => match self.controller.delete_entry(&index_id).await {
                    Ok(()) => {
                        self.status(Color::Green, &format!("Deleted {}", index_id))?;
                        self.redraw()?;
                    }
                    Err(e) => self.status(Color::Red, &format!("Delete failed: {}", e))?,
                },
                Command::Toggle(index_id) => self.toggle(index_id)?,
                Command::Help => self.prompt(HELP)?,
                Command::Quit => break,
                Command::Unknown(raw) => {
                    self.status(Color::Yellow, &format!("Unknown command {:?}, try :help", raw))?
                }
            }
        }

        while tasks.join_next().await.is_some() {}
        Ok(())
    }

    fn redraw_loading(&self) -> io::Result<()> {
        let mut out = lock(&self.out);
        writeln!(out, "Loading...")?;
        out.flush()
    }
}
