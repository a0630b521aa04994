use std::collections::HashSet;
use std::io;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::controller::ViewState;
use crate::protocol::QuestionRecord;
use crate::truncate::truncate_query;

pub struct RenderOptions<'a> {
    pub truncate_at: usize,
    /// Show every SQL query in full regardless of per-row toggles
    pub full: bool,
    /// Rows whose SQL the user expanded, by `index_id`
    pub expanded: &'a HashSet<String>,
}

const INDENT: &str = "    ";

fn write_colored(out: &mut dyn WriteColor, color: Color, bold: bool, text: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold))?;
    write!(out, "{}", text)?;
    out.reset()
}

/// One-line status message, e.g. "Deleted 42"
pub fn print_status(out: &mut dyn WriteColor, color: Color, message: &str) -> io::Result<()> {
    write_colored(out, color, true, message)?;
    writeln!(out)?;
    out.flush()
}

/// Render the whole view: title, loading indicator or the result rows, and the count footer
pub fn render_view(out: &mut dyn WriteColor, view: &ViewState, opts: &RenderOptions) -> io::Result<()> {
    write_colored(out, Color::Cyan, true, "Similar Questions")?;
    if !view.search_query.is_empty() {
        write!(out, "  for {:?}", view.search_query)?;
    }
    writeln!(out)?;

    if view.loading {
        writeln!(out, "Loading...")?;
        return out.flush();
    }

    render_records(out, &view.results, opts)
}

/// Render result rows followed by the "Showing N results" footer
pub fn render_records(
    out: &mut dyn WriteColor,
    records: &[QuestionRecord],
    opts: &RenderOptions,
) -> io::Result<()> {
    for (rank, record) in records.iter().enumerate() {
        render_record(out, rank + 1, record, opts)?;
    }

    out.set_color(ColorSpec::new().set_dimmed(true))?;
    write!(out, "Showing ")?;
    out.set_color(ColorSpec::new().set_bold(true))?;
    write!(out, "{}", records.len())?;
    out.set_color(ColorSpec::new().set_dimmed(true))?;
    writeln!(out, " results")?;
    out.reset()?;
    out.flush()
}

fn render_record(
    out: &mut dyn WriteColor,
    rank: usize,
    record: &QuestionRecord,
    opts: &RenderOptions,
) -> io::Result<()> {
    write!(out, "{:>2}. ", rank)?;
    write_colored(out, Color::White, true, &record.question)?;
    writeln!(out)?;

    out.set_color(ColorSpec::new().set_dimmed(true))?;
    writeln!(
        out,
        "{}id {}  added {}",
        INDENT, record.index_id, record.date_added
    )?;
    out.reset()?;

    let expanded = opts.full || opts.expanded.contains(&record.index_id);
    let sql = truncate_query(&record.sql_query, expanded, opts.truncate_at);
    for line in sql.text.lines() {
        writeln!(out, "{}{}", INDENT, line)?;
    }

    // --full has nothing to collapse back to
    if let Some(toggle) = sql.toggle.filter(|_| !opts.full) {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Blue)).set_underline(true))?;
        write!(out, "{}{}", INDENT, toggle.label())?;
        out.reset()?;
        writeln!(out, " (:toggle {})", record.index_id)?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::Buffer;

    fn record(id: &str, question: &str, sql: &str) -> QuestionRecord {
        QuestionRecord {
            index_id: id.to_string(),
            question: question.to_string(),
            sql_query: sql.to_string(),
            date_added: "2024-01-01".to_string(),
        }
    }

    fn rendered(view: &ViewState, full: bool, expanded: &HashSet<String>) -> String {
        let mut buf = Buffer::no_color();
        let opts = RenderOptions {
            truncate_at: 100,
            full,
            expanded,
        };
        render_view(&mut buf, view, &opts).unwrap();
        String::from_utf8(buf.into_inner()).unwrap()
    }

    #[test]
    fn test_loading_hides_rows() {
        let view = ViewState {
            loading: true,
            results: vec![record("1", "stale question", "SELECT 1")],
            ..ViewState::default()
        };
        let text = rendered(&view, false, &HashSet::new());
        assert!(text.contains("Loading..."));
        assert!(!text.contains("stale question"));
    }

    #[test]
    fn test_rows_and_footer() {
        let view = ViewState {
            search_query: "total sales".to_string(),
            results: vec![
                record("42", "total sales by region", "SELECT region, SUM(amount)\nFROM sales"),
                record("7", "total sales last year", "SELECT 1"),
            ],
            ..ViewState::default()
        };
        let text = rendered(&view, false, &HashSet::new());

        assert!(text.contains("for \"total sales\""));
        assert!(text.contains(" 1. total sales by region"));
        assert!(text.contains("id 42  added 2024-01-01"));
        assert!(text.contains("    FROM sales"));
        assert!(text.contains(" 2. total sales last year"));
        assert!(text.ends_with("Showing 2 results\n"));
        assert!(!text.contains("Show more"));
    }

    #[test]
    fn test_long_sql_toggle_follows_expanded_set() {
        let long_sql = format!("SELECT {} FROM t", "col, ".repeat(40));
        let view = ViewState {
            results: vec![record("9", "wide select", &long_sql)],
            ..ViewState::default()
        };

        let collapsed = rendered(&view, false, &HashSet::new());
        assert!(collapsed.contains("...\n"));
        assert!(collapsed.contains("Show more (:toggle 9)"));

        let expanded: HashSet<String> = ["9".to_string()].into_iter().collect();
        let open = rendered(&view, false, &expanded);
        assert!(open.contains(&long_sql));
        assert!(open.contains("Show less (:toggle 9)"));

        let full = rendered(&view, true, &HashSet::new());
        assert!(full.contains(&long_sql));
        assert!(!full.contains(":toggle"));
    }
}
