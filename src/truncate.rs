/// What the SQL column shows for one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TruncatedQuery {
    pub text: String,
    pub toggle: Option<Toggle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    ShowMore,
    ShowLess,
}

impl Toggle {
    pub fn label(self) -> &'static str {
        match self {
            Toggle::ShowMore => "Show more",
            Toggle::ShowLess => "Show less",
        }
    }
}

/// Shorten `sql_query` to `limit` characters unless the row is expanded.
///
/// Counts `char`s, so multi-byte text is never split mid-character. The
/// toggle is offered only when the text is long enough to truncate.
pub fn truncate_query(sql_query: &str, expanded: bool, limit: usize) -> TruncatedQuery {
    let long = sql_query.chars().count() > limit;

    if !long {
        return TruncatedQuery {
            text: sql_query.to_string(),
            toggle: None,
        };
    }

    if expanded {
        TruncatedQuery {
            text: sql_query.to_string(),
            toggle: Some(Toggle::ShowLess),
        }
    } else {
        let mut text: String = sql_query.chars().take(limit).collect();
        text.push_str("...");
        TruncatedQuery {
            text,
            toggle: Some(Toggle::ShowMore),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_query_shown_in_full_without_toggle() {
        let view = truncate_query("SELECT 1", false, 100);
        assert_eq!(view.text, "SELECT 1");
        assert_eq!(view.toggle, None);

        let exact = "x".repeat(100);
        assert_eq!(truncate_query(&exact, false, 100).toggle, None);
    }

    #[test]
    fn test_long_query_collapsed_and_expanded() {
        let sql = format!("SELECT {} FROM t", "a, ".repeat(60));

        let collapsed = truncate_query(&sql, false, 100);
        assert_eq!(collapsed.text.chars().count(), 103);
        assert!(collapsed.text.ends_with("..."));
        assert_eq!(collapsed.toggle, Some(Toggle::ShowMore));

        let expanded = truncate_query(&sql, true, 100);
        assert_eq!(expanded.text, sql);
        assert_eq!(expanded.toggle.map(Toggle::label), Some("Show less"));
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let sql = "é".repeat(101);
        let view = truncate_query(&sql, false, 100);
        assert_eq!(view.text, format!("{}...", "é".repeat(100)));

        // 60 two-byte chars is 120 bytes but under the limit
        assert_eq!(truncate_query(&"é".repeat(60), false, 100).toggle, None);
    }
}
