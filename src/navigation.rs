//! Navigation State (C9).
//!
//! A stack of `(filters, group-by, sort)` frames supporting drill-down,
//! back-out, grouping change, and value-set filters (§3.5, §4.9).
//! Frames are owned, cloned values — no shared-arena indirection — the
//! history depths this crate deals with (default cap 100) make that the
//! simplest correct choice per `spec.md` §9's note that a pointer into a
//! shared arena is "acceptable", not required.

use std::collections::VecDeque;

use crate::query::expr::quote_literal;
use crate::schema::canonicalize;

/// One filter value: either a literal or SQL `NULL` (§8.1 "WHERE
/// correctness for NULL").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterValue {
    Value(String),
    Null,
}

impl FilterValue {
    fn render_literal(&self) -> String {
        match self {
            FilterValue::Value(v) => quote_literal(v),
            FilterValue::Null => "NULL".to_string(),
        }
    }

    fn display(&self) -> String {
        match self {
            FilterValue::Value(v) => v.clone(),
            FilterValue::Null => "NULL".to_string(),
        }
    }
}

/// One column's filter: includes and excludes are mutually exclusive
/// (§3.5 invariant) — at most one of the two is non-empty at a time.
#[derive(Debug, Clone, PartialEq)]
struct FilterEntry {
    column: String,
    includes: Vec<FilterValue>,
    excludes: Vec<FilterValue>,
    label: String,
}

impl FilterEntry {
    fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    fn render_where(&self) -> String {
        if !self.includes.is_empty() {
            render_side(&self.column, &self.includes, true)
        } else {
            render_side(&self.column, &self.excludes, false)
        }
    }

    fn render_breadcrumb(&self) -> String {
        if !self.includes.is_empty() {
            format!("{} in {}", self.label, render_value_list(&self.includes))
        } else {
            format!("{} not in {}", self.label, render_value_list(&self.excludes))
        }
    }
}

fn render_side(column: &str, values: &[FilterValue], include: bool) -> String {
    if values == [FilterValue::Null] {
        return format!("{column} {}", if include { "IS NULL" } else { "IS NOT NULL" });
    }
    if values.len() == 1 {
        let op = if include { "=" } else { "!=" };
        return format!("{column} {op} {}", values[0].render_literal());
    }
    let list = values.iter().map(|v| v.render_literal()).collect::<Vec<_>>().join(", ");
    let op = if include { "IN" } else { "NOT IN" };
    format!("{column} {op} ({list})")
}

fn render_value_list(values: &[FilterValue]) -> String {
    let shown: Vec<String> = values.iter().take(3).map(|v| v.display()).collect();
    if values.len() > 3 {
        format!("[{}, ... +{} more]", shown.join(", "), values.len() - 3)
    } else {
        format!("[{}]", shown.join(", "))
    }
}

/// `(prefix, metric)` columns like `sc.p95_us` get a human label (e.g.
/// `"SC P95 (us)"`, §4.9); plain columns (`username`, `state`, ...) keep
/// their own canonical name as their breadcrumb label.
pub fn human_label(col: &str) -> String {
    match col.split_once('.') {
        Some((prefix, rest)) => {
            let body = rest.strip_suffix("_us").unwrap_or(rest);
            let body_label = body
                .chars()
                .next()
                .map(|c| c.to_ascii_uppercase().to_string() + &body[c.len_utf8()..])
                .unwrap_or_default();
            format!("{} {body_label} (us)", prefix.to_uppercase())
        }
        None => col.to_string(),
    }
}

/// One navigation frame (§3.5).
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationFrame {
    filters: Vec<FilterEntry>,
    pub group_cols: Vec<String>,
    pub sort_col: Option<String>,
    pub sort_desc: bool,
    pub description: String,
}

impl NavigationFrame {
    pub fn new(group_cols: Vec<String>) -> Self {
        NavigationFrame {
            filters: Vec::new(),
            group_cols: group_cols.into_iter().map(|c| canonicalize(&c)).collect(),
            sort_col: None,
            sort_desc: true,
            description: "root".to_string(),
        }
    }

    fn entry_mut(&mut self, col: &str) -> &mut FilterEntry {
        let col = canonicalize(col);
        if let Some(i) = self.filters.iter().position(|e| e.column == col) {
            &mut self.filters[i]
        } else {
            self.filters.push(FilterEntry {
                column: col.clone(),
                includes: Vec::new(),
                excludes: Vec::new(),
                label: human_label(&col),
            });
            self.filters.last_mut().unwrap()
        }
    }

    fn prune_empty(&mut self) {
        self.filters.retain(|e| !e.is_empty());
    }

    /// Render the combined WHERE predicate in insertion order, `"1=1"`
    /// when there are no filters (§4.9).
    pub fn render_where(&self) -> String {
        if self.filters.is_empty() {
            return "1=1".to_string();
        }
        self.filters.iter().map(|e| e.render_where()).collect::<Vec<_>>().join(" AND ")
    }

    /// Render breadcrumbs in insertion order (§4.9).
    pub fn render_breadcrumbs(&self) -> Vec<String> {
        self.filters.iter().map(|e| e.render_breadcrumb()).collect()
    }
}

/// Owns the frame history plus a separate grouping-change history
/// (§2's supplemented-feature note, §4.9): these are two independent
/// stacks, matching the original's `filter_history` vs
/// `grouping_history` split rather than one merged undo stack.
pub struct NavigationState {
    current: NavigationFrame,
    history: VecDeque<NavigationFrame>,
    grouping_history: VecDeque<Vec<String>>,
    max_history: usize,
}

impl NavigationState {
    pub fn new(max_history: usize) -> Self {
        NavigationState {
            current: NavigationFrame::new(Vec::new()),
            history: VecDeque::new(),
            grouping_history: VecDeque::new(),
            max_history,
        }
    }

    pub fn current(&self) -> &NavigationFrame {
        &self.current
    }

    /// `reset(group_cols)` (§4.9): clear all history, install a fresh
    /// initial frame.
    pub fn reset(&mut self, group_cols: Vec<String>) {
        self.history.clear();
        self.grouping_history.clear();
        self.current = NavigationFrame::new(group_cols);
    }

    fn push_history(&mut self, frame: NavigationFrame) {
        self.history.push_back(frame);
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    /// `drill_down(col, value, exclude)` (§4.9): push the current frame,
    /// then add `value` to the include (or exclude) set for `col`,
    /// removing the opposite entry for that column.
    pub fn drill_down(&mut self, col: &str, value: impl Into<String>, exclude: bool) {
        let previous = self.current.clone();
        let value = FilterValue::Value(value.into());
        let entry = self.current.entry_mut(col);
        if exclude {
            entry.includes.retain(|v| v != &value);
            if !entry.excludes.contains(&value) {
                entry.excludes.push(value.clone());
            }
        } else {
            entry.excludes.retain(|v| v != &value);
            if !entry.includes.contains(&value) {
                entry.includes.push(value.clone());
            }
        }
        self.current.description = format!(
            "{} {}={}",
            if exclude { "Excluded" } else { "Included" },
            canonicalize(col),
            value.display(),
        );
        self.push_history(previous);
    }

    /// `apply_value_filters(col, includes, excludes)` (§4.9): replace the
    /// filter for `col` wholesale; remove it entirely if both sides are
    /// empty.
    pub fn apply_value_filters(
        &mut self,
        col: &str,
        includes: Vec<FilterValue>,
        excludes: Vec<FilterValue>,
    ) {
        let previous = self.current.clone();
        let col_lower = canonicalize(col);
        self.current.filters.retain(|e| e.column != col_lower);
        if !includes.is_empty() || !excludes.is_empty() {
            let (includes, excludes) = if !includes.is_empty() {
                (includes, Vec::new())
            } else {
                (Vec::new(), excludes)
            };
            self.current.filters.push(FilterEntry {
                column: col_lower.clone(),
                label: human_label(&col_lower),
                includes,
                excludes,
            });
        }
        self.current.description = format!("Filtered {col_lower}");
        self.push_history(previous);
    }

    /// `back_out()` (§4.9): pop one frame from history; `none` at root.
    pub fn back_out(&mut self) -> Option<&NavigationFrame> {
        let previous = self.history.pop_back()?;
        self.current = previous;
        Some(&self.current)
    }

    /// `remove_last_filter()` (§4.9): drop the most recently added
    /// predicate from the current frame without touching history.
    pub fn remove_last_filter(&mut self) -> bool {
        if self.current.filters.is_empty() {
            return false;
        }
        self.current.filters.pop();
        true
    }

    /// `update_grouping(new_cols)` (§4.9): push a grouping-history entry,
    /// replace `group_cols`.
    pub fn update_grouping(&mut self, new_cols: Vec<String>) {
        self.grouping_history.push_back(self.current.group_cols.clone());
        while self.grouping_history.len() > self.max_history {
            self.grouping_history.pop_front();
        }
        self.current.group_cols = new_cols.into_iter().map(|c| canonicalize(&c)).collect();
    }

    /// `undo_last_grouping()` (§4.9): restore previously saved grouping
    /// without rewinding filter history.
    pub fn undo_last_grouping(&mut self) -> bool {
        match self.grouping_history.pop_back() {
            Some(cols) => {
                self.current.group_cols = cols;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_then_exclude_then_back_out_three_times() {
        let mut nav = NavigationState::new(100);
        nav.drill_down("state", "RUN", false);
        assert_eq!(nav.current().render_where(), "state = 'RUN'");
        nav.drill_down("state", "RUN", true);
        assert_eq!(nav.current().render_where(), "state != 'RUN'");

        assert!(nav.back_out().is_some());
        assert_eq!(nav.current().render_where(), "state = 'RUN'");
        assert!(nav.back_out().is_some());
        assert_eq!(nav.current().render_where(), "1=1");
        assert!(nav.back_out().is_none());
        assert_eq!(nav.current().render_where(), "1=1");
    }

    #[test]
    fn value_set_filter_renders_in_list_and_breadcrumb() {
        let mut nav = NavigationState::new(100);
        nav.apply_value_filters(
            "username",
            vec![FilterValue::Value("postgres".into()), FilterValue::Value("root".into())],
            vec![],
        );
        assert_eq!(nav.current().render_where(), "username IN ('postgres', 'root')");
        assert_eq!(nav.current().render_breadcrumbs(), vec!["username in [postgres, root]"]);

        nav.apply_value_filters("username", vec![], vec![FilterValue::Value("postgres".into())]);
        assert_eq!(nav.current().render_where(), "username != 'postgres'");
    }

    #[test]
    fn null_filters_render_is_null_and_is_not_null() {
        let mut nav = NavigationState::new(100);
        nav.apply_value_filters("comm", vec![FilterValue::Null], vec![]);
        assert_eq!(nav.current().render_where(), "comm IS NULL");

        nav.apply_value_filters("comm", vec![], vec![FilterValue::Null]);
        assert_eq!(nav.current().render_where(), "comm IS NOT NULL");
    }

    #[test]
    fn mutual_exclusion_between_include_and_exclude() {
        let mut nav = NavigationState::new(100);
        nav.drill_down("state", "RUN", false);
        nav.drill_down("state", "RUN", true);
        // Exactly one predicate for `state`, not a contradictory pair.
        assert_eq!(nav.current().render_breadcrumbs().len(), 1);
    }

    #[test]
    fn breadcrumb_collapses_lists_over_three_values() {
        let mut nav = NavigationState::new(100);
        nav.apply_value_filters(
            "username",
            vec!["a", "b", "c", "d"].into_iter().map(|s| FilterValue::Value(s.into())).collect(),
            vec![],
        );
        assert_eq!(nav.current().render_breadcrumbs(), vec!["username in [a, b, c, ... +1 more]"]);
    }

    #[test]
    fn remove_last_filter_does_not_touch_history() {
        let mut nav = NavigationState::new(100);
        nav.drill_down("state", "RUN", false);
        assert_eq!(nav.current().render_where(), "state = 'RUN'");
        assert!(nav.remove_last_filter());
        assert_eq!(nav.current().render_where(), "1=1");
        // history still has the pre-drill-down frame; back_out is a no-op content-wise
        assert!(nav.back_out().is_some());
        assert_eq!(nav.current().render_where(), "1=1");
    }

    #[test]
    fn update_grouping_and_undo() {
        let mut nav = NavigationState::new(100);
        nav.reset(vec!["state".to_string()]);
        nav.update_grouping(vec!["state".to_string(), "syscall".to_string()]);
        assert_eq!(nav.current().group_cols, vec!["state", "syscall"]);
        assert!(nav.undo_last_grouping());
        assert_eq!(nav.current().group_cols, vec!["state"]);
        assert!(!nav.undo_last_grouping());
    }

    #[test]
    fn max_history_evicts_oldest_frame_fifo() {
        let mut nav = NavigationState::new(2);
        nav.drill_down("a", "1", false);
        nav.drill_down("b", "2", false);
        nav.drill_down("c", "3", false);
        // only 2 history frames retained; back out twice lands on the
        // frame right before "c" was added, not the true root.
        assert!(nav.back_out().is_some());
        assert!(nav.back_out().is_some());
        assert!(nav.back_out().is_none());
    }

    #[test]
    fn human_label_formats_latency_columns_but_leaves_plain_columns_alone() {
        assert_eq!(human_label("sc.p95_us"), "SC P95 (us)");
        assert_eq!(human_label("io.avg_us"), "IO Avg (us)");
        assert_eq!(human_label("kstack_hash"), "kstack_hash");
    }
}
