use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::address::{Address, Route};
use crate::config::Config;
use crate::filter::{self, FilterSelection};
use crate::stats::TaskStats;
use crate::store::StoreState;
use crate::task::{Priority, Task};

pub const EMPTY_MESSAGE: &str = "No tasks yet.";
pub const LOADING_MESSAGE: &str = "Loading...";

const PROGRESS_CELLS: usize = 20;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Draws whichever view `address` selects from the given state.
    pub fn render_address<W: Write>(
        &self,
        out: &mut W,
        address: &Address,
        state: &StoreState,
    ) -> anyhow::Result<()> {
        match address.route() {
            Route::List => self.render_list(out, address.filter(), state),
            Route::Stats => self.render_stats(out, state),
        }
    }

    #[tracing::instrument(skip(self, out, state), fields(count = state.tasks.len()))]
    pub fn render_list<W: Write>(
        &self,
        out: &mut W,
        selection: FilterSelection,
        state: &StoreState,
    ) -> anyhow::Result<()> {
        if state.loading {
            return self.render_loading(out);
        }

        writeln!(out, "{}", self.paint("My TODO List", "1"))?;
        self.write_filter_bar(out, selection)?;

        let rows: Vec<Vec<String>> = filter::apply(&state.tasks, selection)
            .map(|task| self.task_row(task))
            .collect();
        if !rows.is_empty() {
            let headers = ["#", "Done", "Title", "Priority", "Due", "Created"]
                .iter()
                .map(|h| h.to_string())
                .collect();
            write_table(&mut *out, headers, rows)?;
        }

        if state.tasks.is_empty() {
            writeln!(out, "{EMPTY_MESSAGE}")?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, out, state), fields(count = state.tasks.len()))]
    pub fn render_stats<W: Write>(&self, out: &mut W, state: &StoreState) -> anyhow::Result<()> {
        if state.loading {
            return self.render_loading(out);
        }

        let stats = TaskStats::derive(&state.tasks);
        writeln!(out, "{}", self.paint("Statistics", "1"))?;
        writeln!(out, "Total       {} tasks", stats.total)?;
        writeln!(
            out,
            "Completed   {} tasks",
            self.paint(&stats.completed.to_string(), "32")
        )?;
        writeln!(out, "Active      {} tasks", stats.active)?;
        writeln!(
            out,
            "Completion  {} {}%",
            progress_bar(stats.completion_rate),
            self.paint(&stats.completion_rate.to_string(), "34")
        )?;
        Ok(())
    }

    pub fn render_loading<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(LOADING_MESSAGE, "2"))?;
        Ok(())
    }

    pub fn render_alert<W: Write>(&self, out: &mut W, message: &str) -> anyhow::Result<()> {
        writeln!(out, "{} {message}", self.paint("!", "31"))?;
        Ok(())
    }

    fn write_filter_bar<W: Write>(
        &self,
        out: &mut W,
        selection: FilterSelection,
    ) -> anyhow::Result<()> {
        let choices: Vec<String> = FilterSelection::CHOICES
            .iter()
            .map(|choice| {
                if *choice == selection {
                    self.paint(&format!("[{}]", choice.label()), "34")
                } else {
                    format!(" {} ", choice.label())
                }
            })
            .collect();
        writeln!(out, "{}", choices.join(" "))?;
        Ok(())
    }

    fn task_row(&self, task: &Task) -> Vec<String> {
        let done = if task.is_completed { "[x]" } else { "[ ]" };
        let title = if task.is_completed {
            self.paint(&task.title, "9;2")
        } else {
            task.title.clone()
        };
        let priority = match task.priority() {
            Some(Priority::High) => self.paint(Priority::High.as_str(), "31"),
            Some(other) => other.to_string(),
            None => String::new(),
        };

        vec![
            self.paint(&task.id.to_string(), "33"),
            done.to_string(),
            title,
            priority,
            task.due_date_display(),
            task.created_date(),
        ]
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn progress_bar(rate: u32) -> String {
    let rate = usize::try_from(rate.min(100)).unwrap_or(100);
    let filled = rate * PROGRESS_CELLS / 100;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        ".".repeat(PROGRESS_CELLS - filled)
    )
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers
        .iter()
        .map(|header| UnicodeWidthStr::width(header.as_str()))
        .collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(tasks: Vec<Task>) -> StoreState {
        StoreState {
            tasks,
            loading: false,
        }
    }

    fn sample() -> Vec<Task> {
        let mut done = Task::new(2, "テスト完了", "2026-10-02T00:00:00Z");
        done.is_completed = true;
        done.priority = Some("high".to_string());
        vec![Task::new(1, "water plants", "2026-10-01T09:30:00Z"), done]
    }

    fn render(address: &str, state: &StoreState) -> String {
        let mut out = Vec::new();
        let address: Address = address.parse().expect("address");
        Renderer::plain()
            .render_address(&mut out, &address, state)
            .expect("render");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn list_view_applies_filter_from_address() {
        let state = loaded(sample());

        let all = render("/", &state);
        assert!(all.contains("water plants"));
        assert!(all.contains("テスト完了"));
        assert!(all.contains("[All]"));
        assert!(!all.contains(EMPTY_MESSAGE));

        let completed = render("/?filter=completed", &state);
        assert!(completed.contains("テスト完了"));
        assert!(!completed.contains("water plants"));
        assert!(completed.contains("[Completed]"));
        assert!(completed.contains("high"));
        assert!(completed.contains("2026-10-02"));
    }

    #[test]
    fn empty_and_loading_states() {
        let empty = render("/", &loaded(vec![]));
        assert!(empty.contains(EMPTY_MESSAGE));

        let loading = StoreState::default();
        assert_eq!(render("/", &loading).trim(), LOADING_MESSAGE);
        assert_eq!(render("/stats", &loading).trim(), LOADING_MESSAGE);
    }

    #[test]
    fn stats_view_counts_and_bar() {
        let mut tasks = sample();
        tasks.push(Task::new(3, "third", ""));
        let out = render("/stats", &loaded(tasks));
        assert!(out.contains("Total       3 tasks"));
        assert!(out.contains("Completed   1 tasks"));
        assert!(out.contains("Active      2 tasks"));
        assert!(out.contains("[######..............] 33%"));

        let empty = render("/stats", &loaded(vec![]));
        assert!(empty.contains("[....................] 0%"));
    }

    #[test]
    fn table_columns_align_on_display_width() {
        let mut out = Vec::new();
        write_table(
            &mut out,
            vec!["A".into(), "B".into()],
            vec![
                vec!["\x1b[33m1\x1b[0m".into(), "幅".into()],
                vec!["22".into(), "x".into()],
            ],
        )
        .expect("table");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "A  B  ");
        assert_eq!(lines[3], "22 x  ");
    }
}
