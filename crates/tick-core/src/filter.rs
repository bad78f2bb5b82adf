use std::fmt;

use crate::task::Task;

/// Which subset of the collection the list view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum FilterSelection {
    #[default]
    All,
    Active,
    Completed,
}

impl FilterSelection {
    pub const CHOICES: [FilterSelection; 3] = [
        FilterSelection::All,
        FilterSelection::Active,
        FilterSelection::Completed,
    ];

    pub fn as_token(self) -> &'static str {
        match self {
            FilterSelection::All => "all",
            FilterSelection::Active => "active",
            FilterSelection::Completed => "completed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterSelection::All => "All",
            FilterSelection::Active => "Active",
            FilterSelection::Completed => "Completed",
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        matches(task, self)
    }
}

impl fmt::Display for FilterSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Normalizes a raw token. Absent or unrecognised tokens select `All`.
pub fn select_filter(token: Option<&str>) -> FilterSelection {
    match token {
        Some("active") => FilterSelection::Active,
        Some("completed") => FilterSelection::Completed,
        _ => FilterSelection::All,
    }
}

pub fn matches(task: &Task, selection: FilterSelection) -> bool {
    match selection {
        FilterSelection::All => true,
        FilterSelection::Active => !task.is_completed,
        FilterSelection::Completed => task.is_completed,
    }
}

/// Tasks passing `selection`, in collection order.
pub fn apply(tasks: &[Task], selection: FilterSelection) -> impl Iterator<Item = &Task> {
    tasks.iter().filter(move |task| selection.matches(task))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks() -> Vec<Task> {
        let mut done = Task::new(2, "done", "");
        done.is_completed = true;
        vec![Task::new(1, "open", ""), done, Task::new(3, "also open", "")]
    }

    fn ids(tasks: &[Task], selection: FilterSelection) -> Vec<i64> {
        apply(tasks, selection).map(|t| t.id).collect()
    }

    #[test]
    fn predicates_split_by_completion() {
        let tasks = tasks();
        assert_eq!(ids(&tasks, FilterSelection::All), vec![1, 2, 3]);
        assert_eq!(ids(&tasks, FilterSelection::Active), vec![1, 3]);
        assert_eq!(ids(&tasks, FilterSelection::Completed), vec![2]);
    }

    #[test]
    fn unknown_or_missing_tokens_select_all() {
        assert_eq!(select_filter(None), FilterSelection::All);
        assert_eq!(select_filter(Some("")), FilterSelection::All);
        assert_eq!(select_filter(Some("Active")), FilterSelection::All);
        assert_eq!(select_filter(Some("done")), FilterSelection::All);
        assert_eq!(select_filter(Some("active")), FilterSelection::Active);
        assert_eq!(select_filter(Some("completed")), FilterSelection::Completed);
    }

    #[test]
    fn selection_is_idempotent() {
        for raw in [None, Some("all"), Some("active"), Some("completed"), Some("bogus")] {
            let once = select_filter(raw);
            let twice = select_filter(Some(once.as_token()));
            assert_eq!(once, twice, "token {raw:?}");
        }
    }
}
