// View filter over the task collection

use crate::task::Task;
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which tasks the view shows; never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    All,
    Active,    // completed == false
    Completed, // completed == true
}

impl Filter {
    pub const ALL: [Filter; 3] = [Filter::All, Filter::Active, Filter::Completed];

    /// Whether a task is shown under this filter
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.completed,
            Filter::Completed => task.completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Active => "active",
            Filter::Completed => "completed",
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Filter {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Filter::All),
            "active" => Ok(Filter::Active),
            "completed" => Ok(Filter::Completed),
            other => Err(eyre!(
                "Invalid filter: {} (expected all, active or completed)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(completed: bool) -> Task {
        Task {
            completed,
            ..Task::new("sample").unwrap()
        }
    }

    #[test]
    fn test_default_is_all() {
        assert_eq!(Filter::default(), Filter::All);
    }

    #[test]
    fn test_matches() {
        let open = task(false);
        let done = task(true);

        assert!(Filter::All.matches(&open));
        assert!(Filter::All.matches(&done));
        assert!(Filter::Active.matches(&open));
        assert!(!Filter::Active.matches(&done));
        assert!(!Filter::Completed.matches(&open));
        assert!(Filter::Completed.matches(&done));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("all".parse::<Filter>().unwrap(), Filter::All);
        assert_eq!("Active".parse::<Filter>().unwrap(), Filter::Active);
        assert_eq!(" completed ".parse::<Filter>().unwrap(), Filter::Completed);
        assert!("done".parse::<Filter>().is_err());
        assert!("".parse::<Filter>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for filter in Filter::ALL {
            assert_eq!(filter.to_string().parse::<Filter>().unwrap(), filter);
        }
    }

    #[test]
    fn test_serialization() {
        assert_eq!(serde_json::to_string(&Filter::Active).unwrap(), "\"active\"");
    }
}
