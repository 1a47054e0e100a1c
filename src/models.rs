use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// The authenticated caller as the core sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Returns a copy carrying the draft's fields and a fresh `updated_at`.
    pub fn revised(&self, draft: &ProjectDraft, now: DateTime<Utc>) -> Self {
        Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Task counts for a project, computed at read time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectProgress {
    pub total_tasks: u64,
    pub completed_tasks: u64,
}

impl ProjectProgress {
    pub fn new(total_tasks: u64, completed_tasks: u64) -> Self {
        Self {
            total_tasks,
            completed_tasks,
        }
    }

    /// Completed share rounded to the nearest whole percent; 0 for an empty project.
    pub fn percentage(&self) -> u8 {
        if self.total_tasks == 0 {
            return 0;
        }
        let ratio = self.completed_tasks as f64 / self.total_tasks as f64;
        (ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// A project together with its derived metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub progress_percentage: u8,
}

impl ProjectView {
    pub fn new(project: Project, progress: ProjectProgress) -> Self {
        Self {
            project,
            total_tasks: progress.total_tasks,
            completed_tasks: progress.completed_tasks,
            progress_percentage: progress.percentage(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub title: String,
    pub description: Option<String>,
}

impl ProjectDraft {
    pub fn new(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            title: title.into(),
            description,
        }
    }

    /// Trims the title and rejects it when blank. Blank descriptions become `None`.
    pub fn validated(self) -> Result<Self, ServiceError> {
        Ok(Self {
            title: required("title", &self.title)?,
            description: optional(self.description),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>, // calendar date, no time component
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn status(&self) -> CompletionStatus {
        if self.completed {
            CompletionStatus::Completed
        } else {
            CompletionStatus::Pending
        }
    }

    /// Returns a copy with the draft's fields applied. Completion is untouched.
    pub fn revised(&self, draft: &TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            title: draft.title.clone(),
            description: draft.description.clone(),
            due_date: draft.due_date,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Returns a copy in the opposite completion state.
    ///
    /// `Pending -> Completed` stamps `completed_at` unless one is already
    /// present; `Completed -> Pending` clears it.
    pub fn toggled(&self, now: DateTime<Utc>) -> Self {
        let (completed, completed_at) = match self.status() {
            CompletionStatus::Pending => (true, Some(self.completed_at.unwrap_or(now))),
            CompletionStatus::Completed => (false, None),
        };
        Self {
            completed,
            completed_at,
            updated_at: now,
            ..self.clone()
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < today)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            due_date: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn due_on(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn validated(self) -> Result<Self, ServiceError> {
        Ok(Self {
            title: required("title", &self.title)?,
            description: optional(self.description),
            due_date: self.due_date,
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pending_task() -> Task {
        let created = DateTime::parse_from_rfc3339("2024-05-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Task {
            id: 1,
            project_id: 7,
            title: "Write spec".to_string(),
            description: None,
            due_date: None,
            completed: false,
            created_at: created,
            updated_at: created,
            completed_at: None,
        }
    }

    #[rstest]
    #[case(0, 0, 0)]
    #[case(4, 3, 75)]
    #[case(3, 1, 33)]
    #[case(3, 2, 67)]
    #[case(8, 1, 13)]
    #[case(5, 5, 100)]
    fn progress_percentage(#[case] total: u64, #[case] completed: u64, #[case] expected: u8) {
        assert_eq!(ProjectProgress::new(total, completed).percentage(), expected);
    }

    #[test]
    fn toggle_stamps_and_clears_completed_at() {
        let task = pending_task();
        let now = Utc::now();

        let done = task.toggled(now);
        assert!(done.completed);
        assert_eq!(done.completed_at, Some(now));
        assert_eq!(done.updated_at, now);
        assert_eq!(done.created_at, task.created_at);

        let undone = done.toggled(now);
        assert!(!undone.completed);
        assert_eq!(undone.completed_at, None);
    }

    #[test]
    fn revise_keeps_completion_state() {
        let now = Utc::now();
        let done = pending_task().toggled(now);
        let later = now + chrono::Duration::seconds(30);

        let draft = TaskDraft::new("Write better spec").with_description("v2");
        let revised = done.revised(&draft, later);

        assert_eq!(revised.title, "Write better spec");
        assert!(revised.completed);
        assert_eq!(revised.completed_at, Some(now));
        assert_eq!(revised.updated_at, later);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("\t\n")]
    fn blank_titles_are_rejected(#[case] title: &str) {
        let err = TaskDraft::new(title).validated().unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = ProjectDraft::new(title, None).validated().unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn validation_trims_and_drops_blank_description() {
        let draft = ProjectDraft::new("  Launch ", Some("  ".to_string()))
            .validated()
            .unwrap();
        assert_eq!(draft.title, "Launch");
        assert_eq!(draft.description, None);
    }

    #[test]
    fn overdue_only_when_pending_and_past_due() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let mut task = pending_task();
        assert!(!task.is_overdue(today));

        task.due_date = NaiveDate::from_ymd_opt(2024, 6, 9);
        assert!(task.is_overdue(today));

        task.due_date = Some(today);
        assert!(!task.is_overdue(today));

        task.due_date = NaiveDate::from_ymd_opt(2024, 6, 1);
        let done = task.toggled(Utc::now());
        assert!(!done.is_overdue(today));
    }
}
