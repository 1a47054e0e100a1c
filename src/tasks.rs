use chrono::Utc;
use rusqlite::params;

use crate::access::{resolve_project, resolve_task};
use crate::database::{Database, TASK_COLUMNS, count_to_u64, row_to_task};
use crate::error::ServiceError;
use crate::models::{Identity, Task, TaskDraft};
use crate::query::{Page, PageRequest, SearchTerm};

const NEWEST_FIRST: &str = "ORDER BY t.created_at DESC, t.id DESC";

impl Database {
    /// Create a pending task under one of the owner's projects
    pub fn create_task(
        &mut self,
        owner: &Identity,
        project_id: i64,
        draft: TaskDraft,
    ) -> Result<Task, ServiceError> {
        let draft = draft.validated()?;
        let now = Utc::now();

        let task = self.write(|tx| {
            let project = resolve_project(tx, project_id, owner.user_id)?;
            tx.execute(
                "INSERT INTO tasks (project_id, title, description, due_date, completed, created_at, updated_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, NULL)",
                params![project.id, draft.title, draft.description, draft.due_date, now, now],
            )?;
            Ok(Task {
                id: tx.last_insert_rowid(),
                project_id: project.id,
                title: draft.title,
                description: draft.description,
                due_date: draft.due_date,
                completed: false,
                created_at: now,
                updated_at: now,
                completed_at: None,
            })
        })?;

        tracing::info!(task_id = task.id, project_id, "task created");
        Ok(task)
    }

    /// All tasks of one project, newest first
    pub fn list_tasks(&self, owner: &Identity, project_id: i64) -> Result<Vec<Task>, ServiceError> {
        self.read(|tx| {
            let project = resolve_project(tx, project_id, owner.user_id)?;
            let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.project_id = ?1 {NEWEST_FIRST}");
            let mut stmt = tx.prepare(&sql)?;
            let tasks = stmt
                .query_map(params![project.id], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    pub fn list_tasks_paged(
        &self,
        owner: &Identity,
        project_id: i64,
        request: PageRequest,
    ) -> Result<Page<Task>, ServiceError> {
        self.read(|tx| {
            let project = resolve_project(tx, project_id, owner.user_id)?;
            let total: i64 = tx.query_row(
                "SELECT COUNT(*) FROM tasks WHERE project_id = ?1",
                params![project.id],
                |row| row.get(0),
            )?;

            let sql = format!(
                "SELECT {TASK_COLUMNS} FROM tasks t WHERE t.project_id = ?1 {NEWEST_FIRST} LIMIT ?2 OFFSET ?3"
            );
            let mut stmt = tx.prepare(&sql)?;
            let tasks = stmt
                .query_map(
                    params![project.id, request.limit(), request.offset()],
                    row_to_task,
                )?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Page::new(tasks, request, count_to_u64(total)))
        })
    }

    pub fn get_task(&self, owner: &Identity, project_id: i64, task_id: i64) -> Result<Task, ServiceError> {
        self.read(|tx| {
            let (_, task) = resolve_task(tx, task_id, project_id, owner.user_id)?;
            Ok(task)
        })
    }

    /// Replace title, description and due date. Completion state is untouched.
    pub fn update_task(
        &mut self,
        owner: &Identity,
        project_id: i64,
        task_id: i64,
        draft: TaskDraft,
    ) -> Result<Task, ServiceError> {
        let draft = draft.validated()?;

        let task = self.write(|tx| {
            let (project, current) = resolve_task(tx, task_id, project_id, owner.user_id)?;
            let revised = current.revised(&draft, Utc::now());
            tx.execute(
                "UPDATE tasks SET title = ?1, description = ?2, due_date = ?3, updated_at = ?4
                 WHERE id = ?5 AND project_id = ?6",
                params![
                    revised.title,
                    revised.description,
                    revised.due_date,
                    revised.updated_at,
                    revised.id,
                    project.id
                ],
            )?;
            Ok(revised)
        })?;

        tracing::info!(task_id, project_id, "task updated");
        Ok(task)
    }

    /// Flip a task between pending and completed.
    ///
    /// The read and the write happen under one write lock, so two concurrent
    /// toggles always observe each other's result.
    pub fn toggle_task(&mut self, owner: &Identity, project_id: i64, task_id: i64) -> Result<Task, ServiceError> {
        let task = self.write(|tx| {
            let (project, current) = resolve_task(tx, task_id, project_id, owner.user_id)?;
            let toggled = current.toggled(Utc::now());
            tx.execute(
                "UPDATE tasks SET completed = ?1, completed_at = ?2, updated_at = ?3
                 WHERE id = ?4 AND project_id = ?5",
                params![
                    toggled.completed,
                    toggled.completed_at,
                    toggled.updated_at,
                    toggled.id,
                    project.id
                ],
            )?;
            Ok(toggled)
        })?;

        tracing::info!(task_id, project_id, completed = task.completed, "task toggled");
        Ok(task)
    }

    pub fn delete_task(&mut self, owner: &Identity, project_id: i64, task_id: i64) -> Result<(), ServiceError> {
        self.write(|tx| {
            let (project, task) = resolve_task(tx, task_id, project_id, owner.user_id)?;
            tx.execute(
                "DELETE FROM tasks WHERE id = ?1 AND project_id = ?2",
                params![task.id, project.id],
            )?;
            Ok(())
        })?;

        tracing::info!(task_id, project_id, "task deleted");
        Ok(())
    }

    /// Tasks of one project whose title contains `term`, ignoring case
    pub fn search_tasks(
        &self,
        owner: &Identity,
        project_id: i64,
        term: &SearchTerm,
    ) -> Result<Vec<Task>, ServiceError> {
        self.read(|tx| {
            let project = resolve_project(tx, project_id, owner.user_id)?;
            let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.project_id = ?1 {NEWEST_FIRST}");
            let mut stmt = tx.prepare(&sql)?;
            let mut tasks = stmt
                .query_map(params![project.id], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            tasks.retain(|task| term.matches(&task.title));
            Ok(tasks)
        })
    }

    pub fn filter_tasks_by_status(
        &self,
        owner: &Identity,
        project_id: i64,
        completed: bool,
    ) -> Result<Vec<Task>, ServiceError> {
        self.read(|tx| {
            let project = resolve_project(tx, project_id, owner.user_id)?;
            let sql = format!(
                "SELECT {TASK_COLUMNS} FROM tasks t WHERE t.project_id = ?1 AND t.completed = ?2 {NEWEST_FIRST}"
            );
            let mut stmt = tx.prepare(&sql)?;
            let tasks = stmt
                .query_map(params![project.id, completed], row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }
}
