use chrono::Utc;
use rusqlite::{Connection, params};

use crate::access::resolve_project;
use crate::database::{Database, PROJECT_COLUMNS, count_to_u64, row_to_project};
use crate::error::ServiceError;
use crate::models::{Identity, Project, ProjectDraft, ProjectProgress, ProjectView};
use crate::query::{Page, PageRequest, SearchTerm};

/// Projects joined with their task counts. Callers append WHERE/ORDER/LIMIT
/// clauses after the join and must end with `GROUP BY p.id`.
fn view_select() -> String {
    format!(
        "SELECT {PROJECT_COLUMNS}, COUNT(t.id), COALESCE(SUM(t.completed), 0)
         FROM projects p LEFT JOIN tasks t ON t.project_id = p.id"
    )
}

const NEWEST_FIRST: &str = "ORDER BY p.created_at DESC, p.id DESC";

fn row_to_view(row: &rusqlite::Row) -> Result<ProjectView, rusqlite::Error> {
    let project = row_to_project(row)?;
    let total: i64 = row.get(6)?;
    let completed: i64 = row.get(7)?;
    Ok(ProjectView::new(
        project,
        ProjectProgress::new(count_to_u64(total), count_to_u64(completed)),
    ))
}

/// Count a project's tasks and how many of them are completed
fn progress_of(conn: &Connection, project_id: i64) -> Result<ProjectProgress, ServiceError> {
    let (total, completed): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(completed), 0) FROM tasks WHERE project_id = ?1",
        params![project_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(ProjectProgress::new(
        count_to_u64(total),
        count_to_u64(completed),
    ))
}

fn view_of(conn: &Connection, project: Project) -> Result<ProjectView, ServiceError> {
    let progress = progress_of(conn, project.id)?;
    Ok(ProjectView::new(project, progress))
}

impl Database {
    /// Create a project owned by `owner`. A new project has no tasks.
    pub fn create_project(
        &mut self,
        owner: &Identity,
        draft: ProjectDraft,
    ) -> Result<ProjectView, ServiceError> {
        let draft = draft.validated()?;
        let now = Utc::now();

        let project = self.write(|tx| {
            tx.execute(
                "INSERT INTO projects (title, description, owner_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![draft.title, draft.description, owner.user_id, now, now],
            )?;
            Ok(Project {
                id: tx.last_insert_rowid(),
                title: draft.title,
                description: draft.description,
                owner_id: owner.user_id,
                created_at: now,
                updated_at: now,
            })
        })?;

        tracing::info!(project_id = project.id, owner_id = owner.user_id, "project created");
        Ok(ProjectView::new(project, ProjectProgress::default()))
    }

    /// All of the owner's projects, newest first
    pub fn list_projects(&self, owner: &Identity) -> Result<Vec<ProjectView>, ServiceError> {
        self.read(|tx| {
            let sql = format!("{} WHERE p.owner_id = ?1 GROUP BY p.id {NEWEST_FIRST}", view_select());
            let mut stmt = tx.prepare(&sql)?;
            let views = stmt
                .query_map(params![owner.user_id], row_to_view)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(views)
        })
    }

    pub fn list_projects_paged(
        &self,
        owner: &Identity,
        request: PageRequest,
    ) -> Result<Page<ProjectView>, ServiceError> {
        self.read(|tx| {
            let total: i64 = tx.query_row(
                "SELECT COUNT(*) FROM projects WHERE owner_id = ?1",
                params![owner.user_id],
                |row| row.get(0),
            )?;

            let sql = format!(
                "{} WHERE p.owner_id = ?1 GROUP BY p.id {NEWEST_FIRST} LIMIT ?2 OFFSET ?3",
                view_select()
            );
            let mut stmt = tx.prepare(&sql)?;
            let views = stmt
                .query_map(
                    params![owner.user_id, request.limit(), request.offset()],
                    row_to_view,
                )?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Page::new(views, request, count_to_u64(total)))
        })
    }

    pub fn get_project(&self, owner: &Identity, project_id: i64) -> Result<ProjectView, ServiceError> {
        self.read(|tx| {
            let project = resolve_project(tx, project_id, owner.user_id)?;
            view_of(tx, project)
        })
    }

    /// Replace title and description. `created_at` and the task counts are untouched.
    pub fn update_project(
        &mut self,
        owner: &Identity,
        project_id: i64,
        draft: ProjectDraft,
    ) -> Result<ProjectView, ServiceError> {
        let draft = draft.validated()?;

        let view = self.write(|tx| {
            let current = resolve_project(tx, project_id, owner.user_id)?;
            let revised = current.revised(&draft, Utc::now());
            tx.execute(
                "UPDATE projects SET title = ?1, description = ?2, updated_at = ?3
                 WHERE id = ?4 AND owner_id = ?5",
                params![
                    revised.title,
                    revised.description,
                    revised.updated_at,
                    revised.id,
                    owner.user_id
                ],
            )?;
            view_of(tx, revised)
        })?;

        tracing::info!(project_id, owner_id = owner.user_id, "project updated");
        Ok(view)
    }

    /// Delete a project and every task under it in one transaction.
    pub fn delete_project(&mut self, owner: &Identity, project_id: i64) -> Result<(), ServiceError> {
        let removed_tasks = self.write(|tx| {
            let project = resolve_project(tx, project_id, owner.user_id)?;

            let removed_tasks = tx.execute(
                "DELETE FROM tasks WHERE project_id = ?1",
                params![project.id],
            )?;
            tx.execute(
                "DELETE FROM projects WHERE id = ?1 AND owner_id = ?2",
                params![project.id, owner.user_id],
            )?;

            let orphans: i64 = tx.query_row(
                "SELECT COUNT(*) FROM tasks WHERE project_id = ?1",
                params![project.id],
                |row| row.get(0),
            )?;
            if orphans != 0 {
                return Err(ServiceError::Fatal(format!(
                    "{orphans} tasks left behind by deletion of project {}",
                    project.id
                )));
            }
            Ok(removed_tasks)
        })?;

        tracing::info!(
            project_id,
            owner_id = owner.user_id,
            removed_tasks,
            "project deleted"
        );
        Ok(())
    }

    /// Owner's projects whose title contains `term`, ignoring case
    pub fn search_projects(
        &self,
        owner: &Identity,
        term: &SearchTerm,
    ) -> Result<Vec<ProjectView>, ServiceError> {
        self.read(|tx| {
            // SQLite's lower() folds ASCII only, so titles are matched here.
            let sql = format!("{} WHERE p.owner_id = ?1 GROUP BY p.id {NEWEST_FIRST}", view_select());
            let mut stmt = tx.prepare(&sql)?;
            let mut views = stmt
                .query_map(params![owner.user_id], row_to_view)?
                .collect::<Result<Vec<_>, _>>()?;
            views.retain(|view| term.matches(&view.project.title));
            Ok(views)
        })
    }
}
