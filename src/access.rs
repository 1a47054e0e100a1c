//! Ownership-scoped lookups.
//!
//! These are the only ways to load a project or task by id. A project is found
//! only through its owner, and a task only through a project that was itself
//! found through its owner. A resource that exists but belongs to someone else
//! is reported exactly like one that does not exist.

use rusqlite::{Connection, OptionalExtension};

use crate::database::{PROJECT_COLUMNS, TASK_COLUMNS, row_to_project, row_to_task};
use crate::error::{Resource, ServiceError};
use crate::models::{Project, Task};

/// Load `project_id` if and only if `owner_id` owns it.
pub fn resolve_project(
    conn: &Connection,
    project_id: i64,
    owner_id: i64,
) -> Result<Project, ServiceError> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects p WHERE p.id = ?1 AND p.owner_id = ?2");
    conn.query_row(&sql, rusqlite::params![project_id, owner_id], row_to_project)
        .optional()?
        .ok_or_else(|| {
            tracing::debug!(project_id, owner_id, "project outside owner scope");
            ServiceError::not_found(Resource::Project, project_id)
        })
}

/// Load `task_id` if it belongs to `project_id` and `owner_id` owns that project.
///
/// Returns the scoped project alongside the task so callers do not look it up twice.
pub fn resolve_task(
    conn: &Connection,
    task_id: i64,
    project_id: i64,
    owner_id: i64,
) -> Result<(Project, Task), ServiceError> {
    let project = resolve_project(conn, project_id, owner_id)?;
    let task = task_in_project(conn, task_id, &project)?;
    Ok((project, task))
}

/// Load a task under a project the caller already resolved.
fn task_in_project(
    conn: &Connection,
    task_id: i64,
    project: &Project,
) -> Result<Task, ServiceError> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = ?1 AND t.project_id = ?2");
    conn.query_row(&sql, rusqlite::params![task_id, project.id], row_to_task)
        .optional()?
        .ok_or_else(|| {
            tracing::debug!(task_id, project_id = project.id, "task outside project scope");
            ServiceError::not_found(Resource::Task, task_id)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::{Identity, ProjectDraft, TaskDraft};
    use rstest::{fixture, rstest};

    fn user(db: &Database, email: &str) -> Identity {
        db.conn()
            .execute(
                "INSERT INTO users (full_name, email, password_hash, created_at)
                 VALUES (?1, ?2, 'unused', '2024-01-01 00:00:00+00:00')",
                rusqlite::params![email, email],
            )
            .unwrap();
        Identity {
            user_id: db.conn().last_insert_rowid(),
            email: email.to_string(),
            full_name: email.to_string(),
        }
    }

    struct Scene {
        db: Database,
        alice: Identity,
        bob: Identity,
        alice_project: i64,
        alice_task: i64,
        bob_project: i64,
        bob_task: i64,
    }

    #[fixture]
    fn scene() -> Scene {
        let mut db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice@example.com");
        let bob = user(&db, "bob@example.com");

        let alice_project = db
            .create_project(&alice, ProjectDraft::new("Alice", None))
            .unwrap()
            .project
            .id;
        let alice_task = db
            .create_task(&alice, alice_project, TaskDraft::new("a1"))
            .unwrap()
            .id;
        let bob_project = db
            .create_project(&bob, ProjectDraft::new("Bob", None))
            .unwrap()
            .project
            .id;
        let bob_task = db
            .create_task(&bob, bob_project, TaskDraft::new("b1"))
            .unwrap()
            .id;

        Scene {
            db,
            alice,
            bob,
            alice_project,
            alice_task,
            bob_project,
            bob_task,
        }
    }

    #[rstest]
    fn owner_resolves_own_project(scene: Scene) {
        let project = resolve_project(scene.db.conn(), scene.alice_project, scene.alice.user_id)
            .unwrap();
        assert_eq!(project.title, "Alice");
    }

    #[rstest]
    fn foreign_project_looks_missing(scene: Scene) {
        let foreign = resolve_project(scene.db.conn(), scene.bob_project, scene.alice.user_id)
            .unwrap_err();
        let absent = resolve_project(scene.db.conn(), 9_999, scene.alice.user_id).unwrap_err();

        assert!(matches!(
            foreign,
            ServiceError::NotFound { resource: Resource::Project, .. }
        ));
        assert!(matches!(
            absent,
            ServiceError::NotFound { resource: Resource::Project, .. }
        ));
    }

    #[rstest]
    fn task_requires_owned_project(scene: Scene) {
        let err = resolve_task(
            scene.db.conn(),
            scene.bob_task,
            scene.bob_project,
            scene.alice.user_id,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::NotFound { resource: Resource::Project, .. }
        ));
    }

    #[rstest]
    fn task_from_another_project_looks_missing(scene: Scene) {
        // Alice's own project, Bob's task id.
        let err = resolve_task(
            scene.db.conn(),
            scene.bob_task,
            scene.alice_project,
            scene.alice.user_id,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::NotFound { resource: Resource::Task, id } if id == scene.bob_task
        ));
    }

    #[rstest]
    fn task_resolves_through_its_project(scene: Scene) {
        let (project, task) = resolve_task(
            scene.db.conn(),
            scene.bob_task,
            scene.bob_project,
            scene.bob.user_id,
        )
        .unwrap();
        assert_eq!(project.id, scene.bob_project);
        assert_eq!(task.project_id, scene.bob_project);
        assert_eq!(task.title, "b1");

        let (_, own) = resolve_task(
            scene.db.conn(),
            scene.alice_task,
            scene.alice_project,
            scene.alice.user_id,
        )
        .unwrap();
        assert_eq!(own.title, "a1");
    }
}
