use chrono::Duration;
use rstest::{fixture, rstest};
use tasker::auth::Registration;
use tasker::{
    Database, Identity, PageRequest, ProjectDraft, Resource, SearchTerm, ServiceError, TaskDraft,
};

struct Tenants {
    db: Database,
    owner: Identity,
    intruder: Identity,
    project_id: i64,
    task_id: i64,
}

fn register(db: &mut Database, name: &str, email: &str) -> Identity {
    db.register(
        Registration {
            full_name: name.to_string(),
            email: email.to_string(),
            password: "long enough password".to_string(),
        },
        Duration::hours(1),
    )
    .expect("register")
    .identity
}

#[fixture]
fn tenants() -> Tenants {
    let mut db = Database::open_in_memory().expect("open store");
    let owner = register(&mut db, "Owner", "owner@example.com");
    let intruder = register(&mut db, "Intruder", "intruder@example.com");

    let project_id = db
        .create_project(&owner, ProjectDraft::new("Launch", None))
        .expect("create project")
        .project
        .id;
    let task_id = db
        .create_task(&owner, project_id, TaskDraft::new("Write spec"))
        .expect("create task")
        .id;

    Tenants {
        db,
        owner,
        intruder,
        project_id,
        task_id,
    }
}

fn assert_project_not_found<T: std::fmt::Debug>(result: Result<T, ServiceError>) {
    match result {
        Err(ServiceError::NotFound {
            resource: Resource::Project,
            ..
        }) => {}
        other => panic!("expected project NotFound, got {other:?}"),
    }
}

#[rstest]
fn intruder_cannot_read_projects(tenants: Tenants) {
    let Tenants {
        db,
        intruder,
        project_id,
        ..
    } = tenants;

    assert_project_not_found(db.get_project(&intruder, project_id));
    assert!(db.list_projects(&intruder).unwrap().is_empty());
    assert!(
        db.list_projects_paged(&intruder, PageRequest::new(0, 10).unwrap())
            .unwrap()
            .items
            .is_empty()
    );
    assert!(
        db.search_projects(&intruder, &SearchTerm::parse("launch").unwrap())
            .unwrap()
            .is_empty()
    );
}

#[rstest]
fn intruder_cannot_mutate_projects(tenants: Tenants) {
    let Tenants {
        mut db,
        owner,
        intruder,
        project_id,
        ..
    } = tenants;

    assert_project_not_found(db.update_project(
        &intruder,
        project_id,
        ProjectDraft::new("Hijacked", None),
    ));
    assert_project_not_found(db.delete_project(&intruder, project_id));

    let view = db.get_project(&owner, project_id).unwrap();
    assert_eq!(view.project.title, "Launch");
    assert_eq!(view.total_tasks, 1);
}

#[rstest]
fn intruder_cannot_reach_tasks(tenants: Tenants) {
    let Tenants {
        mut db,
        owner,
        intruder,
        project_id,
        task_id,
    } = tenants;

    assert_project_not_found(db.get_task(&intruder, project_id, task_id));
    assert_project_not_found(db.list_tasks(&intruder, project_id));
    assert_project_not_found(db.list_tasks_paged(
        &intruder,
        project_id,
        PageRequest::new(0, 10).unwrap(),
    ));
    assert_project_not_found(db.search_tasks(
        &intruder,
        project_id,
        &SearchTerm::parse("spec").unwrap(),
    ));
    assert_project_not_found(db.filter_tasks_by_status(&intruder, project_id, false));
    assert_project_not_found(db.create_task(&intruder, project_id, TaskDraft::new("sneaky")));
    assert_project_not_found(db.update_task(
        &intruder,
        project_id,
        task_id,
        TaskDraft::new("Hijacked"),
    ));
    assert_project_not_found(db.toggle_task(&intruder, project_id, task_id));
    assert_project_not_found(db.delete_task(&intruder, project_id, task_id));

    let task = db.get_task(&owner, project_id, task_id).unwrap();
    assert_eq!(task.title, "Write spec");
    assert!(!task.completed);
    assert_eq!(db.list_tasks(&owner, project_id).unwrap().len(), 1);
}

#[rstest]
fn foreign_and_missing_ids_are_indistinguishable(tenants: Tenants) {
    let Tenants {
        db,
        intruder,
        project_id,
        ..
    } = tenants;

    let foreign = db.get_project(&intruder, project_id).unwrap_err().to_string();
    let missing_id = project_id + 1_000;
    let missing = db.get_project(&intruder, missing_id).unwrap_err().to_string();

    assert_eq!(
        foreign.replace(&project_id.to_string(), "<id>"),
        missing.replace(&missing_id.to_string(), "<id>")
    );
}

#[rstest]
fn intruder_task_id_under_own_project_is_not_found(tenants: Tenants) {
    let Tenants {
        mut db,
        intruder,
        task_id,
        ..
    } = tenants;

    let own_project = db
        .create_project(&intruder, ProjectDraft::new("Mine", None))
        .unwrap()
        .project
        .id;

    match db.toggle_task(&intruder, own_project, task_id) {
        Err(ServiceError::NotFound {
            resource: Resource::Task,
            id,
        }) => assert_eq!(id, task_id),
        other => panic!("expected task NotFound, got {other:?}"),
    }
}
