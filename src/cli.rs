use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::auth::{Credentials, Registration};
use crate::config::Config;
use crate::database::Database;
use crate::error::ServiceError;
use crate::models::{Identity, ProjectDraft, Task, TaskDraft};
use crate::query::{Page, PageRequest, SearchTerm};
use crate::seed;
use crate::utils::{parse_date, today};

#[derive(Parser)]
#[command(name = "tasker")]
#[command(about = "Projects and tasks, each visible only to its owner")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    /// Session token from `register` or `login`
    #[arg(long, env = "TASKER_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account and print a session token
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in and print a session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TASKER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Revoke the current session token
    Logout,
    /// Show the identity behind the current token
    Whoami,
    /// Create demo accounts (requires TASKER_SEED=1)
    Seed,
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommand),
    /// Manage tasks inside a project
    #[command(subcommand)]
    Task(TaskCommand),
}

#[derive(Subcommand)]
pub enum ProjectCommand {
    Create {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List projects, newest first. Pass --page or --size for a single page.
    List {
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        size: Option<i64>,
    },
    Get {
        id: i64,
    },
    /// Replace title and description
    Update {
        id: i64,
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a project together with all of its tasks
    Delete {
        id: i64,
    },
    /// Case-insensitive title search
    Search {
        term: String,
    },
}

#[derive(Subcommand)]
pub enum TaskCommand {
    Create {
        project_id: i64,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },
    /// List a project's tasks, newest first. Pass --page or --size for a single page.
    List {
        project_id: i64,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        size: Option<i64>,
    },
    Get {
        project_id: i64,
        task_id: i64,
    },
    /// Replace title, description and due date
    Update {
        project_id: i64,
        task_id: i64,
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,
    },
    /// Flip between pending and completed
    Toggle {
        project_id: i64,
        task_id: i64,
    },
    Delete {
        project_id: i64,
        task_id: i64,
    },
    /// Case-insensitive title search
    Search {
        project_id: i64,
        term: String,
    },
    /// Only tasks with the given status
    Filter {
        project_id: i64,
        #[arg(value_enum)]
        status: StatusArg,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Completed,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("No session token; pass --token or set TASKER_TOKEN")]
    MissingToken,
    #[error("Seeding is disabled; set {0}=1 to allow it")]
    SeedDisabled(&'static str),
    #[error("Failed to render output: {0}")]
    OutputError(#[from] serde_json::Error),
}

/// A task as printed, with its overdue flag worked out against today's date
#[derive(Serialize)]
struct TaskOutput {
    #[serde(flatten)]
    task: Task,
    overdue: bool,
}

impl TaskOutput {
    fn new(task: Task) -> Self {
        let overdue = task.is_overdue(today());
        Self { task, overdue }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_tasks(tasks: Vec<Task>) -> Result<(), CliError> {
    let rendered: Vec<_> = tasks.into_iter().map(TaskOutput::new).collect();
    print_json(&rendered)
}

fn print_task_page(page: Page<Task>) -> Result<(), CliError> {
    print_json(&page.map(TaskOutput::new))
}

fn parse_due(due: Option<String>) -> Result<Option<chrono::NaiveDate>, CliError> {
    due.map(|raw| {
        parse_date(&raw)
            .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", raw, e)))
    })
    .transpose()
}

/// `None` when neither flag was given, meaning "list everything"
fn page_request(
    page: Option<i64>,
    size: Option<i64>,
    config: &Config,
) -> Result<Option<PageRequest>, CliError> {
    if page.is_none() && size.is_none() {
        return Ok(None);
    }
    let size = size.unwrap_or(i64::from(config.default_page_size));
    Ok(Some(PageRequest::new(page.unwrap_or(0), size)?))
}

fn identity(db: &Database, token: Option<&str>) -> Result<Identity, CliError> {
    let token = token.ok_or(CliError::MissingToken)?;
    Ok(db.resolve_identity(token)?)
}

/// Dispatch a parsed command against the store
pub fn run(
    command: Commands,
    token: Option<String>,
    config: &Config,
    db: &mut Database,
) -> Result<(), CliError> {
    match command {
        Commands::Register {
            name,
            email,
            password,
        } => {
            let registration = Registration {
                full_name: name,
                email,
                password,
            };
            let session = db.register(registration, config.session_ttl())?;
            print_json(&session)
        }
        Commands::Login { email, password } => {
            let session = db.authenticate(Credentials { email, password }, config.session_ttl())?;
            print_json(&session)
        }
        Commands::Logout => {
            let token = token.ok_or(CliError::MissingToken)?;
            db.logout(&token)?;
            println!("Signed out");
            Ok(())
        }
        Commands::Whoami => {
            let owner = identity(db, token.as_deref())?;
            print_json(&owner)
        }
        Commands::Seed => {
            if !seed::flag_enabled(std::env::var(seed::SEED_ENV).ok().as_deref()) {
                return Err(CliError::SeedDisabled(seed::SEED_ENV));
            }
            let created = seed::run(db)?;
            println!("Seeded {} demo account(s)", created.len());
            Ok(())
        }
        Commands::Project(command) => {
            let owner = identity(db, token.as_deref())?;
            handle_project(command, &owner, config, db)
        }
        Commands::Task(command) => {
            let owner = identity(db, token.as_deref())?;
            handle_task(command, &owner, config, db)
        }
    }
}

fn handle_project(
    command: ProjectCommand,
    owner: &Identity,
    config: &Config,
    db: &mut Database,
) -> Result<(), CliError> {
    match command {
        ProjectCommand::Create { title, description } => {
            let view = db.create_project(owner, ProjectDraft::new(title, description))?;
            print_json(&view)
        }
        ProjectCommand::List { page, size } => match page_request(page, size, config)? {
            Some(request) => print_json(&db.list_projects_paged(owner, request)?),
            None => print_json(&db.list_projects(owner)?),
        },
        ProjectCommand::Get { id } => print_json(&db.get_project(owner, id)?),
        ProjectCommand::Update {
            id,
            title,
            description,
        } => {
            let view = db.update_project(owner, id, ProjectDraft::new(title, description))?;
            print_json(&view)
        }
        ProjectCommand::Delete { id } => {
            db.delete_project(owner, id)?;
            println!("Project deleted (ID: {})", id);
            Ok(())
        }
        ProjectCommand::Search { term } => {
            let term = SearchTerm::parse(&term)?;
            print_json(&db.search_projects(owner, &term)?)
        }
    }
}

fn handle_task(
    command: TaskCommand,
    owner: &Identity,
    config: &Config,
    db: &mut Database,
) -> Result<(), CliError> {
    match command {
        TaskCommand::Create {
            project_id,
            title,
            description,
            due,
        } => {
            let draft = TaskDraft {
                title,
                description,
                due_date: parse_due(due)?,
            };
            let task = db.create_task(owner, project_id, draft)?;
            print_json(&TaskOutput::new(task))
        }
        TaskCommand::List {
            project_id,
            page,
            size,
        } => match page_request(page, size, config)? {
            Some(request) => print_task_page(db.list_tasks_paged(owner, project_id, request)?),
            None => print_tasks(db.list_tasks(owner, project_id)?),
        },
        TaskCommand::Get {
            project_id,
            task_id,
        } => {
            let task = db.get_task(owner, project_id, task_id)?;
            print_json(&TaskOutput::new(task))
        }
        TaskCommand::Update {
            project_id,
            task_id,
            title,
            description,
            due,
        } => {
            let draft = TaskDraft {
                title,
                description,
                due_date: parse_due(due)?,
            };
            let task = db.update_task(owner, project_id, task_id, draft)?;
            print_json(&TaskOutput::new(task))
        }
        TaskCommand::Toggle {
            project_id,
            task_id,
        } => {
            let task = db.toggle_task(owner, project_id, task_id)?;
            print_json(&TaskOutput::new(task))
        }
        TaskCommand::Delete {
            project_id,
            task_id,
        } => {
            db.delete_task(owner, project_id, task_id)?;
            println!("Task deleted (ID: {})", task_id);
            Ok(())
        }
        TaskCommand::Search { project_id, term } => {
            let term = SearchTerm::parse(&term)?;
            print_tasks(db.search_tasks(owner, project_id, &term)?)
        }
        TaskCommand::Filter { project_id, status } => {
            let completed = status == StatusArg::Completed;
            print_tasks(db.filter_tasks_by_status(owner, project_id, completed)?)
        }
    }
}
