pub mod access;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod projects;
pub mod query;
pub mod seed;
pub mod tasks;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use error::{Resource, ServiceError};
pub use models::{Identity, Project, ProjectDraft, ProjectView, Task, TaskDraft};
pub use query::{Page, PageRequest, SearchTerm};
pub use utils::Profile;
