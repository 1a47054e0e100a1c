use crate::auth::Registration;
use crate::database::Database;
use crate::error::ServiceError;

/// Environment flag that must be set before demo accounts are created.
pub const SEED_ENV: &str = "TASKER_SEED";

const DEMO_ACCOUNTS: &[(&str, &str, &str)] = &[
    ("Demo User", "demo@example.com", "demo-password"),
    ("Demo Admin", "admin@example.com", "admin-password"),
];

/// Whether a `TASKER_SEED`-style flag value enables seeding
pub fn flag_enabled(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}

/// Create the demo accounts that do not exist yet. Returns the emails created.
pub fn run(db: &mut Database) -> Result<Vec<String>, ServiceError> {
    let mut created = Vec::new();
    for (full_name, email, password) in DEMO_ACCOUNTS {
        if db.user_exists(email)? {
            tracing::debug!(email, "demo account already present");
            continue;
        }
        let registration = Registration {
            full_name: full_name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        db.create_account(registration)?;
        tracing::info!(email, "demo account created");
        created.push(email.to_string());
    }
    Ok(created)
}
