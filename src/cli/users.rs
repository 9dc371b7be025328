use anyhow::Result;

use super::flag_value;
use crate::core::config::AppConfig;
use crate::core::db::Database;
use crate::core::db::types::Roles;
use crate::core::terminal::{self, print_error};

pub(super) async fn run_user_create(config: AppConfig, args: &[String]) -> Result<()> {
    let username = flag_value(args, 3, &["--username"]);
    let password = flag_value(args, 3, &["--password"]);
    let (Some(username), Some(password)) = (username, password) else {
        print_error("Error: --username and --password are required.");
        return Ok(());
    };
    let role = match flag_value(args, 3, &["--role"]) {
        Some(raw) => match Roles::from_role(&raw) {
            Some(role) => role,
            None => {
                print_error(&format!("Unknown role '{}'. Expected ADMIN or EMPLOYEE.", raw));
                return Ok(());
            }
        },
        None => Roles::Employee,
    };

    let db = Database::open(&config.database.path).await?;
    let user = db.create_user(&username, &password, role).await?;
    terminal::print_success(&format!(
        "Created {} user '{}' (id {})",
        user.role.as_str(),
        user.username,
        user.id
    ));
    Ok(())
}
