use crate::commands::{execute, CommandResult, GlobalOptions};
use brickwise_db::migrations;

pub fn run(options: &GlobalOptions) -> CommandResult {
    execute("migrate", options, |_session| async move {
        let known = migrations::known_count();
        Ok(CommandResult::success(
            "migrate",
            format!("applied pending migrations ({known} known)"),
        ))
    })
}
