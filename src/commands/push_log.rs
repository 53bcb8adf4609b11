//! Push log command handler - viewing queued account pushes.

use crate::db::SqliteRepository;
use crate::error::Result;

/// Show queued pushes, newest first
pub fn handle_push_log(repo: &SqliteRepository, limit: Option<usize>) -> Result<()> {
    use chrono_humanize::HumanTime;

    let tasks = repo.list_push_tasks(limit)?;

    if tasks.is_empty() {
        println!("No pushes queued yet.");
        return Ok(());
    }

    println!("Push log:");
    for task in tasks {
        let age = HumanTime::from(task.created_at);
        let params = task
            .params
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_default();
        println!(
            "  #{:<4} | {} | {} {}",
            task.id,
            age,
            task.account_ids.join(","),
            params
        );
    }

    Ok(())
}
