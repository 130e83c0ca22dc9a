//! CLI Thread Subcommands
//!
//! List, read and delete conversations.

use anyhow::{bail, Context, Result};
use bankbot_client::ApiClient;
use bankbot_core::ChatThread;
use bankbot_tui::format::relative_date;
use chrono::{DateTime, Local, Utc};

use crate::auth_cmd::prompt;
use crate::terminal_output::{
    note_info, note_success, paint, render_table, Column, BOLD, CYAN, DIM, GREEN,
};

fn require_session(api: &ApiClient) -> Result<()> {
    if !api.tokens().is_logged_in() {
        bail!("Not logged in. Run `bankbot login` first.");
    }
    Ok(())
}

pub fn threads_table(threads: &[ChatThread], now: DateTime<Utc>) -> String {
    let columns = [
        Column::left("Thread"),
        Column::left("Last message").max_width(48),
        Column::left("Activity"),
        Column::right("Messages"),
    ];
    let rows: Vec<Vec<String>> = threads
        .iter()
        .map(|t| {
            vec![
                t.chat_thread_id.clone(),
                t.last_message.replace('\n', " "),
                relative_date(t.last_activity, now),
                t.message_count.to_string(),
            ]
        })
        .collect();
    render_table(&columns, &rows)
}

pub async fn list(api: &ApiClient) -> Result<()> {
    require_session(api)?;
    let threads = api.threads().await.context("Failed to load conversations")?;
    if threads.is_empty() {
        note_info("No conversations yet");
        return Ok(());
    }
    print!("{}", threads_table(&threads, Utc::now()));
    Ok(())
}

pub async fn history(api: &ApiClient, thread_id: &str, limit: u32) -> Result<()> {
    require_session(api)?;
    let entries = api
        .history(thread_id, Some(limit))
        .await
        .with_context(|| format!("Failed to load history for {thread_id}"))?;
    if entries.is_empty() {
        note_info("No messages in this conversation");
        return Ok(());
    }
    for entry in entries {
        let time = entry.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        println!(
            "{} {}",
            paint(&format!("{BOLD}{CYAN}"), "You"),
            paint(DIM, &time.to_string())
        );
        println!("  {}", entry.user_query);
        println!("{}", paint(&format!("{BOLD}{GREEN}"), "Banking Bot"));
        for line in entry.bot_response.lines() {
            println!("  {line}");
        }
        println!();
    }
    Ok(())
}

pub async fn delete(api: &ApiClient, thread_id: &str) -> Result<()> {
    require_session(api)?;
    api.delete_thread(thread_id)
        .await
        .context("Failed to delete conversation. Please try again.")?;
    note_success(&format!("Deleted {thread_id}"));
    Ok(())
}

pub async fn delete_all(api: &ApiClient, yes: bool) -> Result<()> {
    require_session(api)?;
    if !yes {
        let answer = prompt("Delete ALL conversations? This cannot be undone. [y/N] ")?;
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            note_info("Cancelled");
            return Ok(());
        }
    }
    api.delete_all_threads()
        .await
        .context("Failed to delete all conversations. Please try again.")?;
    note_success("Deleted all conversations");
    Ok(())
}
