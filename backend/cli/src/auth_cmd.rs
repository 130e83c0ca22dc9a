//! CLI Auth Subcommands
//!
//! `login`, `logout` and `whoami` against the backend's `/auth` endpoints.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use bankbot_client::{ApiClient, ClientError};
use chrono::Utc;

use crate::terminal_output::{note_info, note_success, paint, DIM};

/// Fill in missing credentials from the given readers and reject blanks.
pub fn resolve_credentials(
    user: Option<String>,
    password: Option<String>,
    ask_user: impl FnOnce() -> Result<String>,
    ask_password: impl FnOnce() -> Result<String>,
) -> Result<(String, String)> {
    let user = match user {
        Some(user) => user,
        None => ask_user()?,
    };
    let password = match password {
        Some(password) => password,
        None => ask_password()?,
    };
    let user = user.trim().to_string();
    if user.is_empty() || password.is_empty() {
        bail!("Please enter both username and password");
    }
    Ok((user, password))
}

pub async fn login(api: &ApiClient, user: Option<String>, password: Option<String>) -> Result<()> {
    let (user, password) = resolve_credentials(
        user,
        password,
        || prompt("Username: "),
        || rpassword::prompt_password("Password: ").context("Failed to read password"),
    )?;

    match api.login(&user, &password).await {
        Ok(profile) => {
            note_success(&format!("Logged in as {}", profile.display_name()));
            Ok(())
        }
        Err(ClientError::InvalidCredentials) => bail!("Invalid username or password"),
        Err(e) => Err(e).context("Login failed"),
    }
}

pub fn logout(api: &ApiClient) {
    let was_logged_in = api.tokens().is_logged_in();
    api.logout();
    if was_logged_in {
        note_success("Logged out");
    } else {
        note_info("No active session");
    }
}

pub async fn whoami(api: &ApiClient) -> Result<()> {
    if !api.tokens().is_logged_in() {
        bail!("Not logged in. Run `bankbot login` first.");
    }
    let user = api.current_user().await.context("Failed to load profile")?;
    println!("{}", user.display_name());
    println!("  user id  {}", user.user_id);
    if !user.email.is_empty() {
        println!("  email    {}", user.email);
    }
    if let Some(remaining) = api.tokens().session().and_then(|s| s.remaining(Utc::now())) {
        let line = format!("  session  expires in {} min", remaining.num_minutes());
        println!("{}", paint(DIM, &line));
    }
    Ok(())
}

/// Read one line from stdin after printing `label`.
pub fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{label}")?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_password_goes_through_the_password_reader() {
        let (user, password) = resolve_credentials(
            Some(" john_doe ".into()),
            None,
            || panic!("username was given"),
            || Ok("s3cret".into()),
        )
        .unwrap();
        assert_eq!(user, "john_doe");
        assert_eq!(password, "s3cret");
    }

    #[test]
    fn given_credentials_skip_both_readers() {
        let creds = resolve_credentials(
            Some("john".into()),
            Some("pw".into()),
            || panic!("username was given"),
            || panic!("password was given"),
        )
        .unwrap();
        assert_eq!(creds, ("john".to_string(), "pw".to_string()));
    }

    #[test]
    fn blank_credentials_are_rejected() {
        let err = resolve_credentials(None, None, || Ok("  ".into()), || Ok(String::new()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Please enter both username and password");
    }
}
