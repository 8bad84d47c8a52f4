//! mentorlink - sign in to the mentor backend from the terminal.
//!
//! Tokens live in the system keychain; the last used username and the
//! backend URL live in the config file.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mentorlink_core::auth::token;
use mentorlink_core::models::{LoginCredentials, Registration};
use mentorlink_core::{Config, Error, KeyringStorage, SessionController, SessionStatus};

const USAGE: &str = "\
Usage: mentorlink <command>

Commands:
  login [username]   Sign in and store tokens in the system keychain
  register           Create a mentor account
  logout             Sign out and forget stored tokens
  status             Show the current session
  mentees            List your mentees

Set MENTORLINK_API_URL to point at another backend; RUST_LOG=debug for logs.";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let mut config = Config::load()?;
    let session = SessionController::new(&config, Arc::new(KeyringStorage::new()))
        .context("Failed to create API client")?;
    session.init();
    info!(command, base_url = session.api().base_url(), "mentorlink starting");

    let result = match command {
        "login" => login(&session, &mut config, args.get(1).cloned()).await,
        "register" => register(&session).await,
        "logout" => {
            session.logout().await;
            println!("Signed out.");
            Ok(())
        }
        "status" => {
            status(&session);
            Ok(())
        }
        "mentees" => mentees(&session).await,
        "-h" | "--help" | "help" => {
            println!("{USAGE}");
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    session.dispose();
    result
}

fn prompt(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("{label} [{d}]: "),
        None => print!("{label}: "),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim();
    Ok(match (value.is_empty(), default) {
        (true, Some(d)) => d.to_string(),
        _ => value.to_string(),
    })
}

fn prompt_secret(label: &str) -> Result<String> {
    rpassword::prompt_password(format!("{label}: ")).context("Failed to read password")
}

async fn login(session: &SessionController, config: &mut Config, username: Option<String>) -> Result<()> {
    let user_name = match username {
        Some(u) => u,
        None => prompt("Username", config.last_username.as_deref())?,
    };
    let pass = prompt_secret("Password")?;

    match session.login(&LoginCredentials::new(user_name.clone(), pass)).await {
        Ok(()) => {}
        Err(Error::Api(e)) if matches!(e.status(), Some(400 | 401 | 403)) => {
            bail!("Login failed: wrong username or password.");
        }
        Err(e) => return Err(e.into()),
    }

    config.last_username = Some(user_name);
    if let Err(e) = config.save() {
        tracing::warn!(error = %e, "Failed to save config");
    }

    let state = session.state();
    match state.user.as_ref().and_then(|u| u.name.as_deref()) {
        Some(name) => println!("Signed in as {name}."),
        None => println!("Signed in."),
    }
    Ok(())
}

async fn register(session: &SessionController) -> Result<()> {
    let registration = Registration {
        name: prompt("Full name", None)?,
        email: prompt("Email", None)?,
        birthdate: prompt("Birthdate (YYYY-MM-DD)", None)?,
        phone_number: Some(prompt("Phone number (optional)", None)?).filter(|p| !p.is_empty()),
        user_name: prompt("Username", None)?,
        pass: prompt_secret("Password")?,
        pass_confirmation: prompt_secret("Confirm password")?,
    };

    session.register(&registration).await?;
    println!("Account created. Run `mentorlink login {}` to sign in.", registration.user_name);
    Ok(())
}

fn status(session: &SessionController) {
    let state = session.state();
    println!("Backend: {}", session.api().base_url());
    println!("Status:  {}", state.status);

    if let Some(identity) = &state.identity {
        println!("User ID: {}", identity.user_id);
    }
    if let Some(access_token) = session.credentials().access_token() {
        match state.status {
            SessionStatus::Authenticated => {
                println!("Expires: in {} min", token::minutes_until_expiry(&access_token));
            }
            _ if session.credentials().refresh_token().is_some() => {
                println!("Access token expired; it will be refreshed on the next request.");
            }
            _ => println!("Access token expired; sign in again."),
        }
    }
}

async fn mentees(session: &SessionController) -> Result<()> {
    // Identity comes from the stored token even when it is stale; the
    // request pipeline refreshes it first.
    let Some(identity) = session
        .credentials()
        .access_token()
        .and_then(|t| token::identity_of(&t))
    else {
        bail!("Not signed in. Run `mentorlink login` first.");
    };

    let mentees = session.api().list_mentees(&identity.user_id).await?;

    if mentees.is_empty() {
        println!("No mentees yet.");
        return Ok(());
    }

    for mentee in &mentees {
        let pending = mentee.pending_meetings().count();
        let open = mentee.open_prayer_requests().count();
        println!(
            "{:<24} {:<32} {} pending meeting(s), {} open prayer request(s)",
            mentee.name, mentee.email, pending, open
        );
    }
    Ok(())
}
