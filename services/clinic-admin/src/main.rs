//! Clinic admin CLI
//!
//! Command-line front end for the clinic API:
//! 1. Signs in and keeps the token pair in a local credentials file
//! 2. Lists and inspects appointments
//! 3. Confirms or cancels appointments
//!
//! Every call goes through `clinic_api::ApiClient`, so expired access tokens
//! are refreshed transparently and failures are shown as one-line messages.

mod appointments;
mod config;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clinic_api::{ApiClient, ApiError, Dispatcher, MessageOverrides, SessionObserver, classify};
use clinic_auth::FileCredentialStore;
use common::Secret;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::appointments::{Appointment, AppointmentStatus, ListFilter};
use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "clinic-admin", version, about = "Clinic administration from the terminal")]
struct Cli {
    /// Config file (defaults to CONFIG_PATH, then ./clinic-admin.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the session locally
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and forget the local session
    Logout,
    /// Show whether a session is stored
    Status,
    /// Appointment operations
    #[command(subcommand)]
    Appointments(AppointmentsCommand),
}

#[derive(Debug, Subcommand)]
enum AppointmentsCommand {
    /// List appointments
    List {
        #[arg(long, value_enum)]
        status: Option<AppointmentStatus>,
        /// Earliest date (inclusive)
        #[arg(long)]
        from: Option<String>,
        /// Latest date (inclusive)
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        doctor: Option<String>,
        #[arg(long)]
        clinic: Option<String>,
    },
    /// Show one appointment as JSON
    Show { id: String },
    /// Confirm a scheduled appointment
    Confirm { id: String },
    /// Cancel an appointment
    Cancel { id: String },
}

/// Tells the operator how to start a new session.
struct SignInPrompt;

impl SessionObserver for SignInPrompt {
    fn session_expired(&self) {
        eprintln!("run `clinic-admin login --email <EMAIL>` to start a new session");
    }
}

fn overrides() -> MessageOverrides {
    MessageOverrides {
        unauthorized: Some("not signed in or session expired".into()),
        ..Default::default()
    }
}

/// Turn a failed call into a user-facing error, consuming any pending notice.
fn render(client: &ApiClient, failure: ApiError, fallback: &str) -> anyhow::Error {
    debug!(kind = failure.kind.label(), status = failure.status_code, "call failed");
    let message = match client.take_notice() {
        Some(notice) => notice,
        None => classify(&failure, fallback, Some(&overrides())),
    };
    anyhow::anyhow!(message)
}

fn read_password() -> Result<Secret<String>> {
    eprint!("password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(Secret::new(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn print_row(a: &Appointment) {
    let name = |p: &Option<appointments::PartyRef>| {
        p.as_ref().map_or(appointments::MISSING, |p| p.display_name()).to_string()
    };
    let kind = a
        .kind
        .as_ref()
        .map_or(appointments::MISSING, |k| k.label());
    println!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}",
        a.id,
        a.date,
        a.status,
        kind,
        name(&a.patient),
        name(&a.doctor),
        name(&a.clinic)
    );
}

fn print_json(a: &Appointment) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(a)?);
    Ok(())
}

async fn run(cli: Cli, client: &ApiClient) -> Result<()> {
    match cli.command {
        Command::Login { email, password } => {
            let password = match password {
                Some(p) => Secret::new(p),
                None => read_password()?,
            };
            client.sign_in(&email, &password).await.map_err(|e| {
                let overrides = MessageOverrides {
                    unauthorized: Some("invalid email or password".into()),
                    ..Default::default()
                };
                anyhow::anyhow!(classify(&e, "sign-in failed", Some(&overrides)))
            })?;
            println!("signed in as {email}");
        }
        Command::Logout => {
            client
                .sign_out()
                .await
                .map_err(|e| render(client, e, "sign-out failed"))?;
            println!("signed out");
        }
        Command::Status => {
            if client.is_authenticated() {
                println!("signed in");
            } else {
                println!("not signed in");
            }
        }
        Command::Appointments(cmd) => match cmd {
            AppointmentsCommand::List {
                status,
                from,
                to,
                doctor,
                clinic,
            } => {
                let filter = ListFilter {
                    status,
                    from,
                    to,
                    doctor_id: doctor,
                    clinic_id: clinic,
                };
                let items = appointments::list(client, &filter)
                    .await
                    .map_err(|e| render(client, e, "could not load appointments"))?;
                if items.is_empty() {
                    eprintln!("no appointments found");
                }
                items.iter().for_each(print_row);
            }
            AppointmentsCommand::Show { id } => {
                let item = appointments::get(client, &id)
                    .await
                    .map_err(|e| render(client, e, "could not load appointment"))?;
                print_json(&item)?;
            }
            AppointmentsCommand::Confirm { id } => {
                let item = appointments::confirm(client, &id)
                    .await
                    .map_err(|e| render(client, e, "could not confirm appointment"))?;
                print_json(&item)?;
            }
            AppointmentsCommand::Cancel { id } => {
                let item = appointments::cancel(client, &id)
                    .await
                    .map_err(|e| render(client, e, "could not cancel appointment"))?;
                print_json(&item)?;
            }
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output on stdout stays pipeable
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    info!(
        base_url = %config.api.base_url,
        credentials = %config.session.credentials_path.display(),
        "configuration loaded"
    );

    let store = FileCredentialStore::load(config.session.credentials_path.clone())
        .with_context(|| {
            format!(
                "failed to open credentials at {}",
                config.session.credentials_path.display()
            )
        })?;

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let dispatcher = Dispatcher::new(http, config.api.base_url.clone(), Arc::new(store))
        .with_observer(Arc::new(SignInPrompt));
    let client = ApiClient::new(dispatcher);

    run(cli, &client).await
}
