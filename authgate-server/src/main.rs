//! authgate server: token issuance and validation for auth subrequests

use anyhow::{anyhow, Context};
use authgate_core::auth::{generate_credentials, write_credentials, AuthEngine, CredentialStore, RolePolicy};
use authgate_core::AuthConfig;
use authgate_server::{logging, AppState, AuthServer};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

fn cli() -> Command {
    Command::new("authgate-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Short-lived bearer tokens for role-based principals")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("serve")
                .about("Serve login and validation endpoints")
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .value_name("ADDR")
                        .env("AUTHGATE_BIND")
                        .value_parser(value_parser!(SocketAddr))
                        .default_value("127.0.0.1:9000")
                        .help("Bind address"),
                )
                .arg(
                    Arg::new("credentials")
                        .long("credentials")
                        .value_name("PATH")
                        .env("AUTHGATE_CREDENTIALS")
                        .value_parser(value_parser!(PathBuf))
                        .default_value(".env")
                        .help("principal=secret credential file"),
                )
                .arg(
                    Arg::new("settings")
                        .long("settings")
                        .value_name("PATH")
                        .env("AUTHGATE_SETTINGS")
                        .value_parser(value_parser!(PathBuf))
                        .default_value("settings.env")
                        .help("Optional KEY=value settings file"),
                )
                .arg(
                    Arg::new("secure-cookies")
                        .long("secure-cookies")
                        .action(ArgAction::SetTrue)
                        .help("Mark the auth cookie Secure"),
                ),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate bootstrap credentials")
                .arg(
                    Arg::new("users-per-role")
                        .long("users-per-role")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .default_value("1")
                        .help("Number of principals per role"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .value_name("PATH")
                        .value_parser(value_parser!(PathBuf))
                        .default_value(".env")
                        .help("Output credential file"),
                ),
        )
}

fn required<'a, T: Clone + Send + Sync + 'static>(matches: &'a ArgMatches, name: &str) -> anyhow::Result<&'a T> {
    matches
        .get_one::<T>(name)
        .ok_or_else(|| anyhow!("missing argument --{}", name))
}

async fn serve(matches: &ArgMatches) -> anyhow::Result<()> {
    let bind_addr = *required::<SocketAddr>(matches, "bind")?;
    let credentials = required::<PathBuf>(matches, "credentials")?;
    let settings = required::<PathBuf>(matches, "settings")?;

    info!("Starting authgate server");

    let config = AuthConfig::load(Some(settings.as_path())).context("invalid configuration")?;
    let store = CredentialStore::load(credentials).context("failed to load credentials")?;
    let engine = AuthEngine::new(&config, store, RolePolicy::default())
        .context("credential store and role policy disagree")?;

    let state = AppState {
        engine,
        secure_cookies: matches.get_flag("secure-cookies"),
    };

    AuthServer::new(state).serve(bind_addr).await?;
    info!("Server shutdown gracefully");
    Ok(())
}

fn generate(matches: &ArgMatches) -> anyhow::Result<()> {
    let users_per_role = *required::<usize>(matches, "users-per-role")?;
    let output = required::<PathBuf>(matches, "output")?;

    let credentials = generate_credentials(users_per_role);
    write_credentials(&credentials, output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!("Generated {} principals into {}", credentials.len(), output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    logging::init(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("serve", sub)) => serve(sub).await,
        Some(("generate", sub)) => generate(sub),
        _ => Err(anyhow!("unknown command")),
    }
}
