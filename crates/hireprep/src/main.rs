use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hireprep::client::AuthenticatedClient;
use hireprep::config::{
    ClientConfig, DEFAULT_REFRESH_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, ENV_API_URL,
    ENV_REFRESH_TIMEOUT, ENV_REQUEST_TIMEOUT,
};
use miette::IntoDiagnostic;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "HirePrep API client")]
struct Args {
    /// API base URL (e.g. http://localhost:8000)
    #[arg(long, env = ENV_API_URL)]
    api_url: Url,

    /// Username to log in with
    #[arg(short, long, env = "HIREPREP_USERNAME")]
    username: String,

    /// Password (or emailed temporary password)
    #[arg(short, long, env = "HIREPREP_PASSWORD", hide_env_values = true)]
    password: String,

    /// Seconds to wait for a token refresh before giving up
    #[arg(long, env = ENV_REFRESH_TIMEOUT, default_value_t = DEFAULT_REFRESH_TIMEOUT.as_secs())]
    refresh_timeout: u64,

    /// Seconds to wait for any other request
    #[arg(long, env = ENV_REQUEST_TIMEOUT, default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    request_timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the logged-in account
    Whoami,
    /// GET an API path and print the body
    Get {
        /// Path under the API base, e.g. /problems/
        path: String,
    },
    /// Replace the temporary password used to log in
    ChangePassword {
        /// New password (at least 8 characters)
        #[arg(long, env = "HIREPREP_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = ClientConfig::new()
        .base_url(args.api_url)
        .refresh_timeout(Duration::from_secs(args.refresh_timeout))
        .request_timeout(Duration::from_secs(args.request_timeout))
        .build();
    let client = AuthenticatedClient::from_config(config)?.with_redirect(Arc::new(|| {
        eprintln!("session expired, log in again");
    }));

    let outcome = client.login(&args.username, &args.password).await?;
    if outcome.must_change_password && !matches!(args.command, Command::ChangePassword { .. }) {
        eprintln!("note: this account still uses its temporary password (see `change-password`)");
    }

    let result = run(&client, &args.password, args.command).await;
    // end the server-side session even when the command failed
    let logout = client.logout().await;
    result?;
    logout?;
    Ok(())
}

async fn run(
    client: &AuthenticatedClient<reqwest::Client>,
    password: &str,
    command: Command,
) -> miette::Result<()> {
    match command {
        Command::Whoami => {
            let me = client.me().await?;
            println!("{}", serde_json::to_string_pretty(&me).into_diagnostic()?);
        }
        Command::Get { path } => {
            let response = client.get(&path).await?.into_result()?;
            match serde_json::from_slice::<serde_json::Value>(response.body()) {
                Ok(value) => println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?),
                Err(_) => println!("{}", String::from_utf8_lossy(response.body())),
            }
        }
        Command::ChangePassword { new_password } => {
            let message = client
                .change_password(password, &new_password, &new_password)
                .await?;
            println!("{message}");
        }
    }
    Ok(())
}
