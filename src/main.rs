use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use erp_client::api::ErpModule;
use erp_client::config;
use erp_client::session::{landing_for, Registration, Role};
use erp_client::{ApiError, Credentials, ErpClient, Resource};

/// Command-line client for the construction ERP backend
#[derive(Debug, Parser)]
#[command(name = "erp-client", version, about)]
struct Cli {
    /// Override the configured API base URL
    #[arg(long, global = true, env = "ERP_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ERP_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a new account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "ERP_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "worker")]
        role: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Fetch the signed-in user's profile
    Whoami,
    /// Show the stored session state without contacting the backend
    Status,
    /// Exchange the refresh token for a new access token
    Refresh,
    /// List a collection
    List {
        resource: String,
        #[arg(long)]
        page: Option<u32>,
        /// Query filter as key=value; repeatable
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
    },
    /// Fetch one item
    Get { resource: String, id: String },
    /// Create an item from a JSON body
    Create {
        resource: String,
        #[arg(long)]
        data: String,
    },
    /// Update an item from a JSON body
    Update {
        resource: String,
        id: String,
        #[arg(long)]
        data: String,
        /// Send only the given fields (PATCH)
        #[arg(long)]
        partial: bool,
    },
    /// Delete an item
    Delete { resource: String, id: String },
    /// Show dashboard counts
    Dashboard,
    /// List the known collections by module
    Resources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    let env_file_path = dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "erp_client=debug,warn".into()
            } else {
                "erp_client=info,warn".into()
            }
        }))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();

    match env_file_path {
        Some(path) => info!("Loaded environment variables from {}", path.display()),
        None => debug!("No .env file found. Using existing environment variables."),
    };

    let cli = Cli::parse();

    let mut config = config::load_config().await?;
    if let Some(api_url) = cli.api_url {
        config.api.base_url = api_url;
    }

    let client = ErpClient::from_config(&config).await?;
    run(&client, cli.command).await.map_err(describe)
}

async fn run(client: &ErpClient, command: Command) -> anyhow::Result<()> {
    let session = client.session();

    match command {
        Command::Login { email, password } => {
            let created = session.login(&Credentials::new(email, password)).await?;
            if let Some(user) = &created.user {
                info!(destination = %landing_for(user), "Signed in as {}", user.display_name());
            }
            print_json(&created.user)?;
        }
        Command::Register {
            username,
            email,
            password,
            role,
        } => {
            let registration =
                Registration::new(username, email, password).with_role(Role::from(role));
            print_json(&session.register(&registration).await?)?;
        }
        Command::Logout => {
            session.logout().await?;
            println!("Logged out");
        }
        Command::Whoami => print_json(&session.current_user().await?)?,
        Command::Status => print_json(&session.state().await)?,
        Command::Refresh => {
            session.refresh().await?;
            println!("Access token refreshed");
        }
        Command::List {
            resource,
            page,
            filters,
        } => {
            let resource = client.resource(resource.parse()?);
            let mut params = parse_filters(&filters)?;
            let page = page.map(|p| p.to_string());
            if let Some(page) = &page {
                params.push(("page", page.as_str()));
            }
            let listing = resource.list_where::<Value>(&params).await?;
            print_json(&listing)?;
        }
        Command::Get { resource, id } => {
            let item: Value = client.resource(resource.parse()?).get(&id).await?;
            print_json(&item)?;
        }
        Command::Create { resource, data } => {
            let body = parse_body(&data)?;
            let item: Value = client.resource(resource.parse()?).create(&body).await?;
            print_json(&item)?;
        }
        Command::Update {
            resource,
            id,
            data,
            partial,
        } => {
            let body = parse_body(&data)?;
            let resource = client.resource(resource.parse()?);
            let item: Value = if partial {
                resource.partial_update(&id, &body).await?
            } else {
                resource.update(&id, &body).await?
            };
            print_json(&item)?;
        }
        Command::Delete { resource, id } => {
            let resource: Resource = resource.parse()?;
            client.resource(resource).delete(&id).await?;
            println!("Deleted {} {}", resource, id);
        }
        Command::Dashboard => print_json(&client.dashboard().await)?,
        Command::Resources => print_resources(),
    }

    Ok(())
}

fn parse_filters(filters: &[String]) -> anyhow::Result<Vec<(&str, &str)>> {
    filters
        .iter()
        .map(|filter| {
            filter
                .split_once('=')
                .ok_or_else(|| anyhow!("Filter '{}' must look like key=value", filter))
        })
        .collect()
}

fn parse_body(data: &str) -> anyhow::Result<Value> {
    serde_json::from_str(data).context("--data must be a JSON document")
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_resources() {
    for module in ErpModule::ALL {
        println!("{}:", module);
        for resource in module.resources() {
            println!("  {}", resource);
        }
    }
}

/// Spell out field errors from a rejected submit
fn describe(error: anyhow::Error) -> anyhow::Error {
    let Some(api_error) = error.downcast_ref::<ApiError>() else {
        return error;
    };
    let fields = api_error.field_errors();
    if fields.is_empty() {
        return error;
    }

    let mut details: Vec<String> = fields
        .into_iter()
        .map(|(field, messages)| format!("  {}: {}", field, messages.join(" ")))
        .collect();
    details.sort();
    anyhow!("{}\n{}", api_error.message, details.join("\n"))
}
