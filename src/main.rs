use std::{io::Write, path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Parser, Subcommand};
use mindful_core::{
    export::{self, ExportFormat, ExportKind},
    models::{CreateUserInput, Role},
};
use uuid::Uuid;

use mindful::{
    api::{self, HealthStatus},
    config::{self, DatabaseArgs, ServeArgs, DEFAULT_HOST, DEFAULT_PORT},
    telemetry,
};

#[derive(Parser)]
#[command(name = "mindful")]
#[command(about = "Research backend for structured, multi-week mindfulness programs")]
#[command(version)]
struct Cli {
    /// Log filter directives, e.g. `mindful=info` (overrides RUST_LOG)
    #[arg(long, env = "MINDFUL_LOG", global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve(ServeArgs),
    /// Create or update the database schema and exit
    Migrate(DatabaseArgs),
    /// Create an account directly in the database, admins included
    CreateUser {
        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,

        /// admin, researcher or participant
        #[arg(long, value_parser = parse_role)]
        role: Role,

        #[command(flatten)]
        db: DatabaseArgs,
    },
    /// Check whether a server is running
    Status {
        #[arg(long, env = "MINDFUL_HOST", default_value = DEFAULT_HOST)]
        host: String,

        #[arg(short, long, env = "MINDFUL_PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Write statistics, diary entries or questionnaire responses of a program
    Export {
        /// Program to export
        program: Uuid,

        /// User the export runs as; must own the program or be an admin
        #[arg(long = "as", value_name = "USER_ID")]
        user: Uuid,

        /// stats, diary or responses
        #[arg(long, default_value = "stats")]
        kind: ExportKind,

        /// csv or json
        #[arg(long, default_value = "csv")]
        format: ExportFormat,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        db: DatabaseArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log.as_deref());

    match cli.command {
        Commands::Serve(args) => serve(args).await?,
        Commands::Migrate(args) => {
            args.open()?;
            tracing::info!(database = %args.describe(), "schema up to date");
        }
        Commands::CreateUser {
            username,
            email,
            role,
            db,
        } => {
            let account = db.open()?.create_user(CreateUserInput {
                username,
                email,
                role,
            })?;
            tracing::info!(user_id = %account.user.id, role = role.as_str(), "account created");
            println!("{}", account.user.id);
        }
        Commands::Status { host, port } => status(&config::server_url(&host, port)).await?,
        Commands::Export {
            program,
            user,
            kind,
            format,
            output,
            db,
        } => {
            let database = db.open()?;
            let principal = database.principal(user)?;
            let body = export::render(&database, &principal, program, kind, format)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, body)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    tracing::info!(path = %path.display(), "export written");
                }
                None => std::io::stdout().write_all(body.as_bytes())?,
            }
        }
    }

    Ok(())
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::from_str(&s.to_ascii_lowercase()).ok_or_else(|| format!("unknown role {s:?}"))
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let db = args.db.open()?;
    tracing::info!(database = %args.db.describe(), "database ready");

    let app = api::create_router(db);

    let addr = args.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Mindful server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down");
            }
        })
        .await?;

    Ok(())
}

async fn status(base_url: &str) -> anyhow::Result<()> {
    println!("Checking Mindful server at {base_url}...");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()?;

    match client.get(format!("{base_url}/health")).send().await {
        Ok(response) if response.status().is_success() => {
            let health: HealthStatus = response.json().await?;
            println!("Server is {} (version {})", health.status, health.version);
            Ok(())
        }
        Ok(response) => anyhow::bail!("server answered with {}", response.status()),
        Err(e) => anyhow::bail!("server is not reachable: {e}"),
    }
}
