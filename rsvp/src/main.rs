//! `attend`: command-line RSVP client.
//!
//! Reads the backend location from the environment (see
//! [`attend_rsvp::config`]), resolves the session, and lists, shows or joins
//! events on behalf of the signed-in user.
//!
//! ```bash
//! export ATTEND_BACKEND_URL=https://project.example.co
//! export ATTEND_BACKEND_KEY=anon-key
//! attend --email ada@example.com --password hunter22 join 42
//! ```

use anyhow::{Context, Result, bail};
use attend_rsvp::environment::EntryEnvironment;
use attend_rsvp::{
    AttendanceGate, BackendConfig, EntryFlow, Event, EventFeed, EventId, EventRsvpController,
    Notice, RestBackend, Route, SessionStore,
};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "attend")]
#[command(version, about = "Event RSVP client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Account email
    #[arg(long, env = "ATTEND_EMAIL")]
    email: Option<String>,

    /// Account password
    #[arg(long, env = "ATTEND_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every event, soonest first
    Events,
    /// Show one event and whether you are going
    Show {
        /// Event id
        id: String,
    },
    /// Mark yourself as going to an event
    Join {
        /// Event id
        id: String,
    },
    /// Create an account with the given email and password
    SignUp,
    /// Sign in, then revoke that session on the backend
    SignOut,
}

impl Commands {
    const fn route(&self) -> Route {
        match self {
            Self::Events | Self::SignUp => Route::Entry,
            Self::Show { .. } | Self::Join { .. } | Self::SignOut => Route::Gated,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attend_rsvp=info,attend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = BackendConfig::from_env().context("Failed to load backend configuration")?;
    info!(?config, "Configuration loaded");

    let backend = RestBackend::new(&config).context("Failed to build HTTP client")?;
    let session = SessionStore::new(backend.clone());
    session.start().await?;
    session.wait_until_ready().await;

    let entry = EntryFlow::new(
        EntryEnvironment::new(backend.clone()).with_notice_ttl(config.notice_ttl),
    );

    if matches!(cli.command, Commands::SignUp) {
        let (email, password) = credentials(&cli)?;
        entry.set_email(email).await?;
        entry.set_password(password).await?;
        match entry.sign_up().await?.notice {
            Some(Notice::AccountCreated) => println!("Account created, you are signed in."),
            Some(Notice::VerificationPending) => {
                println!("Account created. Check your inbox to confirm your email address.");
            },
            Some(Notice::Failed(error)) => bail!(error),
            Some(Notice::SignedIn) | None => {},
        }
        session.shutdown().await?;
        return Ok(());
    }

    if cli.command.route() == Route::Gated && !session.is_authenticated().await {
        let (email, password) = credentials(&cli)?;
        entry.set_email(email).await?;
        entry.set_password(password).await?;
        if let Some(Notice::Failed(error)) = entry.sign_in().await?.notice {
            bail!(error);
        }
        tokio::time::timeout(
            config.request_timeout,
            session.wait_until(attend_rsvp::SessionState::is_authenticated),
        )
        .await
        .context("Signed in, but the session never arrived")?;
    }

    let gate = AttendanceGate::new(session.clone());
    if cli.command.route() == Route::Gated && !gate.decision(Route::Gated).await.allows_gated() {
        bail!("Sign in to continue");
    }

    match &cli.command {
        Commands::Events => {
            let feed = EventFeed::new(backend.clone());
            for event in feed.refresh().await? {
                print_summary(&event);
            }
        },
        Commands::Show { id } => {
            let view = EventRsvpController::new(session.clone(), backend.clone(), backend.clone());
            let loaded = view.load(EventId::new(id.as_str())).await?;
            print_event(&loaded.event);
            println!("RSVP:      {:?}", view.view().await.control());
            view.shutdown().await?;
        },
        Commands::Join { id } => {
            let view = EventRsvpController::new(session.clone(), backend.clone(), backend.clone());
            let loaded = view.load(EventId::new(id.as_str())).await?;
            view.join().await?;
            println!("You are going to {}.", loaded.event.title);
            view.shutdown().await?;
        },
        Commands::SignOut => {
            session.sign_out().await?;
            println!("Signed out.");
        },
        Commands::SignUp => {},
    }

    session.shutdown().await?;
    Ok(())
}

fn credentials(cli: &Cli) -> Result<(String, String)> {
    match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => Ok((email.clone(), password.clone())),
        _ => bail!("--email and --password (or ATTEND_EMAIL / ATTEND_PASSWORD) are required"),
    }
}

fn print_summary(event: &Event) {
    println!(
        "{:>8}  {}  {}",
        event.id,
        event.starts_at.format("%Y-%m-%d %H:%M"),
        event.title
    );
}

fn print_event(event: &Event) {
    println!("{}", event.title);
    println!("When:      {}", event.starts_at.format("%A %e %B %Y, %H:%M"));
    if !event.location.is_empty() {
        println!("Where:     {}", event.location);
    }
    if let Some(count) = event.attendee_count {
        println!("Attending: {count}");
    }
    if !event.description.is_empty() {
        println!();
        println!("{}", event.description);
    }
}
