//! Playbill CLI - find the event behind the poster

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use playbill_core::Error as CoreError;
use playbill_core::api::{ApiClient, EventDraft, EventPatch, EventRecord, ExternalCandidate};
use playbill_core::auth::{KeyringVault, TokenStore};
use playbill_core::config::{Config, FavoritePolicy};
use playbill_core::lookup::{LookupOutcome, PendingUpload, PhotoLookupFlow};
use playbill_core::session::{SessionManager, SessionState};
use tracing::warn;

#[derive(Parser)]
#[command(name = "playbill")]
#[command(author, version, about = "Find the event behind the poster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session credential
    Login {
        /// Account email
        email: String,
        /// Password (falls back to PLAYBILL_PASSWORD)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account and log straight into it
    Register {
        /// Account email
        email: String,
        /// Password (falls back to PLAYBILL_PASSWORD)
        #[arg(short, long)]
        password: Option<String>,
        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// End the session and remove the stored credential
    Logout,

    /// Show who is currently logged in
    Whoami,

    /// Browse and manage events
    Events {
        #[command(subcommand)]
        action: EventAction,
    },

    /// Look up the event behind a poster photo
    Lookup {
        /// Path to the poster photo
        photo: PathBuf,
        /// Add externally-found events to the catalog
        #[arg(long)]
        save: bool,
    },

    /// Find catalog events with posters similar to a photo
    Similar {
        /// Path to the photo
        photo: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum EventAction {
    /// List events
    List {
        /// Only show favorites
        #[arg(short, long)]
        favorites: bool,
    },
    /// Show event details
    Show { id: i64 },
    /// Create a new event
    Create {
        /// Event title
        #[arg(short, long)]
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Date, e.g. 2025-07-19T20:00
        #[arg(long)]
        date: Option<String>,
        #[arg(short, long)]
        location: Option<String>,
        #[arg(long)]
        price: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        /// Poster image URL
        #[arg(long)]
        image_url: Option<String>,
    },
    /// Update an event
    Update {
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        /// Date, e.g. 2025-07-19T20:00
        #[arg(long)]
        date: Option<String>,
        #[arg(short, long)]
        location: Option<String>,
        /// Poster image URL
        #[arg(long)]
        image_url: Option<String>,
    },
    /// Delete an event
    Delete {
        id: i64,
        #[arg(long)]
        force: bool,
    },
    /// Search events by text
    Search { query: String },
    /// Toggle an event's favorite flag
    Favorite { id: i64 },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

/// Everything a server-facing command needs, wired once
struct App {
    config: Config,
    api: ApiClient,
    session: SessionManager,
    tokens: Arc<TokenStore>,
}

fn build_app() -> anyhow::Result<App> {
    let config = Config::load()?;
    let tokens = Arc::new(TokenStore::new(Arc::new(KeyringVault::new())));
    let api = ApiClient::from_config(&config, tokens.clone())?;
    let session = SessionManager::new(Arc::new(api.clone()), tokens.clone());

    Ok(App {
        config,
        api,
        session,
        tokens,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is read before anything else looks at the environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("playbill=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Login { email, password } => {
            let app = build_app()?;
            cmd_login(&app, &email, password, cli.format, cli.quiet).await
        }

        Commands::Register {
            email,
            password,
            name,
        } => {
            let app = build_app()?;
            cmd_register(&app, &email, password, name.as_deref(), cli.format, cli.quiet).await
        }

        Commands::Logout => {
            let app = build_app()?;
            cmd_logout(&app, cli.quiet).await
        }

        Commands::Whoami => {
            let app = build_app()?;
            cmd_whoami(&app, cli.format, cli.quiet).await
        }

        Commands::Events { action } => {
            let app = build_app()?;
            cmd_events(&app, action, cli.format, cli.quiet).await
        }

        Commands::Lookup { photo, save } => {
            let app = build_app()?;
            cmd_lookup(&app, &photo, save, cli.format, cli.quiet).await
        }

        Commands::Similar { photo } => {
            let app = build_app()?;
            cmd_similar(&app, &photo, cli.format, cli.quiet).await
        }

        Commands::Config { action } => cmd_config(action, cli.quiet),

        Commands::Doctor => {
            let app = build_app()?;
            cmd_doctor(&app, cli.quiet).await
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_login(
    app: &App,
    email: &str,
    password: Option<String>,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let password = resolve_password(password)?;
    let user = app.session.login(email, &password).await.map_err(report)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&user)?),
        OutputFormat::Text => {
            if !quiet {
                println!("Logged in as {} ({})", user.display_name(), user.email);
            }
        }
    }
    Ok(())
}

async fn cmd_register(
    app: &App,
    email: &str,
    password: Option<String>,
    name: Option<&str>,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let password = resolve_password(password)?;
    let user = app
        .session
        .register(email, &password, name)
        .await
        .map_err(report)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&user)?),
        OutputFormat::Text => {
            if !quiet {
                println!("Account created.");
                println!("Logged in as {} ({})", user.display_name(), user.email);
            }
        }
    }
    Ok(())
}

async fn cmd_logout(app: &App, quiet: bool) -> anyhow::Result<()> {
    app.session.logout().await;
    if !quiet {
        println!("Logged out.");
    }
    Ok(())
}

async fn cmd_whoami(app: &App, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    match app.session.bootstrap().await {
        SessionState::Authenticated(user) => {
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&user)?),
                OutputFormat::Text => {
                    println!("{} ({})", user.display_name(), user.email);
                    if !quiet {
                        println!("  User ID: {}", user.id);
                        if let Some(created) = user.created_at {
                            println!("  Member since: {}", created.format("%Y-%m-%d"));
                        }
                    }
                }
            }
            Ok(())
        }
        _ => Err(anyhow::anyhow!(
            "Not logged in. Run `playbill login <email>` to start a session."
        )),
    }
}

async fn cmd_events(
    app: &App,
    action: EventAction,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    match action {
        EventAction::List { favorites } => {
            let mut events = check(&app.session, app.api.list_events().await).await?;
            if favorites {
                // The saved view is a filter over the loaded list
                events.retain(|event| event.is_favorite);
            }

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&events)?),
                OutputFormat::Text => {
                    if events.is_empty() {
                        if !quiet {
                            if favorites {
                                println!("No favorite events.");
                            } else {
                                println!("No events found.");
                                println!("\nAdd one with: playbill events create --title <title>");
                            }
                        }
                    } else {
                        for event in &events {
                            print_event_row(event);
                        }
                    }
                }
            }
        }
        EventAction::Show { id } => {
            let event = check(&app.session, app.api.event(id).await).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&event)?),
                OutputFormat::Text => print_event(&event),
            }
        }
        EventAction::Create {
            title,
            description,
            date,
            location,
            price,
            category,
            image_url,
        } => {
            let mut draft = EventDraft::new(title);
            if let Some(description) = description {
                draft = draft.with_description(description);
            }
            if let Some(date) = date {
                draft = draft.with_date(parse_event_date(&date)?);
            }
            if let Some(location) = location {
                draft = draft.with_location(location);
            }
            if let Some(price) = price {
                draft = draft.with_price(price);
            }
            if let Some(category) = category {
                draft = draft.with_category(category);
            }
            if let Some(image_url) = image_url {
                draft = draft.with_image_url(image_url);
            }

            let event = check(&app.session, app.api.create_event(&draft).await).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&event)?),
                OutputFormat::Text => {
                    if !quiet {
                        println!("Event created:");
                    }
                    print_event(&event);
                }
            }
        }
        EventAction::Update {
            id,
            title,
            description,
            date,
            location,
            image_url,
        } => {
            let mut patch = EventPatch::new();
            if let Some(title) = title {
                patch = patch.with_title(title);
            }
            if let Some(description) = description {
                patch = patch.with_description(description);
            }
            if let Some(date) = date {
                patch = patch.with_date(parse_event_date(&date)?);
            }
            if let Some(location) = location {
                patch = patch.with_location(location);
            }
            if let Some(image_url) = image_url {
                patch = patch.with_image_url(image_url);
            }
            if patch.is_empty() {
                anyhow::bail!(
                    "Nothing to update. Pass at least one of --title, --description, --date, \
                     --location, --image-url."
                );
            }

            let event = check(&app.session, app.api.update_event(id, &patch).await).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&event)?),
                OutputFormat::Text => {
                    if !quiet {
                        println!("Event updated:");
                    }
                    print_event(&event);
                }
            }
        }
        EventAction::Delete { id, force } => {
            if !force {
                if !quiet {
                    println!("This will permanently delete event {}.", id);
                    println!("Use --force to confirm deletion.");
                }
                return Ok(());
            }
            check(&app.session, app.api.delete_event(id).await).await?;
            if !quiet {
                println!("Event {} deleted.", id);
            }
        }
        EventAction::Search { query } => {
            let events = check(&app.session, app.api.search_events(&query).await).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&events)?),
                OutputFormat::Text => {
                    if events.is_empty() {
                        if !quiet {
                            println!("No events match '{}'.", query);
                        }
                    } else {
                        for event in &events {
                            print_event_row(event);
                        }
                    }
                }
            }
        }
        EventAction::Favorite { id } => {
            let event = check(&app.session, app.api.event(id).await).await?;
            let policy = app.config.events.favorite_sync;
            let updated = check(&app.session, app.api.toggle_favorite(&event, policy).await).await?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&updated)?),
                OutputFormat::Text => {
                    if updated.is_favorite {
                        println!("Added '{}' to favorites.", updated.title);
                    } else {
                        println!("Removed '{}' from favorites.", updated.title);
                    }
                    if policy == FavoritePolicy::Local && !quiet {
                        println!("(favorite_sync is 'local'; the server was not updated)");
                    }
                }
            }
        }
    }
    Ok(())
}

async fn cmd_lookup(
    app: &App,
    photo: &Path,
    save: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let flow = PhotoLookupFlow::new(Arc::new(app.api.clone()));
    flow.select_file(photo).await.map_err(report)?;

    if !quiet {
        println!("Looking up poster '{}'...", photo.display());
    }
    let outcome = check(&app.session, flow.submit().await).await?;

    match outcome {
        LookupOutcome::Matched { event } => {
            print_lookup_result("matched", &event, format, quiet, "Matched an existing event:")
        }
        LookupOutcome::Created { event } => print_lookup_result(
            "created",
            &event,
            format,
            quiet,
            "Created a new event from the poster:",
        ),
        LookupOutcome::FoundExternal { candidate } => {
            if save {
                let draft = candidate.into_draft();
                let event = check(&app.session, app.api.create_event(&draft).await).await?;
                print_lookup_result(
                    "saved_external",
                    &event,
                    format,
                    quiet,
                    "Added the external event to the catalog:",
                )
            } else {
                match format {
                    OutputFormat::Json => {
                        let value = serde_json::json!({
                            "action": "found_external",
                            "external_event": candidate,
                        });
                        println!("{}", serde_json::to_string_pretty(&value)?);
                    }
                    OutputFormat::Text => {
                        println!("Found a matching event on an external site:");
                        print_candidate(&candidate);
                        if !quiet {
                            println!();
                            println!("Run again with --save to add it to the catalog.");
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

async fn cmd_similar(
    app: &App,
    photo: &Path,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let upload = PendingUpload::from_path(photo).await.map_err(report)?;

    if !quiet {
        println!("Searching for posters similar to '{}'...", photo.display());
    }
    let matches = check(&app.session, app.api.similar_by_photo(&upload).await).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&matches)?),
        OutputFormat::Text => {
            if matches.is_empty() {
                if !quiet {
                    println!("No similar posters found.");
                }
            } else {
                for hit in &matches {
                    println!("  {} - {} (distance {})", hit.id, hit.title, hit.distance);
                }
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(app: &App, quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("Playbill Health Check");
        println!("=====================");
        println!();
    }

    let mut all_ok = true;

    // Check configuration
    match Config::load() {
        Ok(config) => {
            if !quiet {
                println!("[OK] Configuration: Valid");
                println!("     API base: {}", config.api.resolved_base_url());
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Configuration: Error - {}", e);
            }
        }
    }

    // Check config file location
    if !quiet {
        match Config::config_path() {
            Ok(path) => {
                if path.exists() {
                    println!("[OK] Config file: {}", path.display());
                } else {
                    println!("[--] Config file: {} (using defaults)", path.display());
                }
            }
            Err(e) => {
                println!("[!!] Config file: Error - {}", e);
            }
        }
    }

    // Check the API server
    match app.api.health().await {
        Ok(health) => {
            if !quiet {
                println!("[OK] API server: {}", health.status);
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] API server: {}", e);
                println!("     Is the server running at {}?", app.api.base_url());
            }
        }
    }

    // Check the stored credential without touching it
    match app.tokens.load_persisted().await {
        Ok(Some(_)) => {
            if !quiet {
                println!("[OK] Credential: present in keyring");
            }
            match app.api.me().await {
                Ok(user) => {
                    if !quiet {
                        println!("[OK] Session: valid ({})", user.email);
                    }
                }
                Err(e) if e.is_unauthorized() => {
                    all_ok = false;
                    warn!("stored credential rejected by the server");
                    if !quiet {
                        println!("[!!] Session: stored credential was rejected");
                        println!("     Run `playbill login` to start a new session.");
                    }
                }
                Err(e) => {
                    all_ok = false;
                    if !quiet {
                        println!("[!!] Session: check failed - {}", e);
                    }
                }
            }
        }
        Ok(None) => {
            if !quiet {
                println!("[--] Credential: none stored");
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Credential store: {}", e);
            }
        }
    }

    // Summary
    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Funnel a failure through the session's 401 policy, then render it
///
/// When the server rejects the credential mid-command, the session is
/// torn down (clearing the stored credential) before the error is
/// reported, so the next invocation starts clean.
async fn check<T>(session: &SessionManager, result: playbill_core::Result<T>) -> anyhow::Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(error) => {
            session.recover(&error).await;
            Err(report(error))
        }
    }
}

/// Render a core error, attaching the follow-up command when one exists
fn report(error: CoreError) -> anyhow::Error {
    match error.suggestion() {
        Some(hint) if !error.to_string().contains(&hint) => {
            anyhow::anyhow!("{}\nTry: {}", error, hint)
        }
        _ => anyhow::Error::new(error),
    }
}

fn resolve_password(flag: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = flag {
        return Ok(password);
    }
    if let Ok(password) = std::env::var("PLAYBILL_PASSWORD") {
        if !password.is_empty() {
            return Ok(password);
        }
    }
    anyhow::bail!("No password given. Pass --password or set PLAYBILL_PASSWORD.")
}

/// Parse the date formats accepted on the command line
fn parse_event_date(value: &str) -> anyhow::Result<chrono::NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];
    for format in FORMATS {
        if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }
    // A bare date means midnight
    if let Ok(date) = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(parsed) = date.and_hms_opt(0, 0, 0) {
            return Ok(parsed);
        }
    }
    anyhow::bail!(
        "Invalid date '{}'. Use YYYY-MM-DD or YYYY-MM-DDTHH:MM.",
        value
    )
}

fn print_lookup_result(
    action: &str,
    event: &EventRecord,
    format: OutputFormat,
    quiet: bool,
    heading: &str,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "action": action,
                "event": event,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            if !quiet {
                println!("{}", heading);
            }
            print_event(event);
        }
    }
    Ok(())
}

fn print_event_row(event: &EventRecord) {
    let date = event
        .date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "date tbd".to_string());
    let favorite = if event.is_favorite { " *" } else { "" };
    println!("  {} - {} ({}){}", event.id, event.title, date, favorite);
}

fn print_event(event: &EventRecord) {
    println!("Event: {}", event.title);
    println!("  ID: {}", event.id);
    if let Some(date) = event.date {
        println!("  Date: {}", date.format("%Y-%m-%d %H:%M"));
    }
    if let Some(location) = &event.location {
        println!("  Location: {}", location);
    }
    if let Some(price) = &event.price {
        println!("  Price: {}", price);
    }
    if let Some(category) = &event.category {
        println!("  Category: {}", category);
    }
    if let Some(description) = &event.description {
        println!("  Description: {}", description);
    }
    if event.is_favorite {
        println!("  Favorite: yes");
    }
    if let Some(url) = &event.image_url {
        println!("  Poster: {}", url);
    }
    if let Some(source) = &event.source_url {
        println!("  Source: {}", source);
    }
    if event.parsed_by_ai == Some(true) {
        println!("  Parsed from poster text");
    }
    if let Some(created) = event.created_at {
        println!("  Created: {}", created.format("%Y-%m-%d %H:%M:%S"));
    }
}

fn print_candidate(candidate: &ExternalCandidate) {
    println!("  Title: {}", candidate.title);
    if let Some(date) = candidate.date {
        println!("  Date: {}", date.format("%Y-%m-%d %H:%M"));
    }
    if let Some(location) = &candidate.location {
        println!("  Location: {}", location);
    }
    if let Some(price) = &candidate.price {
        println!("  Price: {}", price);
    }
    if let Some(category) = &candidate.category {
        println!("  Category: {}", category);
    }
    if let Some(description) = &candidate.description {
        println!("  Description: {}", description);
    }
    if let Some(source) = &candidate.source_url {
        println!("  Source: {}", source);
    }
}
