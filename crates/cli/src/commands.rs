//! CLI commands

use anyhow::{Result, bail};
use clap::Subcommand;
use notes_client::types::{
    Credentials, Note, NoteInput, ProfileDetailsUpdate, ProfileUpdate, Registration,
    ThemePreference, UserProfile,
};
use notes_client::{
    Gateway, LogoutEvent, LogoutReason, NoteFilter, NotesClient, SessionStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config;

/// Settings shared by every command
pub struct Context {
    pub data_dir: PathBuf,
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "NOTES_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// End the session on the server and locally
    Logout,

    /// Create an account
    Register {
        #[arg(long)]
        email: String,

        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "NOTES_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Show the logged-in user
    Whoami,

    /// Read or update the user profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// List, read and edit notes
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },

    /// List tags in use
    Tags,

    /// Generate default configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Print the profile as JSON
    Show,

    /// Update selected profile fields
    Set {
        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        /// light, dark or system
        #[arg(long)]
        theme: Option<ThemePreference>,
    },
}

#[derive(Subcommand)]
pub enum NotesCommands {
    /// List notes, optionally filtered
    List {
        /// Only notes whose title or content contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Only notes carrying any of these tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Print the notes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one note
    Show { id: u64 },

    /// Create a note
    Create {
        #[arg(long)]
        title: String,

        /// Markdown content
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        /// Read the markdown content from a file
        #[arg(long)]
        file: Option<PathBuf>,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Change a note; unset fields keep their current value
    Edit {
        id: u64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        #[arg(long)]
        file: Option<PathBuf>,

        /// Replace the tags (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Remove every tag
        #[arg(long, conflicts_with = "tags")]
        clear_tags: bool,
    },

    /// Delete a note
    Delete { id: u64 },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default client configuration
    Init {
        /// Output file path (defaults to <data-dir>/config.json)
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    pub async fn execute(self, context: Context) -> Result<()> {
        let client = || connect(&context);

        match self {
            Commands::Login { username, password } => login(&client()?, username, password).await,
            Commands::Logout => logout(&client()?).await,
            Commands::Register {
                email,
                username,
                password,
            } => register(&client()?, email, username, password).await,
            Commands::Whoami => whoami(&client()?).await,
            Commands::Profile { command } => command.execute(&client()?).await,
            Commands::Notes { command } => command.execute(&client()?).await,
            Commands::Tags => list_tags(&client()?).await,
            Commands::Config { command } => command.execute(&context.data_dir),
        }
    }
}

impl ProfileCommands {
    pub async fn execute(self, client: &NotesClient) -> Result<()> {
        match self {
            ProfileCommands::Show => {
                let profile = client.profile.get().await?;
                println!("{}", serde_json::to_string_pretty(&profile)?);
                Ok(())
            }
            ProfileCommands::Set {
                email,
                first_name,
                last_name,
                theme,
            } => {
                let details = ProfileDetailsUpdate {
                    first_name,
                    last_name,
                    mode_preference: theme,
                    is_profile_setup_completed: None,
                };
                let update = ProfileUpdate {
                    email,
                    profile: (details != ProfileDetailsUpdate::default()).then_some(details),
                };
                if update.is_empty() {
                    bail!("Nothing to update; pass at least one field");
                }

                let profile = client.profile.update(&update).await?;
                println!("{}", serde_json::to_string_pretty(&profile)?);
                Ok(())
            }
        }
    }
}

impl NotesCommands {
    pub async fn execute(self, client: &NotesClient) -> Result<()> {
        match self {
            NotesCommands::List { search, tags, json } => {
                let filter = NoteFilter::new()
                    .query(search.unwrap_or_default())
                    .tags(tags);
                let notes = client.notes.search(&filter).await?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&notes)?);
                } else if notes.is_empty() {
                    println!("No notes found");
                } else {
                    for note in &notes {
                        println!("{}", summary_line(note));
                    }
                }
                Ok(())
            }
            NotesCommands::Show { id } => {
                let note = client.notes.get(id).await?;
                print_note(&note);
                Ok(())
            }
            NotesCommands::Create {
                title,
                content,
                file,
                tags,
            } => {
                let input = NoteInput {
                    title,
                    content: read_content(content, file)?.unwrap_or_default(),
                    tags_input: Some(tags),
                };
                let note = client.notes.create(&input).await?;
                println!("Created note {}", note.id);
                Ok(())
            }
            NotesCommands::Edit {
                id,
                title,
                content,
                file,
                tags,
                clear_tags,
            } => {
                let current = client.notes.get(id).await?;
                let tags_input = if clear_tags {
                    Some(Vec::new())
                } else if tags.is_empty() {
                    None
                } else {
                    Some(tags)
                };
                let input = NoteInput {
                    title: title.unwrap_or(current.title),
                    content: read_content(content, file)?.unwrap_or(current.content),
                    tags_input,
                };
                let note = client.notes.update(id, &input).await?;
                println!("Updated note {}", note.id);
                Ok(())
            }
            NotesCommands::Delete { id } => {
                client.notes.delete(id).await?;
                println!("Deleted note {id}");
                Ok(())
            }
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, data_dir: &std::path::Path) -> Result<()> {
        match self {
            ConfigCommands::Init { output, force } => {
                let config_path = output.unwrap_or_else(|| data_dir.join(config::CONFIG_FILE));
                if config_path.exists() && !force {
                    bail!(
                        "{} already exists; pass --force to overwrite",
                        config_path.display()
                    );
                }

                // Create parent directory if it doesn't exist
                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                config::generate_default_config(&config_path)?;
                println!("Generated configuration at: {}", config_path.display());
                Ok(())
            }
        }
    }
}

/// Build a client whose session persists in the data directory; only
/// commands that talk to the API open it
fn connect(context: &Context) -> Result<NotesClient> {
    let config = config::load_client_config(
        context.config_path.as_deref(),
        &context.data_dir,
        context.base_url.as_deref(),
    )?;
    info!(base_url = %config.base_url, "Using notes API");

    let session = SessionStore::open(context.data_dir.join(config::SESSION_FILE))?
        .scoped_to(&config.base_url);

    let gateway = Gateway::builder(config)
        .session(Arc::new(session))
        .on_logout(report_logout)
        .build()?;

    Ok(NotesClient::new(gateway))
}

fn report_logout(event: &LogoutEvent) {
    // A rejected login or identity probe is reported by the command itself.
    if event.reason != LogoutReason::PublicEndpointRejected {
        eprintln!("Session expired; run `notes login`");
    }
}

async fn login(client: &NotesClient, username: String, password: String) -> Result<()> {
    let credentials = Credentials { username, password };
    let response = client.auth.login(&credentials).await?;
    println!("{}", response.message);
    Ok(())
}

async fn logout(client: &NotesClient) -> Result<()> {
    if !client.gateway().session().has_session() {
        println!("Not logged in");
        return Ok(());
    }

    let response = client.auth.logout().await?;
    println!("{}", response.message);
    Ok(())
}

async fn register(
    client: &NotesClient,
    email: String,
    username: String,
    password: String,
) -> Result<()> {
    let registration = Registration {
        email,
        username,
        password2: password.clone(),
        password,
    };
    let user = client.auth.register(&registration).await?;
    println!("Registered {} <{}>", user.username, user.email);
    Ok(())
}

async fn whoami(client: &NotesClient) -> Result<()> {
    match client.auth.current_user().await? {
        Some(user) => println!("{}", user_line(&user)),
        None => println!("Not logged in"),
    }
    Ok(())
}

async fn list_tags(client: &NotesClient) -> Result<()> {
    let tags = client.notes.tags().await?;
    if tags.is_empty() {
        println!("No tags yet");
    }
    for tag in tags {
        println!("{}", tag.name);
    }
    Ok(())
}

fn read_content(content: Option<String>, file: Option<PathBuf>) -> Result<Option<String>> {
    match (content, file) {
        (Some(content), _) => Ok(Some(content)),
        (None, Some(path)) => Ok(Some(std::fs::read_to_string(path)?)),
        (None, None) => Ok(None),
    }
}

fn summary_line(note: &Note) -> String {
    if note.tags_display.is_empty() {
        format!("{:>5}  {}", note.id, note.title)
    } else {
        format!(
            "{:>5}  {}  [{}]",
            note.id,
            note.title,
            note.tags_display.join(", ")
        )
    }
}

fn print_note(note: &Note) {
    println!("# {}", note.title);
    if !note.tags_display.is_empty() {
        println!("tags: {}", note.tags_display.join(", "));
    }
    println!("updated: {}", note.updated_at);
    println!();
    println!("{}", note.content);
}

fn user_line(user: &UserProfile) -> String {
    let name = user
        .profile
        .as_ref()
        .map(|p| {
            [p.first_name.as_deref(), p.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|name| !name.is_empty());

    match name {
        Some(name) => format!("{} ({name}) <{}>", user.username, user.email),
        None => format!("{} <{}>", user.username, user.email),
    }
}
