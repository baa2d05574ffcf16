//! Aisle - Main Entry Point
//!
//! Command line front end over the authenticated API client. Tokens are
//! kept in a JSON file between invocations, so a refresh performed by one
//! command is visible to the next.

use std::path::PathBuf;
use std::sync::Arc;

use aisle_application::{ApiClient, Registry, TokenStorage, TokenStore};
use aisle_domain::{GuestId, GuestRsvp, NewGalleryItem, NewWish};
use aisle_infrastructure::{ApiConfig, FileTokenStorage, ReqwestTransport};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Client for the wedding-event API
#[derive(Parser, Debug)]
#[command(name = "aisle", version)]
#[command(about = "Talk to the wedding registry API with automatic token refresh")]
struct Cli {
    /// API base URL
    #[arg(long, env = "AISLE_API_URL")]
    api_url: Option<String>,

    /// Token file path
    #[arg(long, env = "AISLE_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Keep tokens in memory only
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the issued tokens
    Login {
        /// Account name
        #[arg(short, long)]
        username: String,

        /// Account password
        #[arg(short, long, env = "AISLE_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the stored tokens
    Logout,

    /// Show the stored session state
    Status,

    /// List registry gifts
    Gifts,

    /// Submit an RSVP, optionally reserving a gift for the new guest
    Rsvp {
        /// Guest name
        #[arg(long)]
        name: String,

        /// Guest email
        #[arg(long)]
        email: String,

        /// Guest phone number
        #[arg(long)]
        phone: Option<String>,

        /// Meal preference
        #[arg(long)]
        meal: Option<String>,

        /// Decline the invitation
        #[arg(long)]
        decline: bool,

        /// Gift to reserve once the RSVP is recorded
        #[arg(long)]
        gift: Option<Uuid>,
    },

    /// Reserve a gift for an existing guest
    Reserve {
        /// Gift ID
        #[arg(long)]
        gift: Uuid,

        /// Guest ID
        #[arg(long)]
        guest: String,
    },

    /// Leave a wish for the couple
    Wish {
        /// Guest ID
        #[arg(long)]
        guest: String,

        /// Message text
        #[arg(short, long)]
        message: String,
    },

    /// List gallery items
    Gallery,

    /// Add a gallery item
    PostPhoto {
        /// Image URL
        #[arg(long)]
        image: String,

        /// Caption
        #[arg(long)]
        caption: Option<String>,

        /// Uploading guest
        #[arg(long)]
        guest: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    tracing::debug!(base_url = %config.base_url, token_file = ?config.token_file, "Configuration resolved");

    let store = open_store(&config).await;
    let transport =
        ReqwestTransport::with_timeout(config.request_timeout).context("building HTTP client")?;
    let client = Arc::new(ApiClient::new(
        Arc::new(transport),
        store,
        config.client_options(),
    ));
    let registry = Registry::new(client.clone());

    match cli.command {
        Commands::Login { username, password } => {
            client
                .login(&username, &password)
                .await
                .context("login failed")?;
            println!("{}", client.status().display_message());
        }
        Commands::Logout => {
            client.logout().await;
            println!("{}", client.status().display_message());
        }
        Commands::Status => {
            println!("{}", client.status().display_message());
        }
        Commands::Gifts => print_json(&registry.list_gifts().await?)?,
        Commands::Rsvp {
            name,
            email,
            phone,
            meal,
            decline,
            gift,
        } => {
            let rsvp = GuestRsvp {
                name,
                email,
                phone,
                rsvp_status: !decline,
                meal_preference: meal,
            };
            match gift {
                Some(gift_id) => {
                    let (guest_id, gift) = registry.rsvp_and_reserve(&rsvp, gift_id).await?;
                    println!("guest {guest_id}");
                    print_json(&gift)?;
                }
                None => println!("guest {}", registry.rsvp(&rsvp).await?),
            }
        }
        Commands::Reserve { gift, guest } => {
            let guest_id = GuestId::new(guest)?;
            print_json(&registry.reserve_gift(gift, &guest_id).await?)?;
        }
        Commands::Wish { guest, message } => {
            let wish = NewWish {
                guest_id: GuestId::new(guest)?,
                message,
            };
            print_json(&registry.leave_wish(&wish).await?)?;
        }
        Commands::Gallery => print_json(&registry.list_gallery().await?)?,
        Commands::PostPhoto {
            image,
            caption,
            guest,
        } => {
            let item = NewGalleryItem {
                guest_id: guest.map(GuestId::new).transpose()?,
                image,
                caption,
            };
            print_json(&registry.post_gallery_item(&item).await?)?;
        }
    }

    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<ApiConfig> {
    let mut config = ApiConfig::from_env().context("invalid configuration")?;
    if let Some(url) = &cli.api_url {
        config.set_base_url(url).context("invalid --api-url")?;
    }
    if let Some(path) = &cli.token_file {
        config.token_file = Some(path.clone());
    }
    if cli.ephemeral {
        config.token_file = None;
    }
    Ok(config)
}

async fn open_store(config: &ApiConfig) -> TokenStore {
    match &config.token_file {
        Some(path) => {
            let storage: Arc<dyn TokenStorage> = Arc::new(FileTokenStorage::new(path));
            TokenStore::load(storage).await
        }
        None => {
            tracing::warn!("No token file configured; the session ends with this process");
            TokenStore::in_memory()
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
