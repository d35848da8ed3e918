use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use flashback::{
    AppState, Config,
    albums::{Album, AlbumStore, TomlAlbumStore, slugify},
    client::ApiClient,
    gallery::{GalleryMode, GallerySession},
    router,
    session::create_signed_cookie,
    startup_checks,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web server (default if no command specified)
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Automatically quit after specified number of seconds (useful for testing)
        #[arg(long)]
        quit_after: Option<u64>,
    },

    /// Manage albums
    #[command(subcommand)]
    Album(AlbumCommands),

    /// Upload photos to an album on a running server
    Upload {
        /// Album identifier
        album_id: String,
        /// Files to upload in one batch
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Find the photos of an album that show the face in a selfie
    Find {
        /// Album identifier
        album_id: String,
        /// Probe image
        selfie: PathBuf,
        /// Download the matched photos into this directory
        #[arg(short, long)]
        download: Option<PathBuf>,
        #[command(flatten)]
        remote: RemoteArgs,
    },

    /// Ask a running server to re-submit photos that failed face indexing
    Reindex {
        /// Album identifier
        album_id: String,
        #[command(flatten)]
        remote: RemoteArgs,
    },
}

#[derive(clap::Args, Debug)]
struct RemoteArgs {
    /// Server URL (defaults to app.base_url, then the configured listen address)
    #[arg(long)]
    server: Option<String>,

    /// Sign a session cookie for this owner with the configured secret
    #[arg(long)]
    owner: Option<String>,
}

#[derive(Subcommand, Debug)]
enum AlbumCommands {
    /// List all albums
    List,
    /// Add a new album
    Add {
        /// Album title
        title: String,
        /// Owner identifier
        owner: String,
        /// Slug (derived from the title when omitted)
        #[arg(long)]
        slug: Option<String>,
        /// Optional access password
        #[arg(long)]
        password: Option<String>,
    },
    /// Remove an album record (stored photos are kept)
    Remove {
        /// Slug of the album to remove
        slug: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set up logging first
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli.config)?;

    match cli.command {
        Some(Commands::Album(album_cmd)) => handle_album_command(&config, album_cmd).await,
        Some(Commands::Upload {
            album_id,
            files,
            remote,
        }) => upload(&config, &remote, &album_id, &files).await,
        Some(Commands::Find {
            album_id,
            selfie,
            download,
            remote,
        }) => find(&config, &remote, &album_id, &selfie, download.as_deref()).await,
        Some(Commands::Reindex { album_id, remote }) => {
            reindex(&config, &remote, &album_id).await
        }
        Some(Commands::Serve {
            port,
            host,
            quit_after,
        }) => run_server(config, &cli.config, port, host, quit_after).await,
        None => {
            // Default to serve command if no subcommand specified
            run_server(config, &cli.config, None, None, None).await
        }
    }
}

fn load_config(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if config_path.exists() {
        let config_content = std::fs::read_to_string(config_path)?;
        Ok(toml_edit::de::from_str::<Config>(&config_content)?)
    } else {
        info!("Config file not found at {:?}, using defaults", config_path);
        Ok(Config::default())
    }
}

async fn handle_album_command(
    config: &Config,
    cmd: AlbumCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = TomlAlbumStore::open(config.albums.database.clone()).await?;

    match cmd {
        AlbumCommands::List => {
            let albums = store.list().await?;
            if albums.is_empty() {
                println!("No albums in database");
            } else {
                println!("Albums in database:");
                for album in albums {
                    println!(
                        "  {} ({}) \"{}\" owner={} created={}",
                        album.slug,
                        album.id,
                        album.title,
                        album.owner_id,
                        album.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        AlbumCommands::Add {
            title,
            owner,
            slug,
            password,
        } => {
            let slug = slug.unwrap_or_else(|| slugify(&title));
            if slug.is_empty() {
                eprintln!("Error: Cannot derive a slug from '{}', pass --slug", title);
                std::process::exit(1);
            }

            let mut album = Album::new(slug.clone(), title.trim(), owner.trim());
            if let Some(password) = password {
                album = album.with_password(password);
            }
            let album_id = album.id.clone();

            store.insert(album).await?;
            println!("Added album '{}' with id {}", slug, album_id);
        }
        AlbumCommands::Remove { slug } => match store.remove(&slug).await? {
            Some(album) => println!("Removed album '{}' ({})", slug, album.id),
            None => {
                eprintln!("Error: Album '{}' not found", slug);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

fn api_client(config: &Config, remote: &RemoteArgs) -> Result<ApiClient, Box<dyn std::error::Error>> {
    let server = remote
        .server
        .clone()
        .or_else(|| config.app.base_url.clone())
        .unwrap_or_else(|| format!("http://{}:{}", config.server.host, config.server.port));
    let client = ApiClient::new(&server)?;

    match (&remote.owner, &config.app.session_secret) {
        (Some(owner), Some(secret)) => Ok(client.with_session(create_signed_cookie(secret, owner)?)),
        (Some(_), None) => {
            tracing::warn!("--owner ignored: app.session_secret is not configured");
            Ok(client)
        }
        (None, _) => Ok(client),
    }
}

async fn upload(
    config: &Config,
    remote: &RemoteArgs,
    album_id: &str,
    files: &[PathBuf],
) -> Result<(), Box<dyn std::error::Error>> {
    let client = api_client(config, remote)?;

    let results = client.upload_batch(album_id, files).await?;
    for (path, result) in files.iter().zip(&results) {
        match (&result.url, &result.error) {
            (Some(url), _) if result.indexed => println!("  {} -> {}", path.display(), url),
            (Some(url), _) => println!(
                "  {} -> {} (not indexed: {})",
                path.display(),
                url,
                result.index_error.as_deref().unwrap_or("unknown error")
            ),
            (None, error) => println!(
                "  {} failed: {} {}",
                path.display(),
                error.as_deref().unwrap_or("unknown error"),
                result.details.as_deref().unwrap_or("")
            ),
        }
    }

    // One refresh after the whole batch
    let listing = client.list_photos(album_id).await?;
    println!(
        "Album {} now has {} photos ({} unindexed)",
        album_id,
        listing.photos.len(),
        listing.unindexed.len()
    );

    if results.iter().any(|result| !result.is_stored()) {
        std::process::exit(1);
    }
    Ok(())
}

async fn find(
    config: &Config,
    remote: &RemoteArgs,
    album_id: &str,
    selfie: &Path,
    download: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = api_client(config, remote)?;

    let listing = client.list_photos(album_id).await?;
    let mut session = GallerySession::new(album_id, listing.photos);

    let feedback = session.apply_match(client.compare(album_id, selfie).await);
    println!("{}", feedback.message());

    if session.mode() == GalleryMode::Matched {
        for filename in session.visible() {
            println!("  {}", filename);
        }

        if let Some(dest_dir) = download {
            let visible = session.visible().to_vec();
            for filename in visible {
                session.open_preview(&filename);
                if let Some((album_id, filename)) = session.download_target() {
                    client.download(album_id, filename, dest_dir).await?;
                }
                session.close_preview();
            }
        }
    }

    if feedback.is_failure() {
        std::process::exit(1);
    }
    Ok(())
}

async fn reindex(
    config: &Config,
    remote: &RemoteArgs,
    album_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = api_client(config, remote)?;
    let report = client.reindex(album_id).await?;
    println!(
        "Reindexed {} photos of {}, {} still failing",
        report.reindexed, album_id, report.failed
    );

    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_server(
    config: Config,
    config_path: &Path,
    port: Option<u16>,
    host: Option<String>,
    quit_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = host.unwrap_or(config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info!("Starting {} server", config.app.name);
    info!("Configuration loaded from: {:?}", config_path);
    info!("Storage root: {:?}", config.storage.root);
    info!("Album database: {:?}", config.albums.database);
    info!(
        "Upload limits: {} bytes per file, {} bytes per request",
        config.storage.max_file_bytes, config.storage.max_request_bytes
    );
    if config.app.session_secret.is_none() {
        tracing::warn!("app.session_secret is not set, owner checks are disabled");
    }

    // Perform startup checks
    match startup_checks::perform_startup_checks(&config).await {
        Ok(()) => info!("All startup checks passed"),
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }

            if errors.iter().any(|e| e.is_critical()) {
                tracing::error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            } else {
                tracing::warn!("Non-critical startup checks failed, continuing");
            }
        }
    }

    let app_state = AppState::from_config(config).await?;
    info!("Face indexer: {}", app_state.indexer.name());
    let app = router(app_state);

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Add ConnectInfo layer to track client IPs
    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    // Set up graceful shutdown
    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(shutdown_signal(quit_after));

    if let Err(e) = graceful.await {
        tracing::error!("Server error: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(quit_after: Option<u64>) {
    use tokio::signal;
    use tokio::time::{Duration, sleep};

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let quit_timer = async {
        if let Some(seconds) = quit_after {
            info!(
                "Server will automatically shut down after {} seconds",
                seconds
            );
            sleep(Duration::from_secs(seconds)).await;
            info!("Quit timer expired, shutting down");
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        },
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        },
        _ = quit_timer => {},
    }
}
