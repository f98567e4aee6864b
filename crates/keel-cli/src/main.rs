mod commands;

use clap::{Parser, Subcommand};
use commands::{BuildFlags, Target};

#[derive(Parser)]
#[command(name = "keel", about = "Build and release apps on a keel rack")]
#[command(version)]
struct Cli {
    /// App to operate on (defaults to keel.toml, then the directory name)
    #[arg(long, short = 'a', global = true)]
    app: Option<String>,
    /// Rack to operate on (defaults to keel.toml)
    #[arg(long, global = true)]
    rack: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the app from a directory or URL
    Build {
        /// Source directory or http(s) URL (default: current directory)
        source: Option<String>,
        /// Upload only files the rack does not already have
        #[arg(long)]
        incremental: bool,
        /// Build without reusing cached image layers
        #[arg(long)]
        no_cache: bool,
        /// Manifest file to build from
        #[arg(long, short = 'f')]
        file: Option<String>,
        /// Description stored with the build
        #[arg(long, short = 'd')]
        description: Option<String>,
    },
    /// List and manage builds
    Builds {
        #[command(subcommand)]
        action: Option<BuildsAction>,
    },
    /// List and manage releases
    Releases {
        #[command(subcommand)]
        action: Option<ReleasesAction>,
    },
}

#[derive(Subcommand)]
enum BuildsAction {
    /// Show one build
    Info {
        /// Build id
        id: String,
    },
    /// Copy a build to another app
    Copy {
        /// Build id
        id: String,
        /// Destination app
        dest_app: String,
        /// Promote the copied release once the build completes
        #[arg(long)]
        promote: bool,
    },
    /// Delete a build
    Delete {
        /// Build id
        id: String,
    },
}

#[derive(Subcommand)]
enum ReleasesAction {
    /// Copy a release under a new id
    Copy {
        /// Release id
        id: String,
    },
    /// Point the app's stack at a release
    Promote {
        /// Release id
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let target = Target {
        app: cli.app,
        rack: cli.rack,
    };

    match cli.command {
        Commands::Build {
            source,
            incremental,
            no_cache,
            file,
            description,
        } => {
            let flags = BuildFlags {
                source,
                incremental,
                no_cache,
                manifest: file,
                description,
            };
            commands::build(&target, flags).await?
        }
        Commands::Builds { action } => match action {
            None => commands::builds_list(&target).await?,
            Some(BuildsAction::Info { id }) => commands::builds_info(&target, &id).await?,
            Some(BuildsAction::Copy {
                id,
                dest_app,
                promote,
            }) => commands::builds_copy(&target, &id, &dest_app, promote).await?,
            Some(BuildsAction::Delete { id }) => commands::builds_delete(&target, &id).await?,
        },
        Commands::Releases { action } => match action {
            None => commands::releases_list(&target).await?,
            Some(ReleasesAction::Copy { id }) => commands::releases_copy(&target, &id).await?,
            Some(ReleasesAction::Promote { id }) => {
                commands::releases_promote(&target, &id).await?
            }
        },
    }

    Ok(())
}
