use std::{
    path::PathBuf,
    process::ExitCode,
};

use ankisync::{
    inspect::inspect,
    persistence,
    Anki,
    AnkiConnect,
    ClientConfig,
    SyncError,
    SyncOptions,
};
use clap::{
    Parser,
    Subcommand,
};
use tracing_subscriber::EnvFilter;

/// Configure Anki note types, media and example cards through AnkiConnect.
#[derive(Parser)]
#[command(name = "ankisync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// AnkiConnect endpoint (overrides the manifest's connection settings)
    #[arg(global = true, long)]
    endpoint: Option<String>,

    /// Enable debug logging
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload media, create or update note types and add example notes
    Sync {
        /// Manifest file (HJSON or JSON)
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Directory that relative paths in the manifest are resolved against
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Re-upload media files even if Anki already has them
        #[arg(short, long)]
        force: bool,

        /// Fail when an existing note type's fields differ from the manifest
        #[arg(long)]
        strict_fields: bool,

        #[arg(long)]
        skip_media: bool,

        #[arg(long)]
        skip_schema: bool,

        /// Do not add the example notes
        #[arg(long)]
        no_examples: bool,
    },

    /// Render the first card of a note type and check its asset references
    Inspect {
        #[arg(short, long, default_value = "Cloze-Modern")]
        note_type: String,

        /// Manifest file whose connection settings are used
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ankisync=debug" } else { "ankisync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn execute(cli: Cli) -> Result<bool, SyncError> {
    match cli.command {
        Commands::Sync {
            manifest,
            root,
            force,
            strict_fields,
            skip_media,
            skip_schema,
            no_examples,
        } => {
            let manifest = persistence::load_manifest(manifest.as_deref(), root.as_deref())?;
            let config = ClientConfig::resolve(manifest.connection.as_ref(), cli.endpoint);
            let options = SyncOptions {
                force_media: force,
                strict_fields,
                skip_media,
                skip_schema,
                skip_examples: no_examples,
            };

            let anki = Anki::new(AnkiConnect::new(config.clone())?);
            let summary = ankisync::run(&anki, &manifest, &config, &options).await?;
            println!("\nSync complete.");
            print!("{}", summary);
            Ok(true)
        }
        Commands::Inspect { note_type, manifest } => {
            let manifest = persistence::load_manifest(manifest.as_deref(), None)?;
            let config = ClientConfig::resolve(manifest.connection.as_ref(), cli.endpoint);
            let anki = Anki::new(AnkiConnect::new(config)?);
            match inspect(&anki, &note_type).await? {
                Some(report) => {
                    print!("{}", report);
                    Ok(report.all_present())
                }
                None => {
                    println!("No cards found for note type '{}'", note_type);
                    Ok(false)
                }
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
