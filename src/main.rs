use rollcall::{
    common::{Config, DataPaths},
    core::{content_hash, MatchScorer, Verifier, MATCH_THRESHOLD},
    export::{export_attendance, ClassNames},
    service,
    storage::{AttendanceStore, ClassSelection},
};

use std::path::PathBuf;
use anyhow::{Context as _, Result};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(about = "Class attendance with face-checked check-in")]
struct Cli {
    /// Enable development mode (keeps all data under ./dev_data)
    #[arg(long, global = true)]
    dev: bool,

    /// Read configuration from this file instead of configs/attendance.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the web service (default)
    Serve,
    /// List the fingerprints loaded for each roster identity
    Fingerprints,
    /// Score an image against every roster identity
    Scores {
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Verify an image against a claimed student
    Verify {
        #[arg(short, long)]
        student: String,
        #[arg(short, long)]
        image: PathBuf,
    },
    /// Export today's attendance for a class to CSV
    Export {
        #[arg(long)]
        section: String,
        #[arg(long)]
        group: String,
        #[arg(long)]
        subject: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on mode
    setup_logging(cli.dev);

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let paths = DataPaths::resolve(&config, cli.dev)?;
    if cli.dev {
        tracing::debug!("Development mode, data under {}", paths.base_dir.display());
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            runtime.block_on(service::start_server(config, paths))?;
        }
        Commands::Fingerprints => {
            let verifier = verifier_for(&config, &paths);
            let store = verifier.load_store();
            println!("Reference images: {}", paths.faces_dir.display());
            for identity in store.iter() {
                let kind = if identity.placeholder { "placeholder" } else { "reference" };
                println!("{} ({} {})", identity.name, identity.fingerprints.len(), kind);
                for fingerprint in &identity.fingerprints {
                    println!("   {}", fingerprint);
                }
            }
        }
        Commands::Scores { image } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let store = verifier_for(&config, &paths).load_store();
            let sample_hash = content_hash(&bytes);

            println!("Sample {}", sample_hash);
            for score in MatchScorer::new().score(&sample_hash, &store) {
                let mark = if score.score > MATCH_THRESHOLD { "*" } else { " " };
                println!("{} {:>3}  {}", mark, score.score, score.name);
            }
        }
        Commands::Verify { student, image } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let verdict = verifier_for(&config, &paths).verify(&BASE64_STANDARD.encode(bytes), &student);

            println!("{}", verdict.message);
            if let Some(saved) = &verdict.saved_path {
                println!("Saved to {}", saved.display());
            }
            println!("Verification: {}", if verdict.accepted { "ACCEPTED" } else { "REJECTED" });
        }
        Commands::Export { section, group, subject } => {
            paths.ensure()?;
            let mut store = AttendanceStore::open(&paths.database_file, false)?;
            store.seed_defaults(&config.roster.students)?;

            let (selection, names) = find_class(&store, &section, &group, &subject)?;
            let roll = store.daily_roll(selection, chrono::Local::now().date_naive())?;
            let filename = export_attendance(&paths.csv_dir, &names, &roll.present, &roll.absent)?;
            println!("Exported {}", paths.csv_dir.join(filename).display());
        }
    }

    Ok(())
}

fn verifier_for(config: &Config, paths: &DataPaths) -> Verifier {
    Verifier::new(
        config.roster.students.clone(),
        paths.faces_dir.clone(),
        paths.recognized_dir.clone(),
    )
}

/// Resolves class names typed on the command line to their ids.
fn find_class<'a>(
    store: &AttendanceStore,
    section: &'a str,
    group: &'a str,
    subject: &'a str,
) -> Result<(ClassSelection, ClassNames<'a>)> {
    let section_row = store
        .sections()?
        .into_iter()
        .find(|s| s.name == section)
        .with_context(|| format!("Unknown section {}", section))?;
    let group_row = store
        .groups_for_section(section_row.id)?
        .into_iter()
        .find(|g| g.name == group)
        .with_context(|| format!("Unknown group {} in section {}", group, section))?;
    let subject_row = store
        .subjects()?
        .into_iter()
        .find(|s| s.name == subject)
        .with_context(|| format!("Unknown subject {}", subject))?;

    let selection = ClassSelection {
        section_id: section_row.id,
        group_id: group_row.id,
        subject_id: subject_row.id,
    };
    Ok((selection, ClassNames { section, group, subject }))
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .init();
    }
}
