use clap::Parser;
use refit_common::fs_utils::resolve_within_root;
use refit_common::project::find_project_root;
use refit_common::RefitConfig;
use refit_pipeline::SafeWorkflow;
use refit_snapshot::{DirSnapshotStore, RollbackManager, SnapshotStore};
use refit_surgeon::DefectRecord;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "refit", about = "Safe automated refactoring for Java projects")]
struct Cli {
    /// Path inside the project; the nearest build manifest marks the root
    #[arg(long, global = true, default_value = ".")]
    project_root: PathBuf,

    /// Config file (defaults to .refit/config.json under the project root)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Fix the given defect records and print the workflow outcome as JSON
    Run {
        /// JSON array of defect records, or '-' for stdin
        defects: PathBuf,

        /// Compute every rewrite without writing, snapshotting or building
        #[arg(long)]
        dry_run: bool,
    },
    /// List stored snapshots, newest first
    Snapshots {
        /// Only snapshots of this file
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Restore files from the snapshot store
    Rollback {
        /// Snapshot id
        #[arg(long, conflicts_with_all = ["latest", "set"])]
        id: Option<Uuid>,

        /// Restore the newest snapshot of this file
        #[arg(long, conflicts_with = "set")]
        latest: Option<PathBuf>,

        /// Restore every file of one workflow run
        #[arg(long)]
        set: Option<Uuid>,

        /// Restore even when already restored
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries only JSON.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let start = cli.project_root.canonicalize()?;
    let project_root = find_project_root(&start).unwrap_or(start);
    let mut config = RefitConfig::load(&project_root, cli.config.as_deref())?;
    tracing::info!("Project root: {}", project_root.display());

    match cli.command {
        Commands::Run { defects, dry_run } => {
            if dry_run {
                config.workflow.dry_run = Some(true);
            }
            let records = read_defects(&defects)?;
            let workflow = SafeWorkflow::from_config(&project_root, &config)?;
            let outcome = workflow.run(&records).await;
            print_json(&outcome)?;
            if !outcome.success {
                return Err(format!("workflow ended {:?} in phase {:?}", outcome.state, outcome.phase).into());
            }
        }
        Commands::Snapshots { path } => {
            let store = DirSnapshotStore::from_config(&project_root, &config)?;
            let snapshots = match path {
                Some(path) => store.list_for(&resolve_within_root(&project_root, &path)?)?,
                None => store.list_all()?,
            };
            print_json(&snapshots)?;
        }
        Commands::Rollback {
            id,
            latest,
            set,
            force,
        } => {
            let store: Arc<dyn SnapshotStore> =
                Arc::new(DirSnapshotStore::from_config(&project_root, &config)?);
            let manager = RollbackManager::new(store);
            let reports = match (id, latest, set) {
                (Some(id), _, _) => vec![manager.restore_id(id, force)?],
                (_, Some(path), _) => {
                    let path = resolve_within_root(&project_root, &path)?;
                    vec![manager.restore_latest(&path, force)?]
                }
                (_, _, Some(set)) => manager.restore_set(set, force)?,
                _ => return Err("rollback needs one of --id, --latest or --set".into()),
            };
            print_json(&reports)?;
        }
    }

    Ok(())
}

fn read_defects(source: &Path) -> Result<Vec<DefectRecord>, Box<dyn std::error::Error>> {
    let text = if source == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source)?
    };
    Ok(serde_json::from_str(&text)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
