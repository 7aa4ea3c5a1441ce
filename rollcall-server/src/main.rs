#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::{Parser, Subcommand};
use rollcall::records::{enqueue_record, get_all_records};
use rollcall::{AcademicCalendar, AttendanceRecord, Database, DatabaseSchema, Role};
use rollcall_http::serve;
use rollcall_sync::{LifecycleEvent, ServiceWorker, SyncConfig, SyncHandler, DEFAULT_SYNC_TAG};
use std::path::Path;

#[derive(Parser)]
#[command(name = "rollcall")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(long, env = "ROLLCALL_DATA_DIR", default_value = "./data")]
    data_dir: String,
    #[arg(long, env = "ROLLCALL_BIND_ADDR", default_value = "127.0.0.1:7710")]
    bind_addr: String,
}

#[derive(Subcommand)]
enum Command {
    /// Queue an attendance entry in the local store
    Record {
        #[arg(long)]
        user_id: u64,
        #[arg(long)]
        role: Role,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Deliver one sync event now; exits non-zero if the sync fails
    Sync {
        #[arg(long, default_value = DEFAULT_SYNC_TAG)]
        tag: String,
    },
    /// Print the records still waiting to be synced
    Pending,
}

fn open_db(data_dir: &str) -> rollcall::Result<Database> {
    Database::open(Path::new(data_dir), &DatabaseSchema::attendance())
}

async fn run_sync(data_dir: &str, tag: String) -> Result<(), Box<dyn std::error::Error>> {
    rollcall_http::init_tracing();

    let config = SyncConfig::load(Path::new(data_dir))?;
    let worker = ServiceWorker::new(SyncHandler::new(config, data_dir));
    worker.dispatch(LifecycleEvent::Install).await?;
    worker.dispatch(LifecycleEvent::Activate).await?;

    let outcome = worker
        .dispatch(LifecycleEvent::Sync {
            tag,
            last_chance: false,
        })
        .await?;
    println!("{}", serde_json::to_string(&outcome)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Record {
            user_id,
            role,
            lat,
            lon,
        }) => {
            let db = open_db(&cli.data_dir)?;
            let calendar = AcademicCalendar::load_or_default(Path::new(&cli.data_dir));
            let record = AttendanceRecord::now(user_id, role, lat, lon);
            let key = enqueue_record(&db, &calendar, &record)?;
            println!("{}", key);
            Ok(())
        }
        Some(Command::Sync { tag }) => run_sync(&cli.data_dir, tag).await,
        Some(Command::Pending) => {
            let db = open_db(&cli.data_dir)?;
            let records = get_all_records(&db)?;
            println!("{}", serde_json::to_string_pretty(&records)?);
            Ok(())
        }
        None => {
            std::env::set_var("ROLLCALL_DATA_DIR", &cli.data_dir);
            std::env::set_var("ROLLCALL_BIND_ADDR", &cli.bind_addr);
            serve().await
        }
    }
}
