//! Manual inspection runner: resolve today's doses from the local database,
//! run the daily pass against an in-process notification queue and print the
//! result as JSON.

use dosekeeper::config::{self, EngineConfig};
use dosekeeper::notifications::InMemoryNotificationCenter;
use dosekeeper::scheduling::{ReminderEngine, ReminderService, SqliteReminderStore, SystemClock};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dosekeeper::init_tracing();
    tracing::info!("DoseKeeper v{}", config::APP_VERSION);

    let db_path = config::database_path();
    tracing::info!(path = %db_path.display(), "Opening reminder database");
    let store = SqliteReminderStore::open(&db_path)?;

    let center = InMemoryNotificationCenter::new();
    let engine = ReminderEngine::new(store, center.clone(), Box::new(SystemClock), EngineConfig::from_env())?;
    let (handle, task) = ReminderService::spawn(engine);

    let reconciliation = handle.trigger_reconciliation_if_due().await?;
    let doses = handle.today_doses().await?;
    let next = handle.next_pending_dose().await?;

    let summary = serde_json::json!({
        "reconciliation": reconciliation,
        "doses": doses,
        "nextDose": next,
        "scheduledAlarms": center.len(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    drop(handle);
    task.await?;
    Ok(())
}
