//! Example demonstrating backfill, range queries, and the catalog.
//!
//! This example shows how to:
//! - Open a store in a scratch directory
//! - Backfill a week of readings with explicit timestamps
//! - List sensors and partition dates
//! - Query a range of days and inspect the merged series

use chrono::{Duration, NaiveDate};
use sensorlog::error::Result;
use sensorlog::{SensorStore, StoreConfig};

fn main() -> Result<()> {
    println!("🌡️  sensorlog Backfill & Query Example");

    let data_dir = std::env::temp_dir().join("sensorlog_example");
    let _ = std::fs::remove_dir_all(&data_dir);

    let config = StoreConfig::new(&data_dir).with_max_points(100);
    let store = SensorStore::open(config)?;

    println!("\n📥 Backfilling one reading per hour for a week...");
    let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap_or_default();
    let base = start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();

    for hour in 0..7 * 24 {
        let ts = base + Duration::hours(hour);
        #[allow(clippy::cast_precision_loss)]
        let temp = 18.0 + (hour % 24) as f64 * 0.25;
        store.ingest_at("temp", &temp.to_string(), ts)?;

        // Humidity only reports every other day.
        if (hour / 24) % 2 == 0 {
            store.ingest_at("humidity", "45", ts)?;
        }
    }

    println!("\n📚 Catalog:");
    for sensor in store.list_sensors()? {
        let dates = store.list_dates(&sensor)?;
        println!("  {sensor}: {} partitions", dates.len());
    }

    println!("\n🔍 Querying days 2 through 4...");
    let end = start + Duration::days(3);
    let result = store.query_series("humidity", start + Duration::days(1), end)?;
    println!(
        "  humidity: {} readings from partitions {:?}",
        result.len(),
        result.partitions()
    );

    let result = store.query_series("temp", end, start + Duration::days(1))?;
    let (from, to) = result.range();
    println!("  temp: {} readings between {from} and {to}", result.len());
    if let (Some(first), Some(last)) = (result.readings().first(), result.readings().last()) {
        println!("    first: {} = {}", first.timestamp, first.value);
        println!("    last:  {} = {}", last.timestamp, last.value);
    }

    println!("\n🧠 Recent window holds {} temp readings", store.recent_series("temp").len());

    let _ = std::fs::remove_dir_all(&data_dir);
    println!("\n✅ Done");
    Ok(())
}
