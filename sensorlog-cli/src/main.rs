//! CLI for the sensorlog sensor reading store.
//!
//! Provides commands for inspecting, querying, and benchmarking a data
//! directory of day-partitioned sensor logs.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use sensorlog::naming;
use sensorlog::{SensorStore, StoreConfig};
use tempfile::TempDir;

/// sensorlog — Day-partitioned sensor reading store CLI.
#[derive(Parser)]
#[command(name = "sensorlog", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// List every sensor with at least one partition.
    Sensors {
        /// Path to the data directory.
        data_dir: PathBuf,
    },

    /// List the partition dates of a sensor, newest first.
    Dates {
        /// Path to the data directory.
        data_dir: PathBuf,

        /// Sensor name.
        sensor: String,
    },

    /// Query a sensor's readings over a range of days.
    Query {
        /// Path to the data directory.
        data_dir: PathBuf,

        /// Sensor name.
        sensor: String,

        /// First day of the range (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// Last day of the range (YYYY-MM-DD). Defaults to `--start`.
        #[arg(long)]
        end: Option<String>,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Append one reading, stamped with the current time.
    Ingest {
        /// Path to the data directory.
        data_dir: PathBuf,

        /// Sensor name.
        sensor: String,

        /// Reading value.
        value: String,
    },

    /// Run an ingest-path microbenchmark.
    Bench {
        /// Number of readings to ingest.
        #[arg(long, default_value = "100000")]
        points: u64,

        /// Number of sensors to spread the readings over.
        #[arg(long, default_value = "10")]
        sensors: u32,
    },
}

/// Output format for query results.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON object with the readings array.
    Json,
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sensors { data_dir } => cmd_sensors(&data_dir),
        Commands::Dates { data_dir, sensor } => cmd_dates(&data_dir, &sensor),
        Commands::Query {
            data_dir,
            sensor,
            start,
            end,
            format,
        } => cmd_query(&data_dir, &sensor, &start, end.as_deref(), &format),
        Commands::Ingest {
            data_dir,
            sensor,
            value,
        } => cmd_ingest(&data_dir, &sensor, &value),
        Commands::Bench { points, sensors } => cmd_bench(points, sensors),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Opens an existing data directory without warming buffers.
fn open_existing(data_dir: &Path) -> Result<SensorStore, Box<dyn std::error::Error>> {
    if !data_dir.is_dir() {
        return Err(format!("No data directory found at '{}'", data_dir.display()).into());
    }
    let config = StoreConfig::new(data_dir).with_warm_buffers(false);
    Ok(SensorStore::open(config)?)
}

/// Implements `sensorlog sensors <data_dir>`.
fn cmd_sensors(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(data_dir)?;
    let sensors = store.list_sensors()?;

    println!("Data directory: {}", data_dir.display());
    println!("Sensors: {}", sensors.len());
    for sensor in &sensors {
        let dates = store.list_dates(sensor)?;
        match (dates.last(), dates.first()) {
            (Some(oldest), Some(newest)) => {
                println!("  - {sensor} ({} partitions, {oldest} .. {newest})", dates.len());
            }
            _ => println!("  - {sensor}"),
        }
    }

    Ok(())
}

/// Implements `sensorlog dates <data_dir> <sensor>`.
fn cmd_dates(data_dir: &Path, sensor: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(data_dir)?;
    for date in store.list_dates(sensor)? {
        let path = store.partitions().partition_path(sensor, date);
        let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        println!("{date}  {}", format_bytes(size));
    }
    Ok(())
}

/// Implements `sensorlog query <data_dir> <sensor>`.
fn cmd_query(
    data_dir: &Path,
    sensor: &str,
    start: &str,
    end: Option<&str>,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_existing(data_dir)?;

    let start: NaiveDate = naming::parse_date(start)?;
    let end = match end {
        Some(end) => naming::parse_date(end)?,
        None => start,
    };

    let result = store.query_series(sensor, start, end)?;
    let (start, end) = result.range();

    match format {
        OutputFormat::Csv => {
            println!(
                "# sensor={sensor}, range={start}..{end}, partitions={}, points={}",
                result.partitions().len(),
                result.len()
            );
            println!("timestamp,value");
            for reading in result.readings() {
                print!("{}", reading.to_line());
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "sensor": sensor,
                "start": start,
                "end": end,
                "partitions": result.partitions(),
                "count": result.len(),
                "data": result.readings(),
            });

            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `sensorlog ingest <data_dir> <sensor> <value>`.
fn cmd_ingest(data_dir: &Path, sensor: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = StoreConfig::new(data_dir).with_warm_buffers(false);
    let store = SensorStore::open(config)?;
    let reading = store.ingest(sensor, value)?;
    print!("{}", reading.to_line());
    Ok(())
}

/// Implements `sensorlog bench`.
#[allow(clippy::cast_precision_loss)] // Benchmark stats are fine with f64 precision
fn cmd_bench(points: u64, sensor_count: u32) -> Result<(), Box<dyn std::error::Error>> {
    if sensor_count == 0 {
        return Err("--sensors must be at least 1".into());
    }

    println!("sensorlog ingest-path benchmark");
    println!("  Points: {points}");
    println!("  Sensors: {sensor_count}");
    println!();

    let temp_dir = bench_dir()?;

    let config = StoreConfig::new(temp_dir.path()).with_warm_buffers(false);
    let store = SensorStore::open(config)?;
    let sensors: Vec<String> = (0..sensor_count).map(|i| format!("sensor_{i}")).collect();

    println!("Ingesting {points} readings across {sensor_count} sensors...");

    let points_per_sensor = points / u64::from(sensor_count);
    let start = Instant::now();

    for i in 0..points_per_sensor {
        let value = i.to_string();
        for sensor in &sensors {
            store.ingest(sensor, &value)?;
        }
    }

    let elapsed = start.elapsed();
    let total_writes = points_per_sensor * u64::from(sensor_count);
    let us_per_write = elapsed.as_micros() as f64 / total_writes.max(1) as f64;
    let writes_per_sec = total_writes as f64 / elapsed.as_secs_f64();
    let disk_usage = dir_size(temp_dir.path())?;

    println!();
    println!("Results:");
    println!("  Total writes: {total_writes}");
    println!("  Elapsed: {elapsed:.3?}");
    println!("  Avg latency: {us_per_write:.1} us/write");
    println!("  Throughput: {writes_per_sec:.0} writes/sec");
    println!("  Disk usage: {}", format_bytes(disk_usage));
    println!();

    Ok(())
}

/// Creates a fresh scratch directory, removed when the handle drops.
fn bench_dir() -> std::io::Result<TempDir> {
    tempfile::Builder::new().prefix("sensorlog_bench_").tempdir()
}

/// Formats a byte count as a human-readable string.
#[allow(clippy::cast_precision_loss)] // Byte counts are display-only
fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

/// Sums the sizes of the files directly inside `path`.
fn dir_size(path: &Path) -> Result<u64, Box<dyn std::error::Error>> {
    let mut total = 0;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if metadata.is_file() {
            total += metadata.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1_048_576), "3.0 MB");
    }

    #[test]
    fn test_cli_parses_query() {
        let cli = Cli::try_parse_from([
            "sensorlog",
            "query",
            "./data",
            "temp",
            "--start",
            "2024-05-01",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Query {
                sensor, start, end, ..
            } => {
                assert_eq!(sensor, "temp");
                assert_eq!(start, "2024-05-01");
                assert!(end.is_none());
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_bench_dirs_are_unique_and_removed() {
        let first = bench_dir().unwrap();
        let second = bench_dir().unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.path().is_dir());

        let path = first.path().to_path_buf();
        drop(first);
        assert!(!path.exists());
        assert!(second.path().is_dir());
    }

    #[test]
    fn test_concurrent_benches_do_not_collide() {
        let handles: Vec<_> = (0..2)
            .map(|_| std::thread::spawn(|| cmd_bench(200, 2).map_err(|e| e.to_string())))
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
    }

    #[test]
    fn test_open_existing_requires_directory() {
        let missing = std::env::temp_dir().join("sensorlog_cli_missing_dir_for_test");
        let _ = std::fs::remove_dir_all(&missing);
        assert!(open_existing(&missing).is_err());
    }
}
