//! CLI for the epochring time-window ring buffer.
//!
//! Provides commands for inspecting slot positioning, filling a buffer with
//! sample data, and benchmarking the write path.

use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use epochring::{BufferConfig, Datum, RingBuffer, Span, StorageType, Timestamped};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// epochring: time-window ring buffer CLI.
#[derive(Parser)]
#[command(name = "epochring", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Print the generation and slot of every second in a time range.
    Positions {
        /// Start of the range (epoch seconds or RFC 3339).
        #[arg(long)]
        from: String,

        /// End of the range, exclusive (epoch seconds or RFC 3339).
        #[arg(long)]
        to: String,

        /// Buffer period (e.g., "1h", "30m", "7d").
        #[arg(long, default_value = "1m")]
        period: String,

        /// Slot width.
        #[arg(long, default_value = "1s")]
        resolution: String,
    },

    /// Fill a buffer with random samples around now and print its window.
    Fill {
        /// Number of samples to insert.
        #[arg(long, default_value = "100")]
        points: u64,

        /// Buffer period (e.g., "1h", "30m", "7d").
        #[arg(long, default_value = "2h")]
        period: String,

        /// Slot width.
        #[arg(long, default_value = "2s")]
        resolution: String,

        /// Storage backend (memory or null).
        #[arg(long, default_value = "memory")]
        storage: StorageType,

        /// JSON buffer config; overrides period, resolution and storage.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,

        /// Seed for the sample generator.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run a write-path microbenchmark.
    Bench {
        /// Number of records to put.
        #[arg(long, default_value = "10000000")]
        points: u64,

        /// Buffer period.
        #[arg(long, default_value = "1d")]
        period: String,

        /// Slot width.
        #[arg(long, default_value = "1s")]
        resolution: String,
    },
}

/// Output format for buffer contents.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON object with window, latest and walk sections.
    Json,
}

/// Sample payload: a reading averaged over every arrival in its bucket.
#[derive(Debug, Clone)]
struct Sample {
    datum: Datum,
    value: f64,
    count: u32,
}

impl Timestamped for Sample {
    fn timestamp(&self) -> SystemTime {
        self.datum.timestamp()
    }

    fn sequence(&self) -> i64 {
        self.datum.sequence()
    }

    fn set_sequence(&mut self, sequence: i64) {
        self.datum.set_sequence(sequence);
    }

    fn merge(&mut self, other: Self) -> epochring::Result<()> {
        let total = self.value * f64::from(self.count) + other.value * f64::from(other.count);
        self.count += other.count;
        self.value = total / f64::from(self.count);
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Positions {
            from,
            to,
            period,
            resolution,
        } => cmd_positions(&from, &to, &period, &resolution),
        Commands::Fill {
            points,
            period,
            resolution,
            storage,
            config,
            format,
            seed,
        } => load_config(config.as_ref(), &period, &resolution, storage)
            .and_then(|config| cmd_fill(&config, points, &format, seed)),
        Commands::Bench {
            points,
            period,
            resolution,
        } => cmd_bench(points, &period, &resolution),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `epochring positions`.
///
/// The bucket column truncates each tick to a multiple of the resolution
/// counted from the Unix epoch, the same alignment the ring uses for slots.
fn cmd_positions(
    from: &str,
    to: &str,
    period: &str,
    resolution: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let span = Span::new(parse_duration(period)?, parse_duration(resolution)?)?;
    let from = parse_instant(from)?;
    let to = parse_instant(to)?;
    if to < from {
        return Err(format!("Range end {to} is before start {from}").into());
    }

    println!(
        "# period={}, resolution={}, capacity={}",
        format_duration_secs(span.period_secs().unsigned_abs()),
        format_duration_secs(span.resolution_secs().unsigned_abs()),
        span.capacity()
    );

    for tick in from..to {
        let position = span.position(tick)?;
        let bucket = bucket_start(&span, tick);
        println!(
            "{} -> {} : {:>10} | {}",
            format_epoch(tick),
            format_epoch(bucket),
            position.sequence,
            position.index
        );
    }

    Ok(())
}

/// Start of the bucket holding `tick`, aligned to the Unix epoch like slots.
fn bucket_start(span: &Span, tick: i64) -> i64 {
    tick - tick.rem_euclid(span.resolution_secs())
}

/// Builds the buffer config from a JSON file or from flags.
fn load_config(
    path: Option<&PathBuf>,
    period: &str,
    resolution: &str,
    storage: StorageType,
) -> Result<BufferConfig, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        let json = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config '{}': {e}", path.display()))?;
        debug!(path = %path.display(), "loaded buffer config");
        return Ok(BufferConfig::from_json(&json)?);
    }

    Ok(BufferConfig::new(
        parse_duration(period)?,
        parse_duration(resolution)?,
        storage,
    )?)
}

/// Implements `epochring fill`.
fn cmd_fill(
    config: &BufferConfig,
    points: u64,
    format: &OutputFormat,
    seed: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut ring: RingBuffer<Sample> = RingBuffer::from_config(config)?;
    let seed = seed.unwrap_or_else(rand::random);
    let mut rng = SmallRng::seed_from_u64(seed);
    info!(seed, points, capacity = ring.capacity(), "filling buffer");

    // Samples spread over 1.5 periods centered on now.
    let now = SystemTime::now();
    let spread = u64::try_from(config.period.mul_f64(1.5).as_millis())?.max(1);
    let start = now
        .checked_sub(Duration::from_millis(spread / 2))
        .ok_or("Fill window starts before the epoch")?;

    for _ in 0..points {
        let offset = Duration::from_millis(rng.random_range(0..spread));
        ring.put(Sample {
            datum: Datum::new(start + offset),
            value: rng.random_range(-100.0..100.0),
            count: 1,
        })?;
    }

    let mut window = Vec::new();
    ring.each(|s| window.push(s.clone()));

    let mut walked = Vec::new();
    ring.walk(|s| {
        if s.timestamp() > now {
            return false;
        }
        walked.push(s.clone());
        true
    });

    match format {
        OutputFormat::Csv => {
            println!(
                "# seed={seed}, points={points}, capacity={}, window={}",
                ring.capacity(),
                window.len()
            );
            println!("timestamp,sequence,value,count");
            for sample in &window {
                println!("{}", sample_csv(sample));
            }
            if let Some(latest) = ring.latest() {
                println!("# latest");
                println!("{}", sample_csv(latest));
            }
            println!("# walk until {}", format_time(now));
            for sample in &walked {
                println!("{}", sample_csv(sample));
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "seed": seed,
                "points": points,
                "capacity": ring.capacity(),
                "window": window.iter().map(sample_json).collect::<Vec<_>>(),
                "latest": ring.latest().map(sample_json),
                "walk": walked.iter().map(sample_json).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Implements `epochring bench`.
#[allow(clippy::cast_precision_loss)] // Benchmark stats are display-only
fn cmd_bench(points: u64, period: &str, resolution: &str) -> Result<(), Box<dyn std::error::Error>> {
    let period = parse_duration(period)?;
    let resolution = parse_duration(resolution)?;

    println!("epochring write-path benchmark");
    println!("  Points: {points}");
    println!("  Period: {}", format_duration_secs(period.as_secs()));
    println!("  Resolution: {}", format_duration_secs(resolution.as_secs()));
    println!();

    let start = Instant::now();
    let mut ring: RingBuffer<Datum> = RingBuffer::new(period, resolution, StorageType::Memory)?;
    let construct = start.elapsed();
    println!("Allocated {} slots in {construct:.3?}", ring.capacity());

    let base = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    println!("Putting {points} records...");

    let start = Instant::now();
    for i in 0..points {
        ring.put(Datum::new(base + resolution * u32::try_from(i % u64::from(u32::MAX))?))?;
    }
    let elapsed = start.elapsed();

    let start = Instant::now();
    let mut visited = 0u64;
    ring.each(|_| visited += 1);
    let traversal = start.elapsed();

    let ns_per_put = elapsed.as_nanos() as f64 / points.max(1) as f64;
    let puts_per_sec = points as f64 / elapsed.as_secs_f64();

    println!();
    println!("Results:");
    println!("  Total puts: {points}");
    println!("  Elapsed: {elapsed:.3?}");
    println!("  Avg latency: {ns_per_put:.1} ns/put");
    println!("  Throughput: {puts_per_sec:.0} puts/sec");
    println!("  Traversal: {visited} records in {traversal:.3?}");
    println!();

    Ok(())
}

fn sample_csv(sample: &Sample) -> String {
    format!(
        "{},{},{:.3},{}",
        format_time(sample.timestamp()),
        sample.sequence(),
        sample.value,
        sample.count
    )
}

fn sample_json(sample: &Sample) -> serde_json::Value {
    serde_json::json!({
        "timestamp": format_time(sample.timestamp()),
        "sequence": sample.sequence(),
        "value": sample.value,
        "count": sample.count,
    })
}

/// Parses a human-readable duration string (e.g., "1h", "30m", "7d").
fn parse_duration(s: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let s = s.trim();
    let Some((split, unit)) = s.char_indices().next_back() else {
        return Err("Empty duration string".into());
    };
    let num: u64 = s[..split].parse()?;

    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        _ => return Err(format!("Unknown duration unit: '{unit}'. Use s, m, h, or d.").into()),
    };
    let secs = num
        .checked_mul(scale)
        .ok_or_else(|| format!("Duration '{s}' is too large"))?;

    Ok(Duration::from_secs(secs))
}

/// Parses an instant given as epoch seconds or an RFC 3339 timestamp.
fn parse_instant(s: &str) -> Result<i64, Box<dyn std::error::Error>> {
    let s = s.trim();
    if let Ok(epoch) = s.parse::<i64>() {
        return Ok(epoch);
    }
    let parsed = DateTime::parse_from_rfc3339(s)
        .map_err(|e| format!("Invalid instant '{s}': {e}"))?;
    Ok(parsed.timestamp())
}

/// Formats seconds as a human-readable duration.
fn format_duration_secs(secs: u64) -> String {
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

fn format_epoch(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map_or_else(|| secs.to_string(), |t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn format_time(ts: SystemTime) -> String {
    DateTime::<Utc>::from(ts).to_rfc3339_opts(SecondsFormat::Millis, true)
}
