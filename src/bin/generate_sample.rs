use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use parquet::arrow::ArrowWriter;

use soil_dashboard::config::ColumnMapping;

/// Write a synthetic soil monitoring table (CSV and Parquet) and the matching
/// geocoded municipalities CSV.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Output directory
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// (municipality, latitude, longitude); `None` mimics a failed geocode.
const SITES: [(&str, Option<(f64, f64)>); 12] = [
    ("Zürich", Some((47.3769, 8.5417))),
    ("Basel", Some((47.5596, 7.5886))),
    ("Bern", Some((46.9480, 7.4474))),
    ("Genève", Some((46.2044, 6.1432))),
    ("Lausanne", Some((46.5197, 6.6323))),
    ("Luzern", Some((47.0502, 8.3093))),
    ("St. Gallen", Some((47.4245, 9.3767))),
    ("Lugano", Some((46.0037, 8.9511))),
    ("Sion", Some((46.2331, 7.3606))),
    ("Chur", Some((46.8508, 9.5320))),
    ("Biel/Bienne", Some((47.1368, 7.2468))),
    ("Val-de-Travers", None),
];

/// (metal, typical concentration in mg/kg DM)
const METALS: [(&str, f64); 8] = [
    ("Cadmium", 0.3),
    ("Cobalt", 8.0),
    ("Chromium", 30.0),
    ("Copper", 25.0),
    ("Mercury", 0.1),
    ("Nickel", 25.0),
    ("Lead", 28.0),
    ("Zinc", 65.0),
];

/// (land use, multiplier on the typical concentration)
const LAND_USES: [(&str, f64); 5] = [
    ("Arable land", 1.0),
    ("Grassland", 0.9),
    ("Forest", 1.2),
    ("Vineyard", 2.5),
    ("Urban", 1.6),
];

/// NABO-style five-year sampling campaigns.
const FIRST_CAMPAIGN: i32 = 1985;
const CAMPAIGNS: i32 = 7;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

struct Row {
    municipality: &'static str,
    heavy_metal: &'static str,
    land_use: &'static str,
    year: i32,
    concentration: f64,
    sampling_period: String,
    sampling_date: String,
}

fn generate(rng: &mut SimpleRng) -> Vec<Row> {
    let mut rows = Vec::new();

    for (site_idx, &(municipality, _)) in SITES.iter().enumerate() {
        // Each site monitors two or three land uses
        let first_use = site_idx % LAND_USES.len();
        let use_count = 2 + (site_idx % 2);
        let site_factor = rng.gauss(1.0, 0.2).max(0.4);

        for campaign in 0..CAMPAIGNS {
            let period_start = FIRST_CAMPAIGN + campaign * 5;
            let sampling_period = format!("{}-{}", period_start, period_start + 4);
            let year = period_start + rng.below(5) as i32;
            let sampling_date = format!("{year}-{:02}-{:02}", 4 + rng.below(6), 1 + rng.below(28));
            // Slow downward trend for most metals after lead-free fuel
            let trend = 1.0 - 0.02 * campaign as f64;

            for u in 0..use_count {
                let (land_use, use_factor) = LAND_USES[(first_use + u) % LAND_USES.len()];
                for &(heavy_metal, typical) in &METALS {
                    let mean = typical * use_factor * site_factor * trend;
                    let concentration = rng.gauss(mean, mean * 0.15).max(typical * 0.01);
                    rows.push(Row {
                        municipality,
                        heavy_metal,
                        land_use,
                        year,
                        concentration: (concentration * 1000.0).round() / 1000.0,
                        sampling_period: sampling_period.clone(),
                        sampling_date: sampling_date.clone(),
                    });
                }
            }
        }
    }
    rows
}

fn write_csv(path: &PathBuf, rows: &[Row], columns: &ColumnMapping) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record([
        &columns.municipality,
        &columns.heavy_metal,
        &columns.land_use,
        &columns.year,
        &columns.concentration,
        &columns.sampling_period,
        &columns.sampling_date,
    ])?;
    for r in rows {
        writer.write_record([
            r.municipality.to_string(),
            r.heavy_metal.to_string(),
            r.land_use.to_string(),
            r.year.to_string(),
            r.concentration.to_string(),
            r.sampling_period.clone(),
            r.sampling_date.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &PathBuf, rows: &[Row], columns: &ColumnMapping) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new(columns.municipality.as_str(), DataType::Utf8, false),
        Field::new(columns.heavy_metal.as_str(), DataType::Utf8, false),
        Field::new(columns.land_use.as_str(), DataType::Utf8, false),
        Field::new(columns.year.as_str(), DataType::Int32, false),
        Field::new(columns.concentration.as_str(), DataType::Float64, false),
        Field::new(columns.sampling_period.as_str(), DataType::Utf8, true),
        Field::new(columns.sampling_date.as_str(), DataType::Utf8, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.municipality))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.heavy_metal))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.land_use))),
            Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
            Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.concentration))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.sampling_period.as_str()))),
            Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.sampling_date.as_str()))),
        ],
    )
    .context("Failed to create RecordBatch")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn write_geocoded(path: &PathBuf) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["Municipality", "Latitude", "Longitude"])?;
    for (municipality, coords) in SITES {
        let (lat, lon) = match coords {
            Some((lat, lon)) => (lat.to_string(), lon.to_string()),
            None => (String::new(), String::new()),
        };
        writer.write_record([municipality.to_string(), lat, lon])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let columns = ColumnMapping::default();

    let mut rng = SimpleRng::new(args.seed);
    let rows = generate(&mut rng);

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let csv_path = args.out_dir.join("data.csv");
    write_csv(&csv_path, &rows, &columns)?;
    let parquet_path = args.out_dir.join("data.parquet");
    write_parquet(&parquet_path, &rows, &columns)?;
    let geocoded_path = args.out_dir.join("municipalities_geocoded.csv");
    write_geocoded(&geocoded_path)?;

    log::info!("Wrote {} measurements for {} municipalities", rows.len(), SITES.len());
    println!(
        "Wrote {} rows to {} and {}, coordinates to {}",
        rows.len(),
        csv_path.display(),
        parquet_path.display(),
        geocoded_path.display()
    );
    Ok(())
}
