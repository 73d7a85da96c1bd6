//! Deterministic synthetic trace generator.
//!
//! Produces a trace directory plus the geolocation table that resolves it,
//! so a playback can run without captured data. Everything derives from one
//! seed:
//! - Host placement: a handful of sites, some hosts exactly on a site
//!   (so consolidation has something to merge), the rest scattered around it
//! - Response times: log-normal (via `StandardNormal`), in milliseconds
//! - Unreached probes: a fixed fraction, each naming a reachable fallback host
//!
//! File layout:
//!
//! ```text
//! <dir>/20_01_01-00:00    network: ip \t timestamp \t response \t fallback \t proto
//! <dir>/20_01_01-01:00    web:     ip \t timestamp \t bytes \t WEB
//! ...
//! <dir>/geo.tsv           ip \t lat \t lon
//! ```

use netviz_core::TimeStamp;
use netviz_env::LatLon;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the geolocation table written next to the traces.
pub const GEO_TABLE_NAME: &str = "geo.tsv";

/// Network protocol tags used for non-web lines.
const NETWORK_PROTOCOLS: [&str; 3] = ["ICMP", "TCP", "UDP"];

/// Standard deviation of host placement around a site, in degrees.
const SCATTER_DEG: f64 = 2.0;

/// Log-normal response time parameters.
const RESPONSE_MEDIAN_MS: f64 = 80.0;
const RESPONSE_SIGMA: f64 = 0.8;

/// Anchor coordinates hosts cluster around.
const SITES: [(f64, f64); 8] = [
    (40.71, -74.01),
    (51.51, -0.13),
    (35.68, 139.69),
    (-23.55, -46.63),
    (52.52, 13.40),
    (1.35, 103.82),
    (-33.87, 151.21),
    (37.77, -122.42),
];

/// Generator parameters.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    /// Output directory (created if missing)
    pub directory: PathBuf,

    /// Timestamp of the first file; later files follow hourly
    pub start: TimeStamp,

    /// Number of trace files
    pub files: usize,

    /// Lines per file
    pub records_per_file: usize,

    /// Distinct hosts
    pub hosts: usize,

    /// Fraction of network probes that go unreached
    pub unreached_fraction: f64,

    /// Fraction of lines that are web traffic
    pub web_fraction: f64,

    /// Master seed
    pub seed: u64,
}

impl SynthConfig {
    pub fn new(directory: impl Into<PathBuf>, start: TimeStamp, files: usize, seed: u64) -> Self {
        Self {
            directory: directory.into(),
            start,
            files,
            records_per_file: 40,
            hosts: 48,
            unreached_fraction: 0.1,
            web_fraction: 0.2,
            seed,
        }
    }

    pub fn with_records_per_file(mut self, records: usize) -> Self {
        self.records_per_file = records;
        self
    }

    pub fn with_hosts(mut self, hosts: usize) -> Self {
        self.hosts = hosts.max(2);
        self
    }
}

/// A generated host.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthHost {
    pub ip: String,
    pub location: LatLon,
}

/// Summary of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthSummary {
    pub files: Vec<PathBuf>,
    pub geo_table: PathBuf,
    pub lines: usize,
    pub unreached: usize,
    pub web: usize,
}

/// Writes synthetic traces.
pub struct TraceSynthesizer {
    config: SynthConfig,
    rng: ChaCha8Rng,
    hosts: Vec<SynthHost>,
}

impl TraceSynthesizer {
    /// Creates a generator and places its hosts.
    pub fn new(config: SynthConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let hosts = Self::place_hosts(&mut rng, config.hosts.max(2));
        Self { config, rng, hosts }
    }

    fn place_hosts(rng: &mut ChaCha8Rng, count: usize) -> Vec<SynthHost> {
        (0..count)
            .map(|i| {
                let (lat, lon) = SITES[i % SITES.len()];
                // Every third host sits exactly on its site
                let location = if i % 3 == 0 {
                    LatLon::new(lat, lon)
                } else {
                    let dlat: f64 = rng.sample(StandardNormal);
                    let dlon: f64 = rng.sample(StandardNormal);
                    LatLon::new(
                        (lat + SCATTER_DEG * dlat).clamp(-90.0, 90.0),
                        (lon + SCATTER_DEG * dlon).clamp(-180.0, 180.0),
                    )
                };
                SynthHost {
                    ip: format!("10.{}.{}.{}", i / 62500 % 256, i / 250 % 250, i % 250 + 1),
                    location,
                }
            })
            .collect()
    }

    pub fn hosts(&self) -> &[SynthHost] {
        &self.hosts
    }

    /// Renders the geolocation table.
    pub fn geo_table(&self) -> String {
        let mut text = String::from("# ip\tlat\tlon\n");
        for host in &self.hosts {
            let _ = writeln!(text, "{}\t{:.4}\t{:.4}", host.ip, host.location.lat, host.location.lon);
        }
        text
    }

    /// Renders the trace file for `timestamp`.
    ///
    /// Returns the text plus (unreached, web) line counts.
    pub fn trace_file(&mut self, timestamp: TimeStamp) -> (String, usize, usize) {
        let raw = timestamp.to_string();

        let mut text = String::new();
        let mut unreached = 0;
        let mut web = 0;

        for _ in 0..self.config.records_per_file {
            let index = self.rng.gen_range(0..self.hosts.len());
            let ip = &self.hosts[index].ip;

            if self.rng.gen_bool(self.config.web_fraction.clamp(0.0, 1.0)) {
                let bytes = self.rng.gen_range(512..65536);
                let _ = writeln!(text, "{}\t{}\t{}\tWEB", ip, raw, bytes);
                web += 1;
                continue;
            }

            let protocol = NETWORK_PROTOCOLS.choose(&mut self.rng).copied().unwrap_or("TCP");
            if self.rng.gen_bool(self.config.unreached_fraction.clamp(0.0, 1.0)) {
                let mut fallback = self.rng.gen_range(0..self.hosts.len());
                if fallback == index {
                    fallback = (fallback + 1) % self.hosts.len();
                }
                let _ = writeln!(
                    text,
                    "{}\t{}\t-1\t{}\t{}",
                    ip, raw, self.hosts[fallback].ip, protocol
                );
                unreached += 1;
            } else {
                // Log-normal around the median response
                let z: f64 = self.rng.sample(StandardNormal);
                let response = (RESPONSE_MEDIAN_MS.ln() + RESPONSE_SIGMA * z).exp();
                let _ = writeln!(text, "{}\t{}\t{:.1}\t0\t{}", ip, raw, response, protocol);
            }
        }

        (text, unreached, web)
    }

    /// Writes every trace file and the geolocation table.
    pub fn write(&mut self) -> io::Result<SynthSummary> {
        let directory = self.config.directory.clone();
        fs::create_dir_all(&directory)?;

        let mut summary = SynthSummary {
            geo_table: directory.join(GEO_TABLE_NAME),
            ..SynthSummary::default()
        };

        let mut timestamp = self.config.start;
        for _ in 0..self.config.files {
            let (text, unreached, web) = self.trace_file(timestamp);
            let path = directory.join(timestamp.to_string());
            fs::write(&path, text)?;
            debug!("Wrote {}", path.display());

            summary.lines += self.config.records_per_file;
            summary.unreached += unreached;
            summary.web += web;
            summary.files.push(path);

            timestamp = timestamp.advanced_by(60);
        }

        fs::write(&summary.geo_table, self.geo_table())?;

        info!(
            "Synthesized {} files ({} lines, {} unreached, {} web) and {} hosts in {}",
            summary.files.len(),
            summary.lines,
            summary.unreached,
            summary.web,
            self.hosts.len(),
            directory.display()
        );
        Ok(summary)
    }
}

/// Default geolocation table location for a trace directory.
pub fn default_geo_table(directory: &Path) -> PathBuf {
    directory.join(GEO_TABLE_NAME)
}
