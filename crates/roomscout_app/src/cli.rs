use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use clap::Parser;
use log::LevelFilter;

/// Collects shared-room listings, enriches them with commute data and stores them.
#[derive(Debug, Clone, Parser)]
#[command(name = "roomscout", version)]
pub struct Cli {
    /// Lowest monthly rent in CHF (200..=1500, steps of 50).
    #[arg(long, default_value_t = 200)]
    pub min_price: u32,

    /// Highest monthly rent in CHF (200..=1500, steps of 50).
    #[arg(long, default_value_t = 1500)]
    pub max_price: u32,

    /// Region value of the search form.
    #[arg(long, default_value = "zurich-stadt")]
    pub region: String,

    /// Only unlimited rentals.
    #[arg(long)]
    pub permanent_only: bool,

    /// Show the browser window instead of running headless.
    #[arg(long)]
    pub headed: bool,

    /// Parent of the per-run diagnostics directories.
    #[arg(long, default_value = "diagnostics")]
    pub diagnostics_dir: PathBuf,

    /// Browser profile kept between runs.
    #[arg(long, default_value = ".browser-profile")]
    pub profile_dir: PathBuf,

    /// JSON listing store.
    #[arg(long, default_value = "data/listings.json")]
    pub store: PathBuf,

    /// Skip the browser search of wgzimmer.ch.
    #[arg(long)]
    pub skip_search: bool,

    /// Skip the woko.ch and students.ch list pages.
    #[arg(long)]
    pub skip_sources: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    /// `diagnostics_dir/run_YYYYmmdd_HHMMSS` for a run started at `started`.
    pub fn run_dir<Tz: TimeZone>(&self, started: DateTime<Tz>) -> PathBuf
    where
        Tz::Offset: std::fmt::Display,
    {
        run_dir_in(&self.diagnostics_dir, started)
    }
}

fn run_dir_in<Tz: TimeZone>(parent: &Path, started: DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    parent.join(format!("run_{}", started.format("%Y%m%d_%H%M%S")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn defaults_match_a_full_zurich_search() {
        let cli = Cli::try_parse_from(["roomscout"]).unwrap();
        assert_eq!((cli.min_price, cli.max_price), (200, 1500));
        assert_eq!(cli.region, "zurich-stadt");
        assert!(!cli.permanent_only);
        assert!(!cli.headed);
        assert_eq!(cli.log_level(), LevelFilter::Info);
    }

    #[test]
    fn flags_are_parsed() {
        let cli = Cli::try_parse_from([
            "roomscout",
            "--min-price",
            "400",
            "--max-price",
            "900",
            "--permanent-only",
            "--skip-sources",
            "--store",
            "/tmp/rooms.json",
            "-v",
        ])
        .unwrap();
        assert_eq!((cli.min_price, cli.max_price), (400, 900));
        assert!(cli.permanent_only);
        assert!(cli.skip_sources);
        assert!(!cli.skip_search);
        assert_eq!(cli.store, PathBuf::from("/tmp/rooms.json"));
        assert_eq!(cli.log_level(), LevelFilter::Debug);
    }

    #[test]
    fn run_dir_is_timestamped() {
        let started = Utc.with_ymd_and_hms(2025, 5, 12, 8, 3, 9).unwrap();
        let cli = Cli::try_parse_from(["roomscout", "--diagnostics-dir", "diag"]).unwrap();
        assert_eq!(
            cli.run_dir(started),
            PathBuf::from("diag").join("run_20250512_080309")
        );
    }
}
