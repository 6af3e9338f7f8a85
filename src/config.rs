//! Command-line options shared by the subcommands.

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use rust_decimal::Decimal;
use std::str::FromStr;

use star_core::DateRange;
use star_sync_mysql_source::SourceOpts;
use surreal_mirror::{MirrorOpts, DEFAULT_MIRROR_URL};

use crate::reconcile::{ValidateOptions, DEFAULT_WINDOW_DAYS, MAX_WINDOW_DAYS};

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{s}', expected YYYY-MM-DD"))
}

/// Parse a non-negative decimal tolerance such as `0.01`.
pub fn parse_tolerance(s: &str) -> anyhow::Result<Decimal> {
    let value =
        Decimal::from_str(s.trim()).with_context(|| format!("Invalid tolerance value: {s}"))?;
    if value.is_sign_negative() {
        anyhow::bail!("Tolerance must not be negative: {s}");
    }
    Ok(value)
}

#[derive(Parser, Clone, Debug)]
pub struct SourceArgs {
    /// MySQL connection URL of the Sakila database
    #[arg(long, env = "MYSQL_URL")]
    pub source_url: String,
}

impl From<&SourceArgs> for SourceOpts {
    fn from(args: &SourceArgs) -> Self {
        Self {
            source_uri: args.source_url.clone(),
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct MirrorArgs {
    /// SurrealDB endpoint of the analytical mirror
    #[arg(long, default_value = DEFAULT_MIRROR_URL, env = "MIRROR_URL")]
    pub mirror_url: String,

    #[arg(long, default_value = "analytics", env = "MIRROR_NAMESPACE")]
    pub mirror_namespace: String,

    #[arg(long, default_value = "sakila", env = "MIRROR_DATABASE")]
    pub mirror_database: String,

    /// Root username, only for remote servers
    #[arg(long, env = "MIRROR_USERNAME")]
    pub mirror_username: Option<String>,

    #[arg(long, env = "MIRROR_PASSWORD", requires = "mirror_username")]
    pub mirror_password: Option<String>,
}

impl From<&MirrorArgs> for MirrorOpts {
    fn from(args: &MirrorArgs) -> Self {
        Self {
            mirror_url: args.mirror_url.clone(),
            namespace: args.mirror_namespace.clone(),
            database: args.mirror_database.clone(),
            username: args.mirror_username.clone(),
            password: args.mirror_password.clone(),
        }
    }
}

#[derive(Parser, Clone, Debug)]
pub struct DateRangeArgs {
    /// First day of the date dimension
    #[arg(long, default_value = "2000-01-01", value_parser = parse_date)]
    pub date_from: NaiveDate,

    /// Last day of the date dimension, inclusive
    #[arg(long, default_value = "2030-12-31", value_parser = parse_date)]
    pub date_to: NaiveDate,
}

impl DateRangeArgs {
    pub fn range(&self) -> anyhow::Result<DateRange> {
        Ok(DateRange::new(self.date_from, self.date_to)?)
    }
}

#[derive(Parser, Clone, Debug)]
pub struct ValidateArgs {
    /// Length of the trailing reconciliation window in days
    #[arg(
        long,
        default_value_t = DEFAULT_WINDOW_DAYS,
        value_parser = clap::value_parser!(i64).range(0..=MAX_WINDOW_DAYS)
    )]
    pub days: i64,

    /// Largest accepted absolute difference between amounts
    #[arg(long, default_value = "0.01", value_parser = parse_tolerance)]
    pub tolerance: Decimal,
}

impl From<&ValidateArgs> for ValidateOptions {
    fn from(args: &ValidateArgs) -> Self {
        Self {
            window_days: args.days,
            tolerance: args.tolerance,
        }
    }
}
