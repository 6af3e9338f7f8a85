//! Reconciliation between source and mirror aggregates.
//!
//! Three checks run over a trailing window ending now:
//!
//! 1. rental count, reported but never fatal;
//! 2. total payment amount, compared within a tolerance;
//! 3. payment amount per store, over the union of stores seen on either side.
//!
//! Every check is evaluated and reported before the outcome is decided.

use anyhow::Result;
use chrono::{Duration, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

use star_core::{date_key, DateKey, DimStore, MirrorStore, NaturalKey, SourceReader, SurrogateKey};

pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Default absolute tolerance on amount comparisons.
pub fn default_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Mirror amounts are stored as `f64`; this many decimal places survive the
/// conversion back.
const MIRROR_AMOUNT_SCALE: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
    pub window_days: i64,
    pub tolerance: Decimal,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            tolerance: default_tolerance(),
        }
    }
}

/// Current time as a naive UTC timestamp, the `now` the CLI validates at.
pub fn validation_now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Longest accepted reconciliation window.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Start of the window: `now - window_days`, plus the date key of that day.
///
/// The source side filters on the exact cutoff; the mirror only knows days,
/// so it counts the whole cutoff day.
pub fn window_start(now: NaiveDateTime, window_days: i64) -> Result<(NaiveDateTime, DateKey)> {
    if !(0..=MAX_WINDOW_DAYS).contains(&window_days) {
        anyhow::bail!("Window must be between 0 and {MAX_WINDOW_DAYS} days, got {window_days}");
    }
    let cutoff = Duration::try_days(window_days)
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| anyhow::anyhow!("Window of {window_days} days before {now} is out of range"))?;
    Ok((cutoff, date_key(cutoff.date())))
}

pub fn within_tolerance(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}

/// Convert a mirror `f64` amount for exact comparison.
pub fn mirror_amount(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp(MIRROR_AMOUNT_SCALE)
}

/// Group identifier of a per-store comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StoreGroup {
    /// A source store id, or a mirror store key that maps back to one.
    Store(NaturalKey),
    /// A mirror store key with no `dim_store` row.
    UnknownKey(SurrogateKey),
}

impl fmt::Display for StoreGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreGroup::Store(id) => write!(f, "store {id}"),
            StoreGroup::UnknownKey(key) => write!(f, "unknown store_key {key}"),
        }
    }
}

/// One line of the reconciliation report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    RentalCount {
        source: i64,
        mirror: i64,
    },
    PaymentTotal {
        source: Decimal,
        mirror: Decimal,
        passed: bool,
    },
    StoreTotal {
        group: StoreGroup,
        source: Decimal,
        mirror: Decimal,
        passed: bool,
    },
}

impl Check {
    /// Whether this check makes the run fail.
    pub fn is_failure(&self) -> bool {
        match self {
            Check::RentalCount { .. } => false,
            Check::PaymentTotal { passed, .. } | Check::StoreTotal { passed, .. } => !passed,
        }
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "OK"
    } else {
        "MISMATCH"
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::RentalCount { source, mirror } => write!(
                f,
                "Rental count: source={source} mirror={mirror} [{}]",
                status(source == mirror)
            ),
            Check::PaymentTotal {
                source,
                mirror,
                passed,
            } => write!(
                f,
                "Payment total: source={source} mirror={mirror} diff={} [{}]",
                (source - mirror).abs(),
                status(*passed)
            ),
            Check::StoreTotal {
                group,
                source,
                mirror,
                passed,
            } => write!(
                f,
                "Payment total for {group}: source={source} mirror={mirror} diff={} [{}]",
                (source - mirror).abs(),
                status(*passed)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub window_start: NaiveDateTime,
    pub checks: Vec<Check>,
}

impl ReconcileReport {
    pub fn passed(&self) -> bool {
        !self.checks.iter().any(Check::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| c.is_failure())
    }

    pub fn lines(&self) -> Vec<String> {
        self.checks.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("reconciliation failed: {failed} comparison(s) outside tolerance {tolerance}")]
    OutOfTolerance {
        failed: usize,
        tolerance: Decimal,
        report: ReconcileReport,
    },
}

/// Compare per-store totals over the union of groups on both sides; a group
/// missing on one side counts as zero there.
pub fn compare_groups(
    source: &BTreeMap<StoreGroup, Decimal>,
    mirror: &BTreeMap<StoreGroup, Decimal>,
    tolerance: Decimal,
) -> Vec<Check> {
    let groups: BTreeSet<StoreGroup> = source.keys().chain(mirror.keys()).copied().collect();
    groups
        .into_iter()
        .map(|group| {
            let s = source.get(&group).copied().unwrap_or_default();
            let m = mirror.get(&group).copied().unwrap_or_default();
            Check::StoreTotal {
                group,
                source: s,
                mirror: m,
                passed: within_tolerance(s, m, tolerance),
            }
        })
        .collect()
}

/// Run every comparison and log one line per check.
///
/// Returns the report when everything is within tolerance and
/// [`ReconcileError::OutOfTolerance`] otherwise, always after all checks ran.
pub async fn reconcile<S, M>(
    source: &S,
    mirror: &M,
    opts: ValidateOptions,
    now: NaiveDateTime,
) -> Result<ReconcileReport>
where
    S: SourceReader,
    M: MirrorStore,
{
    let (start, start_key) = window_start(now, opts.window_days)?;
    info!(
        window_days = opts.window_days,
        %start,
        tolerance = %opts.tolerance,
        "Reconciling source and mirror"
    );
    let mut checks = Vec::new();

    checks.push(Check::RentalCount {
        source: source.rental_count_since(start).await?,
        mirror: mirror.rental_count_since(start_key).await?,
    });

    let source_total = source.payment_total_since(start).await?;
    let mirror_total = mirror_amount(mirror.payment_total_since(start_key).await?);
    checks.push(Check::PaymentTotal {
        source: source_total,
        mirror: mirror_total,
        passed: within_tolerance(source_total, mirror_total, opts.tolerance),
    });

    let source_groups: BTreeMap<StoreGroup, Decimal> = source
        .payment_totals_by_store_since(start)
        .await?
        .into_iter()
        .map(|(store_id, total)| (StoreGroup::Store(store_id), total))
        .collect();
    let store_ids = mirror.key_map::<DimStore>().await?.inverse();
    let mut mirror_groups: BTreeMap<StoreGroup, Decimal> = BTreeMap::new();
    for (store_key, total) in mirror.payment_totals_by_store_key_since(start_key).await? {
        let group = match store_ids.get(&store_key) {
            Some(id) => StoreGroup::Store(*id),
            None => StoreGroup::UnknownKey(store_key),
        };
        *mirror_groups.entry(group).or_default() += mirror_amount(total);
    }
    checks.extend(compare_groups(&source_groups, &mirror_groups, opts.tolerance));

    let report = ReconcileReport {
        window_start: start,
        checks,
    };
    for check in &report.checks {
        if check.is_failure() {
            warn!("{check}");
        } else {
            info!("{check}");
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        return Err(ReconcileError::OutOfTolerance {
            failed,
            tolerance: opts.tolerance,
            report,
        }
        .into());
    }
    info!("Reconciliation passed");
    Ok(report)
}
