//! Rows read from the operational schema.
//!
//! Each row is already denormalized the way the mirror needs it: films carry
//! their language name, stores and customers their city and country, rentals
//! the film and store of the rented inventory item, payments the store of
//! the staff member who took them.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::keys::{ChangedKeys, NaturalKey};

/// A source row that can be change-detected by timestamp.
pub trait SourceRow: Send + Sync {
    fn natural_key(&self) -> NaturalKey;
    fn last_update(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilmRow {
    pub film_id: NaturalKey,
    pub title: String,
    pub rating: Option<String>,
    pub length: Option<i64>,
    /// Name of the film's language.
    pub language: String,
    pub release_year: Option<i64>,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActorRow {
    pub actor_id: NaturalKey,
    pub first_name: String,
    pub last_name: String,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRow {
    pub category_id: NaturalKey,
    pub name: String,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreRow {
    pub store_id: NaturalKey,
    pub city: String,
    pub country: String,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRow {
    pub customer_id: NaturalKey,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
    pub city: String,
    pub country: String,
    pub last_update: NaiveDateTime,
}

/// One row of a many-to-many association table.
///
/// `left` is always the film id; `right` is the actor or category id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AssociationRow {
    pub left: NaturalKey,
    pub right: NaturalKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RentalRow {
    pub rental_id: NaturalKey,
    pub rental_date: NaiveDateTime,
    pub return_date: Option<NaiveDateTime>,
    pub customer_id: NaturalKey,
    pub staff_id: i64,
    /// Film of the rented inventory item.
    pub film_id: NaturalKey,
    /// Store holding the rented inventory item.
    pub store_id: NaturalKey,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRow {
    pub payment_id: NaturalKey,
    pub payment_date: NaiveDateTime,
    pub customer_id: NaturalKey,
    pub staff_id: i64,
    /// Store of the staff member who took the payment.
    pub store_id: NaturalKey,
    pub amount: Decimal,
    pub last_update: NaiveDateTime,
}

macro_rules! source_row {
    ($row:ty, $key:ident) => {
        impl SourceRow for $row {
            fn natural_key(&self) -> NaturalKey {
                self.$key
            }

            fn last_update(&self) -> NaiveDateTime {
                self.last_update
            }
        }
    };
}

source_row!(FilmRow, film_id);
source_row!(ActorRow, actor_id);
source_row!(CategoryRow, category_id);
source_row!(StoreRow, store_id);
source_row!(CustomerRow, customer_id);
source_row!(RentalRow, rental_id);
source_row!(PaymentRow, payment_id);

/// Which association rows to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationFilter {
    /// Every row (full rebuild).
    All,
    /// Rows whose left key is in `left` OR whose right key is in `right`.
    /// At least one of the two sets is non-empty.
    Touching {
        left: ChangedKeys,
        right: ChangedKeys,
    },
}

impl AssociationFilter {
    /// Filter for rows touching the changed keys of either endpoint, or
    /// `None` when neither endpoint changed.
    pub fn touching(left: &ChangedKeys, right: &ChangedKeys) -> Option<Self> {
        if left.is_empty() && right.is_empty() {
            return None;
        }
        Some(AssociationFilter::Touching {
            left: left.clone(),
            right: right.clone(),
        })
    }

    pub fn matches(&self, row: &AssociationRow) -> bool {
        match self {
            AssociationFilter::All => true,
            AssociationFilter::Touching { left, right } => {
                left.contains(&row.left) || right.contains(&row.right)
            }
        }
    }
}

/// Read access to the operational schema.
///
/// `since` selects rows whose `last_update` is strictly greater than the
/// given watermark; `None` selects every row. Implementations never write.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Round-trip a trivial query to prove connectivity.
    async fn ping(&self) -> Result<()>;

    async fn films(&self, since: Option<NaiveDateTime>) -> Result<Vec<FilmRow>>;

    async fn actors(&self, since: Option<NaiveDateTime>) -> Result<Vec<ActorRow>>;

    async fn categories(&self, since: Option<NaiveDateTime>) -> Result<Vec<CategoryRow>>;

    async fn stores(&self, since: Option<NaiveDateTime>) -> Result<Vec<StoreRow>>;

    async fn customers(&self, since: Option<NaiveDateTime>) -> Result<Vec<CustomerRow>>;

    /// `film_actor` rows as (film_id, actor_id).
    async fn film_actors(&self, filter: &AssociationFilter) -> Result<Vec<AssociationRow>>;

    /// `film_category` rows as (film_id, category_id).
    async fn film_categories(&self, filter: &AssociationFilter) -> Result<Vec<AssociationRow>>;

    async fn rentals(&self, since: Option<NaiveDateTime>) -> Result<Vec<RentalRow>>;

    async fn payments(&self, since: Option<NaiveDateTime>) -> Result<Vec<PaymentRow>>;

    /// Number of rentals with `rental_date >= cutoff`.
    async fn rental_count_since(&self, cutoff: NaiveDateTime) -> Result<i64>;

    /// Sum of payment amounts with `payment_date >= cutoff`.
    async fn payment_total_since(&self, cutoff: NaiveDateTime) -> Result<Decimal>;

    /// Same sum grouped by the store of the staff member.
    async fn payment_totals_by_store_since(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<BTreeMap<NaturalKey, Decimal>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touching_requires_a_change() {
        let empty = ChangedKeys::new();
        assert_eq!(AssociationFilter::touching(&empty, &empty), None);
    }

    #[test]
    fn test_touching_is_an_or_of_both_sides() {
        let films: ChangedKeys = [1].into_iter().collect();
        let actors: ChangedKeys = [9].into_iter().collect();
        let filter = AssociationFilter::touching(&films, &actors).unwrap();

        assert!(filter.matches(&AssociationRow { left: 1, right: 2 }));
        assert!(filter.matches(&AssociationRow { left: 5, right: 9 }));
        assert!(!filter.matches(&AssociationRow { left: 5, right: 2 }));
    }

    #[test]
    fn test_single_sided_filter() {
        let films = ChangedKeys::new();
        let actors: ChangedKeys = [3].into_iter().collect();
        let filter = AssociationFilter::touching(&films, &actors).unwrap();

        assert!(filter.matches(&AssociationRow { left: 100, right: 3 }));
        assert!(!filter.matches(&AssociationRow { left: 100, right: 4 }));
        assert!(AssociationFilter::All.matches(&AssociationRow { left: 0, right: 0 }));
    }
}
