//! Records owned by the mirror and the store that holds them.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::Debug;

use crate::batch::{BridgeBatch, RecordBatch};
use crate::date::{date_key, date_key_of, duration_days, DateKey, DimDate};
use crate::keys::{DimensionKeys, KeyMap, NaturalKey, SurrogateKey};
use crate::source::{
    ActorRow, CategoryRow, CustomerRow, FilmRow, PaymentRow, RentalRow, SourceRow, StoreRow,
};

/// A mirror row addressed by a surrogate key and unique per natural key.
pub trait MirrorRecord:
    Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static
{
    /// Mirror table name.
    const TABLE: &'static str;
    /// Field holding the surrogate key.
    const SURROGATE_FIELD: &'static str;
    /// Field holding the natural key.
    const NATURAL_FIELD: &'static str;

    fn surrogate_key(&self) -> SurrogateKey;
    fn natural_key(&self) -> NaturalKey;
}

/// A dimension row, built from one (joined) source row.
pub trait DimensionRecord: MirrorRecord {
    type Source: SourceRow;

    /// Source table whose watermark scopes this dimension.
    const SOURCE_TABLE: &'static str;

    fn denormalize(row: &Self::Source, key: SurrogateKey) -> Self;
}

/// A fact row, built from one source transaction once every dimension it
/// references has resolved.
pub trait FactRecord: MirrorRecord {
    type Source: SourceRow;
    /// Surrogate keys of the referenced dimensions.
    type Refs: Send;

    const SOURCE_TABLE: &'static str;

    /// `None` when any referenced dimension is missing from the mirror.
    fn resolve(row: &Self::Source, dims: &DimensionKeys) -> Option<Self::Refs>;

    fn build(row: &Self::Source, refs: Self::Refs, key: SurrogateKey) -> Self;
}

/// A many-to-many association between two dimensions.
pub trait BridgeRecord:
    Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static
{
    const TABLE: &'static str;
    const LEFT_FIELD: &'static str;
    const RIGHT_FIELD: &'static str;

    fn pair(left: SurrogateKey, right: SurrogateKey) -> Self;
    fn left(&self) -> SurrogateKey;
    fn right(&self) -> SurrogateKey;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimFilm {
    pub film_key: SurrogateKey,
    pub film_id: NaturalKey,
    pub title: String,
    pub rating: Option<String>,
    pub length: Option<i64>,
    pub language: String,
    pub release_year: Option<i64>,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimActor {
    pub actor_key: SurrogateKey,
    pub actor_id: NaturalKey,
    pub first_name: String,
    pub last_name: String,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimCategory {
    pub category_key: SurrogateKey,
    pub category_id: NaturalKey,
    pub name: String,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimStore {
    pub store_key: SurrogateKey,
    pub store_id: NaturalKey,
    pub city: String,
    pub country: String,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimCustomer {
    pub customer_key: SurrogateKey,
    pub customer_id: NaturalKey,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
    pub city: String,
    pub country: String,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BridgeFilmActor {
    pub film_key: SurrogateKey,
    pub actor_key: SurrogateKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BridgeFilmCategory {
    pub film_key: SurrogateKey,
    pub category_key: SurrogateKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRental {
    pub fact_rental_key: SurrogateKey,
    pub rental_id: NaturalKey,
    pub date_key_rented: DateKey,
    pub date_key_returned: Option<DateKey>,
    pub film_key: SurrogateKey,
    pub store_key: SurrogateKey,
    pub customer_key: SurrogateKey,
    pub staff_id: i64,
    pub rental_duration_days: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactPayment {
    pub fact_payment_key: SurrogateKey,
    pub payment_id: NaturalKey,
    pub date_key_paid: DateKey,
    pub customer_key: SurrogateKey,
    pub store_key: SurrogateKey,
    pub staff_id: i64,
    pub amount: f64,
}

macro_rules! mirror_record {
    ($record:ty, $table:literal, $surrogate:ident, $natural:ident) => {
        impl MirrorRecord for $record {
            const TABLE: &'static str = $table;
            const SURROGATE_FIELD: &'static str = stringify!($surrogate);
            const NATURAL_FIELD: &'static str = stringify!($natural);

            fn surrogate_key(&self) -> SurrogateKey {
                self.$surrogate
            }

            fn natural_key(&self) -> NaturalKey {
                self.$natural
            }
        }
    };
}

mirror_record!(DimFilm, "dim_film", film_key, film_id);
mirror_record!(DimActor, "dim_actor", actor_key, actor_id);
mirror_record!(DimCategory, "dim_category", category_key, category_id);
mirror_record!(DimStore, "dim_store", store_key, store_id);
mirror_record!(DimCustomer, "dim_customer", customer_key, customer_id);
mirror_record!(FactRental, "fact_rental", fact_rental_key, rental_id);
mirror_record!(FactPayment, "fact_payment", fact_payment_key, payment_id);

impl DimensionRecord for DimFilm {
    type Source = FilmRow;
    const SOURCE_TABLE: &'static str = "film";

    fn denormalize(row: &FilmRow, key: SurrogateKey) -> Self {
        Self {
            film_key: key,
            film_id: row.film_id,
            title: row.title.clone(),
            rating: row.rating.clone(),
            length: row.length,
            language: row.language.clone(),
            release_year: row.release_year,
            last_update: row.last_update,
        }
    }
}

impl DimensionRecord for DimActor {
    type Source = ActorRow;
    const SOURCE_TABLE: &'static str = "actor";

    fn denormalize(row: &ActorRow, key: SurrogateKey) -> Self {
        Self {
            actor_key: key,
            actor_id: row.actor_id,
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            last_update: row.last_update,
        }
    }
}

impl DimensionRecord for DimCategory {
    type Source = CategoryRow;
    const SOURCE_TABLE: &'static str = "category";

    fn denormalize(row: &CategoryRow, key: SurrogateKey) -> Self {
        Self {
            category_key: key,
            category_id: row.category_id,
            name: row.name.clone(),
            last_update: row.last_update,
        }
    }
}

impl DimensionRecord for DimStore {
    type Source = StoreRow;
    const SOURCE_TABLE: &'static str = "store";

    fn denormalize(row: &StoreRow, key: SurrogateKey) -> Self {
        Self {
            store_key: key,
            store_id: row.store_id,
            city: row.city.clone(),
            country: row.country.clone(),
            last_update: row.last_update,
        }
    }
}

impl DimensionRecord for DimCustomer {
    type Source = CustomerRow;
    const SOURCE_TABLE: &'static str = "customer";

    fn denormalize(row: &CustomerRow, key: SurrogateKey) -> Self {
        Self {
            customer_key: key,
            customer_id: row.customer_id,
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            active: row.active,
            city: row.city.clone(),
            country: row.country.clone(),
            last_update: row.last_update,
        }
    }
}

/// Surrogate keys a rental points at: (film, store, customer).
pub type RentalRefs = (SurrogateKey, SurrogateKey, SurrogateKey);

impl FactRecord for FactRental {
    type Source = RentalRow;
    type Refs = RentalRefs;
    const SOURCE_TABLE: &'static str = "rental";

    fn resolve(row: &RentalRow, dims: &DimensionKeys) -> Option<RentalRefs> {
        Some((
            dims.film.get(row.film_id)?,
            dims.store.get(row.store_id)?,
            dims.customer.get(row.customer_id)?,
        ))
    }

    fn build(row: &RentalRow, refs: RentalRefs, key: SurrogateKey) -> Self {
        let (film_key, store_key, customer_key) = refs;
        Self {
            fact_rental_key: key,
            rental_id: row.rental_id,
            date_key_rented: date_key(row.rental_date.date()),
            date_key_returned: date_key_of(row.return_date),
            film_key,
            store_key,
            customer_key,
            staff_id: row.staff_id,
            rental_duration_days: duration_days(Some(row.rental_date), row.return_date),
        }
    }
}

/// Surrogate keys a payment points at: (store, customer).
pub type PaymentRefs = (SurrogateKey, SurrogateKey);

impl FactRecord for FactPayment {
    type Source = PaymentRow;
    type Refs = PaymentRefs;
    const SOURCE_TABLE: &'static str = "payment";

    fn resolve(row: &PaymentRow, dims: &DimensionKeys) -> Option<PaymentRefs> {
        Some((dims.store.get(row.store_id)?, dims.customer.get(row.customer_id)?))
    }

    fn build(row: &PaymentRow, refs: PaymentRefs, key: SurrogateKey) -> Self {
        use rust_decimal::prelude::ToPrimitive;

        let (store_key, customer_key) = refs;
        Self {
            fact_payment_key: key,
            payment_id: row.payment_id,
            date_key_paid: date_key(row.payment_date.date()),
            customer_key,
            store_key,
            staff_id: row.staff_id,
            // A DECIMAL(5,2) always fits an f64.
            amount: row.amount.to_f64().unwrap_or_default(),
        }
    }
}

impl BridgeRecord for BridgeFilmActor {
    const TABLE: &'static str = "bridge_film_actor";
    const LEFT_FIELD: &'static str = "film_key";
    const RIGHT_FIELD: &'static str = "actor_key";

    fn pair(left: SurrogateKey, right: SurrogateKey) -> Self {
        Self {
            film_key: left,
            actor_key: right,
        }
    }

    fn left(&self) -> SurrogateKey {
        self.film_key
    }

    fn right(&self) -> SurrogateKey {
        self.actor_key
    }
}

impl BridgeRecord for BridgeFilmCategory {
    const TABLE: &'static str = "bridge_film_category";
    const LEFT_FIELD: &'static str = "film_key";
    const RIGHT_FIELD: &'static str = "category_key";

    fn pair(left: SurrogateKey, right: SurrogateKey) -> Self {
        Self {
            film_key: left,
            category_key: right,
        }
    }

    fn left(&self) -> SurrogateKey {
        self.film_key
    }

    fn right(&self) -> SurrogateKey {
        self.category_key
    }
}

/// Write and read access to the dimensional mirror.
///
/// Every `apply_*` call is atomic: either the whole batch is committed or
/// nothing is. There is no transaction spanning two calls.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Define tables and indexes. Safe to call repeatedly.
    async fn define_schema(&self) -> Result<()>;

    /// Upsert date dimension rows by date key; returns how many were written.
    async fn populate_dates(&self, dates: Vec<DimDate>) -> Result<usize>;

    async fn date(&self, key: DateKey) -> Result<Option<DimDate>>;

    /// Natural to surrogate mapping read from the current table contents.
    async fn key_map<R: MirrorRecord>(&self) -> Result<KeyMap>;

    /// Largest surrogate key ever issued for the table (0 if none).
    async fn key_high_water<R: MirrorRecord>(&self) -> Result<SurrogateKey>;

    async fn apply_records<R: MirrorRecord>(&self, batch: RecordBatch<R>) -> Result<()>;

    async fn apply_bridge<R: BridgeRecord>(&self, batch: BridgeBatch<R>) -> Result<()>;

    /// Every row of a keyed table, ordered by surrogate key.
    async fn records<R: MirrorRecord>(&self) -> Result<Vec<R>>;

    /// Every row of a bridge table, ordered by (left, right).
    async fn bridge_rows<R: BridgeRecord>(&self) -> Result<Vec<R>>;

    /// Rental facts with `date_key_rented >= cutoff`.
    async fn rental_count_since(&self, cutoff: DateKey) -> Result<i64>;

    /// Sum of payment fact amounts with `date_key_paid >= cutoff`.
    async fn payment_total_since(&self, cutoff: DateKey) -> Result<f64>;

    /// Same sum grouped by `store_key`.
    async fn payment_totals_by_store_key_since(
        &self,
        cutoff: DateKey,
    ) -> Result<Vec<(SurrogateKey, f64)>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyMap, KeyPair};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn keys(pairs: &[(i64, i64)]) -> KeyMap {
        KeyMap::from_pairs(pairs.iter().map(|(n, s)| KeyPair {
            natural_key: *n,
            surrogate_key: *s,
        }))
    }

    fn rental() -> RentalRow {
        RentalRow {
            rental_id: 1,
            rental_date: ts(2005, 5, 24, 22),
            return_date: Some(ts(2005, 5, 26, 10)),
            customer_id: 130,
            staff_id: 1,
            film_id: 80,
            store_id: 1,
            last_update: ts(2006, 2, 15, 21),
        }
    }

    #[test]
    fn test_rental_resolution_and_derived_attributes() {
        let dims = DimensionKeys {
            film: keys(&[(80, 8)]),
            store: keys(&[(1, 100)]),
            customer: keys(&[(130, 13)]),
            ..Default::default()
        };
        let row = rental();
        let refs = FactRental::resolve(&row, &dims).unwrap();
        let fact = FactRental::build(&row, refs, 55);

        assert_eq!(fact.fact_rental_key, 55);
        assert_eq!((fact.film_key, fact.store_key, fact.customer_key), (8, 100, 13));
        assert_eq!(fact.date_key_rented, 20050524);
        assert_eq!(fact.date_key_returned, Some(20050526));
        assert_eq!(fact.rental_duration_days, Some(2));
    }

    #[test]
    fn test_unreturned_rental_has_no_return_key() {
        let dims = DimensionKeys {
            film: keys(&[(80, 8)]),
            store: keys(&[(1, 100)]),
            customer: keys(&[(130, 13)]),
            ..Default::default()
        };
        let row = RentalRow {
            return_date: None,
            ..rental()
        };
        let fact = FactRental::build(&row, FactRental::resolve(&row, &dims).unwrap(), 1);
        assert_eq!(fact.date_key_returned, None);
        assert_eq!(fact.rental_duration_days, None);
    }

    #[test]
    fn test_rental_with_missing_customer_is_orphan() {
        let dims = DimensionKeys {
            film: keys(&[(80, 8)]),
            store: keys(&[(1, 100)]),
            ..Default::default()
        };
        assert!(FactRental::resolve(&rental(), &dims).is_none());
    }

    #[test]
    fn test_payment_amount_and_date_key() {
        let dims = DimensionKeys {
            store: keys(&[(2, 20)]),
            customer: keys(&[(5, 50)]),
            ..Default::default()
        };
        let row = PaymentRow {
            payment_id: 16049,
            payment_date: ts(2005, 8, 23, 21),
            customer_id: 5,
            staff_id: 2,
            store_id: 2,
            amount: Decimal::new(299, 2),
            last_update: ts(2006, 2, 15, 22),
        };
        let fact = FactPayment::build(&row, FactPayment::resolve(&row, &dims).unwrap(), 3);
        assert_eq!(fact.amount, 2.99);
        assert_eq!(fact.date_key_paid, 20050823);
        assert_eq!((fact.store_key, fact.customer_key), (20, 50));
    }

    #[test]
    fn test_dimension_field_names() {
        assert_eq!(DimFilm::SURROGATE_FIELD, "film_key");
        assert_eq!(DimFilm::NATURAL_FIELD, "film_id");
        assert_eq!(FactPayment::TABLE, "fact_payment");
        assert_eq!(BridgeFilmCategory::RIGHT_FIELD, "category_key");
    }

    #[test]
    fn test_optional_fields_survive_json() {
        let film = DimFilm {
            film_key: 1,
            film_id: 1,
            title: "ACADEMY DINOSAUR".into(),
            rating: None,
            length: Some(86),
            language: "English".into(),
            release_year: None,
            last_update: ts(2006, 2, 15, 5),
        };
        let json = serde_json::to_value(&film).unwrap();
        let back: DimFilm = serde_json::from_value(json).unwrap();
        assert_eq!(back, film);
    }
}
