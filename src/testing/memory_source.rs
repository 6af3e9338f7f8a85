use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use star_core::{
    ActorRow, AssociationFilter, AssociationRow, CategoryRow, CustomerRow, FilmRow, NaturalKey,
    PaymentRow, RentalRow, SourceReader, StoreRow,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Film {
    pub title: String,
    pub rating: Option<String>,
    pub length: Option<i64>,
    pub language_id: i64,
    pub release_year: Option<i64>,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    pub address_id: i64,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
    pub address_id: i64,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rental {
    pub rental_date: NaiveDateTime,
    pub return_date: Option<NaiveDateTime>,
    pub inventory_id: i64,
    pub customer_id: i64,
    pub staff_id: i64,
    pub last_update: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub payment_date: NaiveDateTime,
    pub customer_id: i64,
    pub staff_id: i64,
    pub amount: Decimal,
    pub last_update: NaiveDateTime,
}

/// Operational tables, keyed by primary key.
#[derive(Debug, Clone, Default)]
pub struct SakilaData {
    pub language: BTreeMap<i64, String>,
    /// address_id -> (city, country), already resolved through city and
    /// country.
    pub address: BTreeMap<i64, (String, String)>,
    pub film: BTreeMap<i64, Film>,
    pub actor: BTreeMap<i64, ActorRow>,
    pub category: BTreeMap<i64, CategoryRow>,
    pub store: BTreeMap<i64, Store>,
    pub customer: BTreeMap<i64, Customer>,
    pub film_actor: BTreeSet<AssociationRow>,
    pub film_category: BTreeSet<AssociationRow>,
    /// inventory_id -> (film_id, store_id)
    pub inventory: BTreeMap<i64, (i64, i64)>,
    /// staff_id -> store_id
    pub staff: BTreeMap<i64, i64>,
    pub rental: BTreeMap<i64, Rental>,
    pub payment: BTreeMap<i64, Payment>,
}

fn changed(last_update: NaiveDateTime, since: Option<NaiveDateTime>) -> bool {
    since.map_or(true, |w| last_update > w)
}

impl SakilaData {
    fn films(&self, since: Option<NaiveDateTime>) -> Vec<FilmRow> {
        self.film
            .iter()
            .filter(|(_, f)| changed(f.last_update, since))
            .filter_map(|(id, f)| {
                Some(FilmRow {
                    film_id: *id,
                    title: f.title.clone(),
                    rating: f.rating.clone(),
                    length: f.length,
                    language: self.language.get(&f.language_id)?.clone(),
                    release_year: f.release_year,
                    last_update: f.last_update,
                })
            })
            .collect()
    }

    fn stores(&self, since: Option<NaiveDateTime>) -> Vec<StoreRow> {
        self.store
            .iter()
            .filter(|(_, s)| changed(s.last_update, since))
            .filter_map(|(id, s)| {
                let (city, country) = self.address.get(&s.address_id)?.clone();
                Some(StoreRow {
                    store_id: *id,
                    city,
                    country,
                    last_update: s.last_update,
                })
            })
            .collect()
    }

    fn customers(&self, since: Option<NaiveDateTime>) -> Vec<CustomerRow> {
        self.customer
            .iter()
            .filter(|(_, c)| changed(c.last_update, since))
            .filter_map(|(id, c)| {
                let (city, country) = self.address.get(&c.address_id)?.clone();
                Some(CustomerRow {
                    customer_id: *id,
                    first_name: c.first_name.clone(),
                    last_name: c.last_name.clone(),
                    active: c.active,
                    city,
                    country,
                    last_update: c.last_update,
                })
            })
            .collect()
    }

    fn rentals(&self, since: Option<NaiveDateTime>) -> Vec<RentalRow> {
        self.rental
            .iter()
            .filter(|(_, r)| changed(r.last_update, since))
            .filter_map(|(id, r)| {
                let (film_id, store_id) = *self.inventory.get(&r.inventory_id)?;
                Some(RentalRow {
                    rental_id: *id,
                    rental_date: r.rental_date,
                    return_date: r.return_date,
                    customer_id: r.customer_id,
                    staff_id: r.staff_id,
                    film_id,
                    store_id,
                    last_update: r.last_update,
                })
            })
            .collect()
    }

    fn payments(&self, since: Option<NaiveDateTime>) -> Vec<PaymentRow> {
        self.payment
            .iter()
            .filter(|(_, p)| changed(p.last_update, since))
            .filter_map(|(id, p)| {
                Some(PaymentRow {
                    payment_id: *id,
                    payment_date: p.payment_date,
                    customer_id: p.customer_id,
                    staff_id: p.staff_id,
                    store_id: *self.staff.get(&p.staff_id)?,
                    amount: p.amount,
                    last_update: p.last_update,
                })
            })
            .collect()
    }
}

/// In-memory [`SourceReader`] with helpers to mutate the data between runs.
#[derive(Debug, Default)]
pub struct MemorySource {
    data: RwLock<SakilaData>,
    offline: AtomicBool,
    reads: RwLock<Vec<String>>,
}

impl MemorySource {
    pub fn new(data: SakilaData) -> Self {
        Self {
            data: RwLock::new(data),
            ..Default::default()
        }
    }

    /// Make every subsequent call fail as if the server were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Apply an arbitrary change to the operational tables.
    pub fn modify<T>(&self, f: impl FnOnce(&mut SakilaData) -> T) -> T {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *data)
    }

    /// Snapshot of the operational tables.
    pub fn snapshot(&self) -> SakilaData {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of the reads performed so far, with their scope, e.g.
    /// `film since 2006-02-15 05:03:42` or `film_actor touching`.
    pub fn reads(&self) -> Vec<String> {
        self.reads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn insert_category(&self, id: NaturalKey, name: &str, at: NaiveDateTime) {
        self.modify(|db| {
            db.category.insert(
                id,
                CategoryRow {
                    category_id: id,
                    name: name.to_string(),
                    last_update: at,
                },
            )
        });
    }

    /// Returns false when the actor does not exist.
    pub fn update_actor_last_name(&self, id: NaturalKey, last_name: &str, at: NaiveDateTime) -> bool {
        self.modify(|db| match db.actor.get_mut(&id) {
            Some(actor) => {
                actor.last_name = last_name.to_string();
                actor.last_update = at;
                true
            }
            None => false,
        })
    }

    /// Bump a film's `last_update` without changing anything else.
    pub fn touch_film(&self, id: NaturalKey, at: NaiveDateTime) -> bool {
        self.modify(|db| match db.film.get_mut(&id) {
            Some(film) => {
                film.last_update = at;
                true
            }
            None => false,
        })
    }

    pub fn add_film_actor(&self, film_id: NaturalKey, actor_id: NaturalKey) {
        self.modify(|db| {
            db.film_actor.insert(AssociationRow {
                left: film_id,
                right: actor_id,
            })
        });
    }

    pub fn remove_film_actor(&self, film_id: NaturalKey, actor_id: NaturalKey) -> bool {
        self.modify(|db| {
            db.film_actor.remove(&AssociationRow {
                left: film_id,
                right: actor_id,
            })
        })
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("Failed to connect to MySQL at 'memory': connection refused");
        }
        Ok(())
    }

    fn read<T>(&self, what: String, f: impl FnOnce(&SakilaData) -> T) -> Result<T> {
        self.check_online()?;
        self.reads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(what);
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&*data))
    }
}

fn scope(table: &str, since: Option<NaiveDateTime>) -> String {
    match since {
        Some(ts) => format!("{table} since {ts}"),
        None => format!("{table} all"),
    }
}

fn associations(
    rows: &BTreeSet<AssociationRow>,
    filter: &AssociationFilter,
) -> Vec<AssociationRow> {
    rows.iter().filter(|r| filter.matches(r)).copied().collect()
}

fn filter_scope(table: &str, filter: &AssociationFilter) -> String {
    match filter {
        AssociationFilter::All => format!("{table} all"),
        AssociationFilter::Touching { .. } => format!("{table} touching"),
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn ping(&self) -> Result<()> {
        self.check_online()
    }

    async fn films(&self, since: Option<NaiveDateTime>) -> Result<Vec<FilmRow>> {
        self.read(scope("film", since), |db| db.films(since))
    }

    async fn actors(&self, since: Option<NaiveDateTime>) -> Result<Vec<ActorRow>> {
        self.read(scope("actor", since), |db| {
            db.actor
                .values()
                .filter(|a| changed(a.last_update, since))
                .cloned()
                .collect()
        })
    }

    async fn categories(&self, since: Option<NaiveDateTime>) -> Result<Vec<CategoryRow>> {
        self.read(scope("category", since), |db| {
            db.category
                .values()
                .filter(|c| changed(c.last_update, since))
                .cloned()
                .collect()
        })
    }

    async fn stores(&self, since: Option<NaiveDateTime>) -> Result<Vec<StoreRow>> {
        self.read(scope("store", since), |db| db.stores(since))
    }

    async fn customers(&self, since: Option<NaiveDateTime>) -> Result<Vec<CustomerRow>> {
        self.read(scope("customer", since), |db| db.customers(since))
    }

    async fn film_actors(&self, filter: &AssociationFilter) -> Result<Vec<AssociationRow>> {
        self.read(filter_scope("film_actor", filter), |db| {
            associations(&db.film_actor, filter)
        })
    }

    async fn film_categories(&self, filter: &AssociationFilter) -> Result<Vec<AssociationRow>> {
        self.read(filter_scope("film_category", filter), |db| {
            associations(&db.film_category, filter)
        })
    }

    async fn rentals(&self, since: Option<NaiveDateTime>) -> Result<Vec<RentalRow>> {
        self.read(scope("rental", since), |db| db.rentals(since))
    }

    async fn payments(&self, since: Option<NaiveDateTime>) -> Result<Vec<PaymentRow>> {
        self.read(scope("payment", since), |db| db.payments(since))
    }

    async fn rental_count_since(&self, cutoff: NaiveDateTime) -> Result<i64> {
        self.read("rental count".to_string(), |db| {
            db.rental.values().filter(|r| r.rental_date >= cutoff).count() as i64
        })
    }

    async fn payment_total_since(&self, cutoff: NaiveDateTime) -> Result<Decimal> {
        self.read("payment total".to_string(), |db| {
            db.payment
                .values()
                .filter(|p| p.payment_date >= cutoff)
                .map(|p| p.amount)
                .sum()
        })
    }

    async fn payment_totals_by_store_since(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<BTreeMap<NaturalKey, Decimal>> {
        self.read("payment total by store".to_string(), |db| {
            let mut totals = BTreeMap::new();
            for p in db.payment.values().filter(|p| p.payment_date >= cutoff) {
                if let Some(store_id) = db.staff.get(&p.staff_id) {
                    *totals.entry(*store_id).or_insert(Decimal::ZERO) += p.amount;
                }
            }
            totals
        })
    }
}
