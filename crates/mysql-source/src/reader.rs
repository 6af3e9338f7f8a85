//! [`SourceReader`] over a `mysql_async` pool.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use mysql_async::{prelude::*, Params, Pool, Row, Value};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

use star_core::{
    ActorRow, AssociationFilter, AssociationRow, CategoryRow, CustomerRow, FilmRow, NaturalKey,
    PaymentRow, RentalRow, SourceReader, StoreRow,
};

use crate::client::{new_mysql_pool, sanitize_connection_string};
use crate::queries::{self, Association};
use crate::value::{boolean, datetime, datetime_param, decimal, int, text, Cells, DecodeError};
use crate::SourceOpts;

/// Read-only view of the Sakila schema.
pub struct MySqlSource {
    pool: Pool,
    /// Connection string with the password masked, for messages.
    display_uri: String,
}

impl MySqlSource {
    pub fn new(pool: Pool, uri: &str) -> Self {
        Self {
            pool,
            display_uri: sanitize_connection_string(uri),
        }
    }

    /// Open a pool for the configured source. No connection is made until
    /// the first query; call [`SourceReader::ping`] to fail fast.
    pub fn connect(opts: &SourceOpts) -> Result<Self> {
        Ok(Self::new(new_mysql_pool(&opts.source_uri)?, &opts.source_uri))
    }

    /// Release every pooled connection.
    pub async fn disconnect(self) -> Result<()> {
        self.pool
            .disconnect()
            .await
            .context("Failed to disconnect MySQL pool")
    }

    async fn fetch(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Row>> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .context("Failed to get MySQL connection")?;
        let params = if params.is_empty() {
            Params::Empty
        } else {
            Params::Positional(params)
        };
        let rows: Vec<Row> = conn
            .exec(sql, params)
            .await
            .with_context(|| format!("Source query failed: {sql}"))?;
        debug!(rows = rows.len(), "{sql}");
        Ok(rows)
    }

    /// Run a change-scoped select and decode every row.
    async fn changed<T>(
        &self,
        base: &str,
        alias: &str,
        order_by: &str,
        since: Option<NaiveDateTime>,
        decode: fn(&Cells) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>> {
        let sql = queries::scoped(base, alias, order_by, since.is_some());
        let params = since.map(datetime_param).into_iter().collect();
        decode_all(self.fetch(&sql, params).await?, decode)
            .with_context(|| format!("Failed to decode rows of '{sql}'"))
    }

    async fn associations(
        &self,
        assoc: Association,
        filter: &AssociationFilter,
    ) -> Result<Vec<AssociationRow>> {
        let (sql, params) = queries::association(assoc, filter);
        decode_all(self.fetch(&sql, params).await?, |c| {
            Ok(AssociationRow {
                left: c.get(0, int)?,
                right: c.get(1, int)?,
            })
        })
        .with_context(|| format!("Failed to decode rows of '{}'", assoc.table))
    }
}

fn decode_all<T>(rows: Vec<Row>, decode: fn(&Cells) -> Result<T, DecodeError>) -> Result<Vec<T>> {
    rows.iter()
        .map(|row| decode(&Cells::new(row)).map_err(Into::into))
        .collect()
}

fn film(c: &Cells) -> Result<FilmRow, DecodeError> {
    Ok(FilmRow {
        film_id: c.get(0, int)?,
        title: c.get(1, text)?,
        rating: c.opt(2, text)?,
        length: c.opt(3, int)?,
        language: c.get(4, text)?,
        release_year: c.opt(5, int)?,
        last_update: c.get(6, datetime)?,
    })
}

fn actor(c: &Cells) -> Result<ActorRow, DecodeError> {
    Ok(ActorRow {
        actor_id: c.get(0, int)?,
        first_name: c.get(1, text)?,
        last_name: c.get(2, text)?,
        last_update: c.get(3, datetime)?,
    })
}

fn category(c: &Cells) -> Result<CategoryRow, DecodeError> {
    Ok(CategoryRow {
        category_id: c.get(0, int)?,
        name: c.get(1, text)?,
        last_update: c.get(2, datetime)?,
    })
}

fn store(c: &Cells) -> Result<StoreRow, DecodeError> {
    Ok(StoreRow {
        store_id: c.get(0, int)?,
        city: c.get(1, text)?,
        country: c.get(2, text)?,
        last_update: c.get(3, datetime)?,
    })
}

fn customer(c: &Cells) -> Result<CustomerRow, DecodeError> {
    Ok(CustomerRow {
        customer_id: c.get(0, int)?,
        first_name: c.get(1, text)?,
        last_name: c.get(2, text)?,
        active: c.get(3, boolean)?,
        city: c.get(4, text)?,
        country: c.get(5, text)?,
        last_update: c.get(6, datetime)?,
    })
}

fn rental(c: &Cells) -> Result<RentalRow, DecodeError> {
    Ok(RentalRow {
        rental_id: c.get(0, int)?,
        rental_date: c.get(1, datetime)?,
        return_date: c.opt(2, datetime)?,
        customer_id: c.get(3, int)?,
        staff_id: c.get(4, int)?,
        film_id: c.get(5, int)?,
        store_id: c.get(6, int)?,
        last_update: c.get(7, datetime)?,
    })
}

fn payment(c: &Cells) -> Result<PaymentRow, DecodeError> {
    Ok(PaymentRow {
        payment_id: c.get(0, int)?,
        payment_date: c.get(1, datetime)?,
        customer_id: c.get(2, int)?,
        staff_id: c.get(3, int)?,
        store_id: c.get(4, int)?,
        amount: c.get(5, decimal)?,
        last_update: c.get(6, datetime)?,
    })
}

#[async_trait]
impl SourceReader for MySqlSource {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.get_conn().await.map_err(|e| {
            anyhow::anyhow!("Failed to connect to MySQL at '{}': {}", self.display_uri, e)
        })?;
        let one: Option<i64> = conn.query_first("SELECT 1").await?;
        anyhow::ensure!(one == Some(1), "Unexpected reply to MySQL ping: {one:?}");
        Ok(())
    }

    async fn films(&self, since: Option<NaiveDateTime>) -> Result<Vec<FilmRow>> {
        self.changed(queries::FILMS, "f", "f.film_id", since, film).await
    }

    async fn actors(&self, since: Option<NaiveDateTime>) -> Result<Vec<ActorRow>> {
        self.changed(queries::ACTORS, "a", "a.actor_id", since, actor).await
    }

    async fn categories(&self, since: Option<NaiveDateTime>) -> Result<Vec<CategoryRow>> {
        self.changed(queries::CATEGORIES, "c", "c.category_id", since, category)
            .await
    }

    async fn stores(&self, since: Option<NaiveDateTime>) -> Result<Vec<StoreRow>> {
        self.changed(queries::STORES, "s", "s.store_id", since, store).await
    }

    async fn customers(&self, since: Option<NaiveDateTime>) -> Result<Vec<CustomerRow>> {
        self.changed(queries::CUSTOMERS, "c", "c.customer_id", since, customer)
            .await
    }

    async fn film_actors(&self, filter: &AssociationFilter) -> Result<Vec<AssociationRow>> {
        self.associations(queries::FILM_ACTOR, filter).await
    }

    async fn film_categories(&self, filter: &AssociationFilter) -> Result<Vec<AssociationRow>> {
        self.associations(queries::FILM_CATEGORY, filter).await
    }

    async fn rentals(&self, since: Option<NaiveDateTime>) -> Result<Vec<RentalRow>> {
        self.changed(queries::RENTALS, "r", "r.rental_id", since, rental).await
    }

    async fn payments(&self, since: Option<NaiveDateTime>) -> Result<Vec<PaymentRow>> {
        self.changed(queries::PAYMENTS, "p", "p.payment_id", since, payment)
            .await
    }

    async fn rental_count_since(&self, cutoff: NaiveDateTime) -> Result<i64> {
        let rows = self
            .fetch(queries::RENTAL_COUNT_SINCE, vec![datetime_param(cutoff)])
            .await?;
        let row = rows.first().context("COUNT(*) returned no row")?;
        Ok(Cells::new(row).get(0, int)?)
    }

    async fn payment_total_since(&self, cutoff: NaiveDateTime) -> Result<Decimal> {
        let rows = self
            .fetch(queries::PAYMENT_TOTAL_SINCE, vec![datetime_param(cutoff)])
            .await?;
        let row = rows.first().context("SUM(amount) returned no row")?;
        Ok(Cells::new(row).get(0, decimal)?)
    }

    async fn payment_totals_by_store_since(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<BTreeMap<NaturalKey, Decimal>> {
        let rows = self
            .fetch(
                queries::PAYMENT_TOTALS_BY_STORE_SINCE,
                vec![datetime_param(cutoff)],
            )
            .await?;
        rows.iter()
            .map(|row| {
                let c = Cells::new(row);
                Ok::<_, anyhow::Error>((c.get(0, int)?, c.get(1, decimal)?))
            })
            .collect()
    }
}
