//! SQL text for every read the synchronizers perform.
//!
//! Change-scoped reads append `WHERE <alias>.last_update > ?` to the base
//! select; full reads run the base select as-is. Every result is ordered by
//! natural key so batches are planned deterministically.

use mysql_async::Value;
use star_core::{AssociationFilter, ChangedKeys};

pub const FILMS: &str = "SELECT f.film_id, f.title, CAST(f.rating AS CHAR), f.length, l.name, \
     f.release_year, f.last_update \
     FROM film f JOIN language l ON l.language_id = f.language_id";

pub const ACTORS: &str =
    "SELECT a.actor_id, a.first_name, a.last_name, a.last_update FROM actor a";

pub const CATEGORIES: &str = "SELECT c.category_id, c.name, c.last_update FROM category c";

pub const STORES: &str = "SELECT s.store_id, ci.city, co.country, s.last_update \
     FROM store s \
     JOIN address a ON a.address_id = s.address_id \
     JOIN city ci ON ci.city_id = a.city_id \
     JOIN country co ON co.country_id = ci.country_id";

pub const CUSTOMERS: &str = "SELECT c.customer_id, c.first_name, c.last_name, c.active, \
     ci.city, co.country, c.last_update \
     FROM customer c \
     JOIN address a ON a.address_id = c.address_id \
     JOIN city ci ON ci.city_id = a.city_id \
     JOIN country co ON co.country_id = ci.country_id";

pub const RENTALS: &str = "SELECT r.rental_id, r.rental_date, r.return_date, r.customer_id, \
     r.staff_id, i.film_id, i.store_id, r.last_update \
     FROM rental r JOIN inventory i ON i.inventory_id = r.inventory_id";

pub const PAYMENTS: &str = "SELECT p.payment_id, p.payment_date, p.customer_id, p.staff_id, \
     st.store_id, CAST(p.amount AS CHAR), p.last_update \
     FROM payment p JOIN staff st ON st.staff_id = p.staff_id";

pub const RENTAL_COUNT_SINCE: &str = "SELECT COUNT(*) FROM rental WHERE rental_date >= ?";

pub const PAYMENT_TOTAL_SINCE: &str =
    "SELECT CAST(COALESCE(SUM(amount), 0) AS CHAR) FROM payment WHERE payment_date >= ?";

pub const PAYMENT_TOTALS_BY_STORE_SINCE: &str =
    "SELECT st.store_id, CAST(SUM(p.amount) AS CHAR) \
     FROM payment p JOIN staff st ON st.staff_id = p.staff_id \
     WHERE p.payment_date >= ? \
     GROUP BY st.store_id ORDER BY st.store_id";

/// A many-to-many association table and its two id columns.
#[derive(Debug, Clone, Copy)]
pub struct Association {
    pub table: &'static str,
    pub left: &'static str,
    pub right: &'static str,
}

pub const FILM_ACTOR: Association = Association {
    table: "film_actor",
    left: "film_id",
    right: "actor_id",
};

pub const FILM_CATEGORY: Association = Association {
    table: "film_category",
    left: "film_id",
    right: "category_id",
};

/// Scope a base select by its table's `last_update`.
pub fn scoped(base: &str, alias: &str, order_by: &str, since_bound: bool) -> String {
    if since_bound {
        format!("{base} WHERE {alias}.last_update > ? ORDER BY {order_by}")
    } else {
        format!("{base} ORDER BY {order_by}")
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn key_params(keys: &ChangedKeys) -> impl Iterator<Item = Value> + '_ {
    keys.iter().map(|k| Value::Int(*k))
}

/// Select for association rows matching the filter, with its parameters.
pub fn association(assoc: Association, filter: &AssociationFilter) -> (String, Vec<Value>) {
    let Association { table, left, right } = assoc;
    let base = format!("SELECT {left}, {right} FROM {table}");
    let order = format!("ORDER BY {left}, {right}");

    match filter {
        AssociationFilter::All => (format!("{base} {order}"), Vec::new()),
        AssociationFilter::Touching { left: l, right: r } => {
            let mut clauses = Vec::new();
            if !l.is_empty() {
                clauses.push(format!("{left} IN ({})", placeholders(l.len())));
            }
            if !r.is_empty() {
                clauses.push(format!("{right} IN ({})", placeholders(r.len())));
            }
            let params = key_params(l).chain(key_params(r)).collect();
            (
                format!("{base} WHERE {} {order}", clauses.join(" OR ")),
                params,
            )
        }
    }
}
