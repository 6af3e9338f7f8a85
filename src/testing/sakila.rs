//! A small, internally consistent slice of the Sakila sample database.
//!
//! Two stores (Lethbridge and Woodridge), five films, four actors, three
//! categories, four customers and a handful of rentals and payments spread
//! around [`sample_now`] so that some fall inside the default validation
//! window and some before it.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use star_core::{ActorRow, AssociationRow, CategoryRow};

use super::memory_source::{Customer, Film, Payment, Rental, SakilaData, Store};

/// Timestamp helper; out-of-range components collapse to the epoch.
pub fn sample_time(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, mi, s))
        .unwrap_or_default()
}

/// The "current time" that validation tests reconcile against.
pub fn sample_now() -> NaiveDateTime {
    sample_time(2005, 8, 30, 12, 0, 0)
}

fn catalog_update() -> NaiveDateTime {
    sample_time(2006, 2, 15, 4, 34, 33)
}

fn customer_update() -> NaiveDateTime {
    sample_time(2006, 2, 15, 4, 57, 20)
}

fn rental_update() -> NaiveDateTime {
    sample_time(2006, 2, 15, 21, 30, 53)
}

fn payment_update() -> NaiveDateTime {
    sample_time(2006, 2, 15, 22, 12, 30)
}

fn cents(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

pub fn sample() -> SakilaData {
    let mut db = SakilaData::default();
    let at = catalog_update();

    db.language.insert(1, "English".into());
    db.language.insert(2, "Italian".into());

    db.address.insert(1, ("Lethbridge".into(), "Canada".into()));
    db.address.insert(2, ("Woodridge".into(), "Australia".into()));
    db.address.insert(5, ("Sasebo".into(), "Japan".into()));
    db.address.insert(6, ("San Bernardino".into(), "United States".into()));
    db.address.insert(7, ("Athenai".into(), "Greece".into()));

    for (id, address_id) in [(1, 1), (2, 2)] {
        db.store.insert(
            id,
            Store {
                address_id,
                last_update: sample_time(2006, 2, 15, 4, 57, 12),
            },
        );
    }

    for (id, title, rating, length, language_id, year) in [
        (1, "ACADEMY DINOSAUR", Some("PG"), Some(86), 1, Some(2006)),
        (2, "ACE GOLDFINGER", Some("G"), Some(48), 1, Some(2006)),
        (3, "ADAPTATION HOLES", Some("NC-17"), Some(50), 1, Some(2006)),
        (4, "AFFAIR PREJUDICE", None, Some(117), 2, None),
        (5, "AGENT TRUMAN", Some("PG"), None, 1, Some(2006)),
    ] {
        db.film.insert(
            id,
            Film {
                title: title.into(),
                rating: rating.map(Into::into),
                length,
                language_id,
                release_year: year,
                last_update: at,
            },
        );
    }

    for (id, first, last) in [
        (1, "PENELOPE", "GUINESS"),
        (2, "NICK", "WAHLBERG"),
        (3, "ED", "CHASE"),
        (4, "JENNIFER", "DAVIS"),
    ] {
        db.actor.insert(
            id,
            ActorRow {
                actor_id: id,
                first_name: first.into(),
                last_name: last.into(),
                last_update: at,
            },
        );
    }

    for (id, name) in [(1, "Action"), (2, "Animation"), (6, "Documentary")] {
        db.category.insert(
            id,
            CategoryRow {
                category_id: id,
                name: name.into(),
                last_update: sample_time(2006, 2, 15, 4, 46, 27),
            },
        );
    }

    for (id, first, last, active, address_id) in [
        (1, "MARY", "SMITH", true, 5),
        (2, "PATRICIA", "JOHNSON", true, 6),
        (3, "LINDA", "WILLIAMS", true, 7),
        (4, "BARBARA", "JONES", false, 5),
    ] {
        db.customer.insert(
            id,
            Customer {
                first_name: first.into(),
                last_name: last.into(),
                active,
                address_id,
                last_update: customer_update(),
            },
        );
    }

    for (left, right) in [(1, 1), (1, 2), (2, 2), (2, 3), (3, 3), (4, 4), (5, 1)] {
        db.film_actor.insert(AssociationRow { left, right });
    }
    for (left, right) in [(1, 6), (2, 2), (3, 6), (4, 1), (5, 1)] {
        db.film_category.insert(AssociationRow { left, right });
    }

    // inventory_id -> (film_id, store_id)
    for (id, film, store) in [(1, 1, 1), (2, 1, 2), (3, 2, 2), (4, 3, 1), (5, 4, 2), (6, 5, 1)] {
        db.inventory.insert(id, (film, store));
    }
    db.staff.insert(1, 1);
    db.staff.insert(2, 2);

    let rentals = [
        // Before the validation window.
        (1, sample_time(2005, 5, 24, 22, 53, 30), Some(sample_time(2005, 5, 26, 22, 4, 30)), 1, 1, 1),
        (2, sample_time(2005, 6, 15, 0, 54, 12), Some(sample_time(2005, 6, 23, 2, 42, 12)), 3, 2, 2),
        // Inside it.
        (3, sample_time(2005, 8, 1, 10, 0, 0), Some(sample_time(2005, 8, 4, 9, 30, 0)), 4, 3, 1),
        (4, sample_time(2005, 8, 10, 18, 22, 5), Some(sample_time(2005, 8, 12, 18, 22, 5)), 2, 1, 2),
        (5, sample_time(2005, 8, 22, 7, 15, 0), None, 6, 2, 1),
        (6, sample_time(2005, 8, 23, 12, 45, 17), None, 5, 4, 2),
    ];
    for (id, rental_date, return_date, inventory_id, customer_id, staff_id) in rentals {
        db.rental.insert(
            id,
            Rental {
                rental_date,
                return_date,
                inventory_id,
                customer_id,
                staff_id,
                last_update: rental_update(),
            },
        );
    }

    let payments = [
        (1, sample_time(2005, 5, 25, 11, 30, 37), 1, 1, cents(299)),
        (2, sample_time(2005, 6, 15, 21, 8, 46), 2, 2, cents(499)),
        (3, sample_time(2005, 8, 1, 10, 5, 0), 3, 1, cents(599)),
        (4, sample_time(2005, 8, 10, 18, 30, 0), 1, 2, cents(99)),
        (5, sample_time(2005, 8, 22, 7, 20, 0), 2, 1, cents(499)),
        (6, sample_time(2005, 8, 23, 13, 0, 0), 4, 2, cents(1099)),
    ];
    for (id, payment_date, customer_id, staff_id, amount) in payments {
        db.payment.insert(
            id,
            Payment {
                payment_date,
                customer_id,
                staff_id,
                amount,
                last_update: payment_update(),
            },
        );
    }

    db
}
