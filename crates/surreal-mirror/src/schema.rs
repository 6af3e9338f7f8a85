//! Table and index definitions for the mirror.

use star_core::{
    BridgeFilmActor, BridgeFilmCategory, BridgeRecord, DimActor, DimCategory, DimCustomer,
    DimFilm, DimStore, FactPayment, FactRental, MirrorRecord,
};

pub const DATE_TABLE: &str = "dim_date";
pub const KEY_SEQUENCE_TABLE: &str = "key_sequence";

fn keyed_table<R: MirrorRecord>(out: &mut Vec<String>) {
    let table = R::TABLE;
    let natural = R::NATURAL_FIELD;
    out.push(format!("DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;"));
    out.push(format!(
        "DEFINE INDEX IF NOT EXISTS {table}_{natural} ON TABLE {table} FIELDS {natural} UNIQUE;"
    ));
}

fn bridge_table<R: BridgeRecord>(out: &mut Vec<String>) {
    let table = R::TABLE;
    out.push(format!("DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;"));
    for field in [R::LEFT_FIELD, R::RIGHT_FIELD] {
        out.push(format!(
            "DEFINE INDEX IF NOT EXISTS {table}_{field} ON TABLE {table} FIELDS {field};"
        ));
    }
}

fn secondary_index(out: &mut Vec<String>, table: &str, field: &str) {
    out.push(format!(
        "DEFINE INDEX IF NOT EXISTS {table}_{field} ON TABLE {table} FIELDS {field};"
    ));
}

/// Every statement needed to create the mirror schema. Each one is a no-op
/// when its object already exists.
pub fn statements() -> Vec<String> {
    let mut out = vec![
        format!("DEFINE TABLE IF NOT EXISTS {DATE_TABLE} SCHEMALESS;"),
        format!(
            "DEFINE INDEX IF NOT EXISTS {DATE_TABLE}_date_key ON TABLE {DATE_TABLE} FIELDS date_key UNIQUE;"
        ),
        format!("DEFINE TABLE IF NOT EXISTS {KEY_SEQUENCE_TABLE} SCHEMALESS;"),
    ];

    keyed_table::<DimFilm>(&mut out);
    keyed_table::<DimActor>(&mut out);
    keyed_table::<DimCategory>(&mut out);
    keyed_table::<DimStore>(&mut out);
    keyed_table::<DimCustomer>(&mut out);

    bridge_table::<BridgeFilmActor>(&mut out);
    bridge_table::<BridgeFilmCategory>(&mut out);

    keyed_table::<FactRental>(&mut out);
    secondary_index(&mut out, FactRental::TABLE, "date_key_rented");
    secondary_index(&mut out, FactRental::TABLE, "film_key");
    secondary_index(&mut out, FactRental::TABLE, "customer_key");

    keyed_table::<FactPayment>(&mut out);
    secondary_index(&mut out, FactPayment::TABLE, "date_key_paid");
    secondary_index(&mut out, FactPayment::TABLE, "store_key");

    out
}
