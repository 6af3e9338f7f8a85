//! Core types for the star-sync dimensional mirror.
//!
//! This crate holds everything the synchronizers share without touching a
//! concrete database:
//!
//! - [`keys`] - natural/surrogate key vocabulary, key maps and key allocation
//! - [`date`] - the `yyyymmdd` date key encoding and the date dimension
//! - [`source`] - rows read from the operational schema and the [`SourceReader`] trait
//! - [`mirror`] - dimension, bridge and fact records and the [`MirrorStore`] trait
//! - [`batch`] - explicit write batches applied atomically per synchronizer
//!
//! # Architecture
//!
//! ```text
//! star-core (this crate)
//!    │
//!    ├─── mysql-source     (implements SourceReader over mysql_async)
//!    ├─── surreal-mirror   (implements MirrorStore over SurrealDB)
//!    ├─── watermark        (watermark persistence)
//!    └─── star-sync        (synchronizers, reconciliation, CLI)
//! ```

pub mod batch;
pub mod date;
pub mod keys;
pub mod mirror;
pub mod source;

pub use batch::{BridgeBatch, RecordBatch, Write};
pub use date::{date_key, date_key_of, decode_date_key, duration_days, DateKey, DateRange, DimDate};
pub use keys::{
    ChangedKeys, DimensionKeys, KeyAllocator, KeyAssigner, KeyDecision, KeyMap, KeyPair,
    NaturalKey, SurrogateKey,
};
pub use mirror::{
    BridgeFilmActor, BridgeFilmCategory, BridgeRecord, DimActor, DimCategory, DimCustomer,
    DimFilm, DimStore, DimensionRecord, FactPayment, FactRecord, FactRental, MirrorRecord,
    MirrorStore, PaymentRefs, RentalRefs,
};
pub use source::{
    ActorRow, AssociationFilter, AssociationRow, CategoryRow, CustomerRow, FilmRow, PaymentRow,
    RentalRow, SourceReader, SourceRow, StoreRow,
};
