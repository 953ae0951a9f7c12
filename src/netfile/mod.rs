//! Ingestion of Form 700 filings from the NetFile registry: HTTP
//! client, field cleaning, coded-choice vocabularies, the relational
//! entity registry, the XML parser, and the per-run store.

pub mod clean;
pub mod client;
pub mod model;
pub mod parser;
pub mod store;
pub mod vocab;
