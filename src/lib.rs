//! Case study catalogue service: CRUD over case-study records, an
//! institution query builder and an on-demand translation cache.

pub mod config;
pub mod db;
pub mod error;
pub mod language;
pub mod libretranslate;
pub mod memory;
pub mod model;
pub mod openai;
pub mod query;
pub mod routes;
pub mod translation;
