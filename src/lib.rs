//! # CRO Search
//!
//! Search and browse a catalog of conversion-rate-optimization experiments.
//!
//! Records live in one SQLite table. Search runs in keyword, vector, or
//! hybrid mode through the engine in `cro-search-core`; when embeddings are
//! unavailable it falls back to keyword search and says so in the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │  cro add     │──▶│   SQLite     │◀──│ cro embed     │◀── OpenAI
//! │  (JSON)      │   │ experiments  │   │   pending     │
//! └──────────────┘   └──────┬───────┘   └───────────────┘
//!                           │
//!                    ┌──────┴───────┐
//!                    │ SearchEngine │ (keyword ∥ vector → fusion)
//!                    └──────┬───────┘
//!                ┌──────────┴──────────┐
//!                ▼                     ▼
//!           ┌──────────┐         ┌──────────┐
//!           │   CLI    │         │   HTTP   │
//!           │  (cro)   │         │  (axum)  │
//!           └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cro init                                  # create database
//! cro add experiments.json                  # load records
//! cro embed pending                         # generate embeddings
//! cro search "pricing page" --mode hybrid
//! cro serve                                 # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Schema bootstrap |
//! | [`sqlite_store`] | Store traits over SQLite, catalog queries |
//! | [`embedding`] | Disabled and OpenAI embedding providers |
//! | [`embed_cmd`] | Embedding backfill |
//! | [`search`] | Engine wiring and CLI rendering |
//! | [`experiments`] | Listing, lookup, JSON loading |
//! | [`server`] | HTTP API |

pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod experiments;
pub mod migrate;
pub mod search;
pub mod server;
pub mod sqlite_store;
