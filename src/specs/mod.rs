// src/specs/mod.rs
//! # Scraping “specs” module
//!
//! This module hosts the **page-specific scraping specifications** for the
//! wiki. Each spec focuses on a single page kind and encodes *where the ground
//! truth lives in the HTML* and *how to extract it robustly*.
//!
//! ## What lives here
//! - **Pure HTML parsing** for remote pages (directory page, card detail page).
//! - **Selector choice & precedence** (e.g., prefer `og:title` over `<title>`
//!   over `<h1>` for the card name).
//! - **Tolerant extraction**: an explicit field contract with an explicit
//!   "field absent" result. A missing or malformed field never aborts the
//!   record, let alone the run.
//!
//! ## What does **not** live here
//! - **Networking policy**: one `core::net::http_get` call at the top of each
//!   `fetch_*`, nothing else.
//! - **Concurrency, caching, export formatting**: those are `pool`, `store`
//!   and `export` concerns.
//!
//! ## Typical call chain
//! ```text
//! runner → specs::directory::discover  → DirectoryScan (events + links)
//!        → pool → specs::card::fetch_and_parse (per link) → CardRecord
//! ```
//!
//! ## Testing notes
//! - Specs are testable **offline**: the parse functions take `&str` HTML and
//!   never touch the network.
//! - Keep selectors resilient to whitespace, attribute order, and harmless
//!   markup noise.

pub mod card;
pub mod directory;
