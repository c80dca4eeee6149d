//! # wp-sanity-migrate
//!
//! Migrates a WordPress blog, exported as WXR (WordPress eXtended RSS), into
//! a Sanity content lake.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌───────────────┐   ┌──────────────┐
//! │ WXR export   │──▶│ Classifier │──▶│ References    │──▶│ ContentStore │
//! │ (quick-xml)  │   │ posts/atts │   │ authors/terms │   │ Sanity / mem │
//! └──────────────┘   └─────┬──────┘   └───────────────┘   └──────▲───────┘
//!                          │                                     │
//!                          ▼                                     │
//!                    ┌────────────┐   ┌───────────────┐          │
//!                    │ Transcoder │──▶│ Post document │──────────┘
//!                    │ HTML→block │   │ + thumbnail   │
//!                    └────────────┘   └───────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wpmigrate inspect ./wordpress-export.xml      # counts, no network
//! wpmigrate run --dry-run ./wordpress-export.xml
//! SANITY_PROJECT_ID=abc SANITY_DATASET=production \
//!   SANITY_API_WRITE_TOKEN=sk... wpmigrate run ./wordpress-export.xml
//! wpmigrate convert body.html                   # HTML → block JSON
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`wxr`] | Export parsing into typed records |
//! | [`classify`] | Post/attachment partition, attachment URL map |
//! | [`documents`] | Sanity document model and deterministic IDs |
//! | [`references`] | Author/category/tag upsert and name lookup |
//! | [`blocks`] | Block-tree (Portable Text) model |
//! | [`schema`] | Allowed styles, lists, marks and objects |
//! | [`transcode`] | HTML → block conversion and custom rules |
//! | [`assets`] | Featured-image lookup and download |
//! | [`store`] | Content store trait, Sanity client, in-memory store |
//! | [`pipeline`] | Stage ordering and per-post isolation |
//! | [`report`] | Run summary and JSON report |
//! | [`progress`] | Progress on stderr |
//! | [`config`] | TOML + environment configuration |
//! | [`error`] | Error type |

pub mod assets;
pub mod blocks;
pub mod classify;
pub mod config;
pub mod documents;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod references;
pub mod report;
pub mod schema;
pub mod store;
pub mod transcode;
pub mod wxr;

pub use error::{MigrateError, Result};
