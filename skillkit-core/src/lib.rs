#![doc = "skillkit-core: clients and conversion pipelines behind the skillkit tools."]

//! Everything the command-line tools do lives here; the binaries only parse
//! arguments and print.
//!
//! - [`confluence`] and [`jira`]: Data Center REST clients sharing [`atlassian`].
//! - [`convert`]: document to Markdown routing over external converters.
//! - [`google`]: Drive import/export and Vertex AI image generation.
//!
//! Tool locations and timeouts come from [`config::Settings`].

pub mod atlassian;
pub mod config;
pub mod confluence;
pub mod contract;
pub mod convert;
pub mod google;
pub mod jira;
pub mod storage;
pub mod subprocess;
