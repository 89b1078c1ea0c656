#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod batch;
pub mod chrome_stripper;
pub mod chunker;
pub mod crawler;
pub mod format_decoder;
pub mod ingest;

pub use batch::run_worker_loop;
