//! Workflow orchestration and reconciliation for the Altoro Mutual demo
//! bank. Drives the site's login, scrape, transfer and card-catalog
//! workflows alongside its REST API, normalizes both sources into one
//! record model, reconciles them, and assembles a multi-sheet report.

pub mod adapter;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod record;
pub mod report;
pub mod runner;
pub mod workflow;
