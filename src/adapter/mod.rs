//! Extraction seams: page driver, per-page web adapters, and the API
//! client. Real and mock implementations live side by side so the
//! workflow and runner layers can be exercised without a live site.

pub mod api;
pub mod driver;
pub mod web;

pub use api::{BankApi, HttpApiClient, MockBankApi};
pub use driver::{HttpPageDriver, MockPageDriver, PageDriver};
pub use web::{AccountsAdapter, CardsAdapter, ExtractionAdapter, LoginAdapter, TransferAdapter};
