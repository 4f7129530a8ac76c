//! # rpnbook
//!
//! rpnbook is a double-entry bookkeeping engine whose ledgers are programs in
//! a small reverse Polish notation language.
//!
//! ```text
//! 2021 1 1 date
//! USD "US dollars" commodity
//! Assets:Bank USD open
//! Equity open
//! "Opening" "initial deposit"
//!     Assets:Bank 100 USD xfer
//!     Equity -100 USD xfer
//! xact
//! Assets:Bank 100 USD assert
//! ```
//!
//! A [`Parser`] runs such a program against a [`Context`]. After a run the
//! context is the complete ledger: accounts, commodities, lots, and tags.
#![doc(html_root_url = "https://docs.rs/rpnbook/0.1.0")]

pub mod functions;
mod ledger;
pub mod parse;
pub mod utils;

pub use functions::{Transaction, Transfer, Value};
pub use ledger::*;
pub use parse::{Flow, Outcome, Parser};
