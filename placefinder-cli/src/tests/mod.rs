//! Shared test harness modules for the Placefinder CLI.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;

mod helpers;
mod serve_unit;
mod unit;
