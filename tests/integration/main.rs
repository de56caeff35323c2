//! End-to-end tests: rules firing through real transactions.

mod handlers;
