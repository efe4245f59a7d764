//! Integration tests: full ledger flows through the repository seam and
//! the HTTP API.

mod api_flow;
mod ledger_flow;
mod memory_ledger;
