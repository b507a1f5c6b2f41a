//! # Repository Module
//!
//! Database repository implementations for the register store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  till-service component                                                │
//! │       │                                                                 │
//! │       │  db.registers().find_open("outlet-1", "op-7")                  │
//! │       ▼                                                                 │
//! │  RegisterRepository                 TransactionRepository              │
//! │  ├── insert                         ├── insert_if_open                 │
//! │  ├── get_by_id / find_open          ├── insert_reversal                │
//! │  ├── list_open_for_outlet           ├── get_by_id                      │
//! │  ├── list_closed_for_outlet         ├── list_for / list_for_in         │
//! │  ├── list_discrepancies             └── recent_for                     │
//! │  └── claim_open / write_closing                                        │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Methods ending in `_in` and the close helpers take a caller-held      │
//! │  connection so they can run inside one database transaction.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod register;
pub mod transaction;
