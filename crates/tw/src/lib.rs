//! tw - a hierarchical issue tracker.
//!
//! Issues form a tree of epics, stories and tasks with a side backlog of
//! bugs and ideas. Identifiers encode the hierarchy (`TW-1`, `TW-1-2`,
//! `TW-1-2a`), statuses move through a small state machine, and every
//! change leaves an annotation behind.
//!
//! The [`service::IssueService`] holds the business rules and works over
//! any [`storage::IssueStorage`]: an embedded SQLite file, or TaskWarrior
//! through its command-line interface.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod capture;
pub mod domain;
pub mod error;
pub mod ids;
pub mod refs;
pub mod service;
pub mod storage;
pub mod watch;

// Binary support
pub mod app;
pub mod cli;
pub mod config;
pub mod output;
