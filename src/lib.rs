//! Commission Engine library crate.
//!
//! This crate exposes the commission rule evaluation engine, the rule
//! collection bookkeeping and the API components as reusable modules.
//! External applications may depend on the `commission_engine` crate and
//! call [`engine::calculate_commission`] directly, share an
//! [`engine::CommissionEngine`] across threads, or embed the API via
//! [`api::build_router`].

pub mod api;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod rate;
pub mod ruleset;
pub mod validation;

pub use engine::{calculate_commission, CommissionEngine};
pub use models::{CommissionRule, EvaluationResult, TransactionContext};
