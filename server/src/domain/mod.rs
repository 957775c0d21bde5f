//! Query compilation for cohort and insight definitions
//!
//! - `params` - per-compilation parameter binding
//! - `sql` - clause builders
//! - `cohorts` - cohort condition trees and their compiler
//! - `insights` - aggregation queries and identity resolution

pub mod cohorts;
pub mod error;
pub mod insights;
pub mod params;
pub mod sql;

pub use error::CompileError;
pub use params::{BuildContext, CompiledQuery, QueryValue};
