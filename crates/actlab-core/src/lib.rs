pub mod assertion;
pub mod doc;
pub mod error;
pub mod harness;
pub mod io;
pub mod runner;
pub mod session;
pub mod suite;
pub mod workflow;

pub use error::{HarnessError, Result};
