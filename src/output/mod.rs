//! Verification output: the final report and the running failure log.
//!
//! # Example
//!
//! ```no_run
//! use copyverify::output::Report;
//! use copyverify::verify::VerificationError;
//! use std::path::Path;
//!
//! let errors = vec![VerificationError::missing_destination("b.txt")];
//! Report::new(&errors).save(Path::new("report.txt")).unwrap();
//! ```

pub mod log;
pub mod report;

// Re-export main types
pub use self::log::VerificationLog;
pub use report::{Report, FAILURE_MARKER, SUCCESS_MARKER};
