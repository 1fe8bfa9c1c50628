//! # Fanout Image
//!
//! The container image contract for the gateway, as code.
//!
//! - [`ImageSpec`] describes the image and renders its Dockerfile
//! - [`Dockerfile::parse`] reads any Dockerfile into stages and instructions
//! - [`verify`] checks a parsed Dockerfile against the contract and reports
//!   every violation at once
//! - [`Launcher`] runs the declared entry command locally with the same exit
//!   status semantics as the container
//!
//! ```rust,ignore
//! use fanout_image::{verify, Dockerfile};
//!
//! let dockerfile = Dockerfile::parse(&std::fs::read_to_string("Dockerfile")?)?;
//! let report = verify(&dockerfile)?;
//! assert_eq!(report.port, 8080);
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod contract;
pub mod dockerfile;
pub mod launch;
pub mod spec;

pub use contract::{verify, ContractReport, ContractViolation, ContractViolations};
pub use dockerfile::{Dockerfile, ImageRef, Instruction, LaunchForm, ParseError, Stage};
pub use launch::{exit_code, LaunchError, Launcher, Lifecycle, LifecycleError};
pub use spec::{ImageSpec, SpecError};
