//! # Fanout Test Suite
//!
//! Cross-crate tests that need real sockets or the repository files.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── harness.rs    # Mock upstreams and an in-process gateway
//!     ├── fanout.rs     # Routing, relay and merge over real HTTP
//!     └── image.rs      # Repository Dockerfile against the image contract
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p fanout-tests
//!
//! # By category
//! cargo test -p fanout-tests integration::fanout::
//! cargo test -p fanout-tests integration::image::
//! ```

pub mod integration;
