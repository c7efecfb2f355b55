//! Testing infrastructure for todosync.
//!
//! This module provides controllable test doubles for the provider
//! boundary, so reconciliation can be tested deterministically without a
//! real tracker. It is compiled into the library (not behind `cfg(test)`)
//! so integration tests under `tests/` can use it too.
//!
//! # Example
//!
//! ```rust,ignore
//! use todosync::testing::MockProvider;
//!
//! let provider = MockProvider::new()
//!     .with_publish_failure("hash-of-broken-task")
//!     .with_archive_error("tracker offline");
//!
//! assert_eq!(provider.publish_calls().len(), 0);
//! ```

pub mod mocks;

pub use mocks::MockProvider;
