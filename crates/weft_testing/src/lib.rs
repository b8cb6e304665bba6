//! Test harness for weft mods.
//!
//! Tests run inside the host, against live game state, when the player
//! (or a console command) asks for them. Results go to each mod's
//! `Tests` log channel and come back as a [`TestReport`].
//!
//! ```
//! use std::sync::Arc;
//! use weft_log::{LogConfig, Logs};
//! use weft_system::identity::ModIdentity;
//! use weft_testing::{Test, TestHarness, assert_equal};
//!
//! let logs = Arc::new(Logs::new(LogConfig {
//!     directory: std::env::temp_dir().join("weft-doc-testing"),
//!     ..LogConfig::default()
//! }));
//! let harness = TestHarness::new(logs);
//! let owner = ModIdentity::framework();
//!
//! harness
//!     .test_class(&owner, "Arithmetic")
//!     .add(Test::new("doubles", |(n, twice): (i32, i32)| Ok(assert_equal(n * 2, twice)?))
//!         .case((1, 2))
//!         .case((4, 8)))
//!     .unwrap();
//!
//! let report = harness.run_all();
//! assert_eq!(report.total(), 2);
//! assert!(report.is_success());
//! ```

mod assert;
mod harness;

pub use assert::{
    AssertionError, assert_equal, assert_false, assert_not_equal, assert_throws, assert_true,
};
pub use harness::{
    CaseResult, Cases, FailureKind, Outcome, TESTS_CHANNEL, Test, TestClass, TestHarness,
    TestRegistrationError, TestReport,
};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::{
        Test, TestHarness, TestReport, assert_equal, assert_false, assert_not_equal,
        assert_throws, assert_true,
    };
}
