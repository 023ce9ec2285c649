#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, coverage(off))] // This is all test code, no need to test it.

//! Private helpers for testing and examples in `auto_delegate` packages.
//!
//! The fixtures here observe what happens to bound callables and receivers from the outside:
//! whether they were dropped, how often, and in what order they were called.

mod call_log;
mod drop_counter;

pub use call_log::*;
pub use drop_counter::*;
