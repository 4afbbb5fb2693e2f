pub mod cache;
pub mod postgres;
pub mod queue;
pub mod storage;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
