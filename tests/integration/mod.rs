pub mod bundle_tests;
pub mod concurrency_tests;
