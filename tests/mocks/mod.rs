//! Test doubles shared by the integration tests.

pub mod mock_search_engine;

#[allow(unused_imports)]
pub use mock_search_engine::MockSearchEngine;
