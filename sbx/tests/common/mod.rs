pub mod assertions;
pub mod fixtures;

pub use assertions::{assert_contains, assert_path_exists};
pub use fixtures::TestDataRoot;
pub use logging::init_test_logging;
pub use mock_pool::{MockPoolServer, PoolBehavior};
