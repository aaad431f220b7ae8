mod bridge_tests;
mod command_tests;
mod config_tests;
mod hook_tests;
mod transport_tests;
