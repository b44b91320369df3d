pub mod builder_tests;
pub mod codegen_tests;
pub mod config_tests;
pub mod parser_tests;
pub mod validator_tests;
