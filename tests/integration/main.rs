mod cli_tests;
mod degraded_mode_tests;
mod engine_tests;
mod scheduler_tests;
