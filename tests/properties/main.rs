mod determinism_tests;
mod ordering_tests;
