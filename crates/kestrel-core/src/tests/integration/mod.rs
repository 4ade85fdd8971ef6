pub mod orchestration_tests;
