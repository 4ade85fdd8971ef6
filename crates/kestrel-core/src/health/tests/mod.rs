pub mod aggregator_tests;
