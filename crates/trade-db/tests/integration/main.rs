mod common;
mod reference_tests;
mod repository_tests;
