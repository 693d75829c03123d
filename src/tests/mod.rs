
mod active_tests;
mod change_detection_tests;
mod swap_tests;
