mod api_tests;
mod common;
mod gateway_tests;
