mod cache_tests;
mod cipher_tests;
mod record_tests;
mod usage_tests;
