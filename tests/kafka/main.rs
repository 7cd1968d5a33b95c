//! Kafka E2E tests
//!
//! These tests need a running broker at `kafka:9092` and are ignored by
//! default. Run them with `cargo test --test kafka -- --ignored`.

mod round_trip;
