//! Unit tests for individual components, collected from `tests/unit/`.

mod unit;
