//! End-to-end tests for DriveLens live under `tests/`.
