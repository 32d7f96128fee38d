//! CLI argument and configuration tests
