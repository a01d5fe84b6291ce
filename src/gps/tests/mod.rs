//! Tests for the GPS point registry and map rendering
