//! Test suites exercising the bus through its public surface.

mod lib_api;
