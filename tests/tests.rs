//! Scenario-level integration tests (S1-S6 and boundary behaviors), run against the public
//! protocol types using the in-crate `ScriptedTransport`/`RecordingTransport` test doubles.
//! No real network access.
//!
//! Run with : cargo test --features test-util,rqc,agent,batch-processing

pub use stkai_sdk as the_module;

mod inc;
