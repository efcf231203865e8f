use super::*;

/// Initializes tracing subscriber for tests, once per process.
#[ allow( dead_code ) ]
fn tracing_init_test()
{
  static TRACING_INIT : std::sync::Once = std::sync::Once::new();
  TRACING_INIT.call_once( ||
  {
    let _ = tracing_subscriber::fmt()
      .with_test_writer()
      .try_init();
  } );
}

mod s1_happy_path_rqc_test;
mod s2_retried_create_test;
mod s3_adaptive_penalty_test;
mod s4_overload_timeout_test;
mod s5_conversation_capture_test;
mod s6_batch_ordering_test;
mod boundary_behaviors_test;
