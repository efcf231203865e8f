//! S3 (adaptive penalty) : a 429 on a work-creating call cuts `effective_rate` by the AIMD
//! penalty, a subsequent 2xx recovers it. Structural jitter is pinned to exactly `1.0` so the
//! transitions are checked exactly rather than just range-bounded.

use super::the_module;
use std::sync::Arc;
use the_module::testing::{ ScriptedResponse, ScriptedTransport };
use the_module::{ AdaptiveLimiterConfig, AdaptiveLimiterTransport, HttpMethod, RawRequest, StructuralJitter, Transport };

fn approx_eq( a : f64, b : f64 )
{
  assert!( ( a - b ).abs() < 1e-9, "expected {a} to equal {b}" );
}

#[ tokio::test ]
async fn penalty_then_recovery_transitions_are_exact()
{
  let inner = Arc::new( ScriptedTransport::with_explicit_script( vec!
  [
    ScriptedResponse::json( HttpMethod::Post, 429, r#"{"message":"throttled"}"# ),
    ScriptedResponse::json( HttpMethod::Post, 200, r#"{"execution_id":"e3"}"# ),
  ] ) );

  let config = AdaptiveLimiterConfig::with_explicit_config( 60.0, 0.1, 0.3, 0.05, None );
  let jitter = StructuralJitter::with_explicit_seed( 0, 0.0 );
  let limiter = AdaptiveLimiterTransport::with_explicit_jitter( inner, config, jitter );

  approx_eq( limiter.effective_rate(), 60.0 );

  let throttled = limiter.call( RawRequest::post_with_explicit_body(
    "https://stkai.example/rqc/my-job", b"{}".to_vec(), std::time::Duration::from_secs( 5 ),
  ) ).await;
  assert!( throttled.is_err() );
  approx_eq( limiter.effective_rate(), 42.0 );

  let recovered = limiter.call( RawRequest::post_with_explicit_body(
    "https://stkai.example/rqc/my-job", b"{}".to_vec(), std::time::Duration::from_secs( 5 ),
  ) ).await;
  assert!( recovered.is_ok() );
  approx_eq( limiter.effective_rate(), 45.0 );
}
