//! Boundary behaviors called out alongside the main scenarios : an unrecognized poll status
//! is treated as non-terminal, a `Retry-After` over the 60s ceiling is ignored while one
//! under it is honored, and the token bucket's `max_wait_time` fires its own timeout error.

use super::the_module;
use std::sync::Arc;
use std::time::Duration;
use the_module::testing::{ ScriptedResponse, ScriptedTransport };
use the_module::
{
  compute_delay, HandlerPipeline, HttpMethod, RawRequest, RequestEnvelope, ResponseStatus,
  RqcConfig, RqcProtocol, SdkError, TokenBucketConfig, TokenBucketTransport, Transport, TracingListener,
};

fn rqc_config() -> RqcConfig
{
  RqcConfig
  {
    request_timeout : Duration::from_secs( 5 ),
    retry_max_retries : 3,
    retry_initial_delay : Duration::from_millis( 10 ),
    poll_retry_max_retries : 1,
    poll_interval : Duration::from_millis( 10 ),
    poll_max_duration : Duration::from_secs( 5 ),
    overload_timeout : Duration::from_secs( 5 ),
    max_workers : 4,
    base_url : "https://stkai.example/rqc".to_string(),
  }
}

#[ tokio::test ]
async fn unrecognized_poll_status_is_tolerated_as_non_terminal()
{
  let transport = Arc::new( ScriptedTransport::with_explicit_script( vec!
  [
    ScriptedResponse::json( HttpMethod::Post, 200, r#"{"execution_id":"e5"}"# ),
    ScriptedResponse::json( HttpMethod::Get, 200, r#"{"progress":{"status":"PREPARING"}}"# ),
    ScriptedResponse::json( HttpMethod::Get, 200, r#"{"progress":{"status":"COMPLETED"},"result":"{\"y\": 9}"}"# ),
  ] ) );

  let rqc = RqcProtocol::new( transport.clone(), rqc_config(), HandlerPipeline::new(), vec![ Arc::new( TracingListener ) ] );
  let request = RequestEnvelope::with_explicit_id( serde_json::json!( { "x" : 1 } ), Some( "r5".to_string() ), None );

  let response = rqc.execute( "my-job", request ).await;

  assert_eq!( response.status, ResponseStatus::Completed );
  assert_eq!( transport.call_count(), 3 );
}

#[ test ]
fn retry_after_beyond_sixty_seconds_is_ignored()
{
  let delay = compute_delay( Duration::from_millis( 100 ), 1, Some( Duration::from_secs( 90 ) ) );
  assert!( delay < Duration::from_secs( 1 ), "a Retry-After above the 60s ceiling must not be honored" );
}

#[ test ]
fn retry_after_within_sixty_seconds_is_honored()
{
  let delay = compute_delay( Duration::from_millis( 100 ), 1, Some( Duration::from_secs( 10 ) ) );
  assert!( delay >= Duration::from_secs( 10 ), "a Retry-After within the 60s ceiling must be honored" );
}

#[ tokio::test ]
async fn server_throttle_drops_retry_after_header_over_sixty_seconds()
{
  let message = "server_throttle built from a header over the ceiling".to_string();
  let error = SdkError::server_throttle( message, Some( "120" ) );
  assert!( error.retry_after().is_none() );

  let honored = SdkError::server_throttle( "within ceiling".to_string(), Some( "30" ) );
  assert_eq!( honored.retry_after(), Some( Duration::from_secs( 30 ) ) );
}

#[ tokio::test ]
async fn token_bucket_max_wait_time_fires_promptly()
{
  let inner = Arc::new( ScriptedTransport::with_explicit_script( vec![] ) );
  // one request per second and no tokens pre-filled beyond the first, so the second
  // call immediately needs to wait roughly a full second, which exceeds max_wait_time
  let config = TokenBucketConfig::with_explicit_rate( 1.0, Duration::from_secs( 1 ), Some( Duration::from_millis( 100 ) ) );
  let bucket = TokenBucketTransport::new( inner, config );

  let first = bucket.call( RawRequest::post_with_explicit_body( "https://stkai.example/rqc/my-job", b"{}".to_vec(), Duration::from_secs( 5 ) ) ).await;
  assert!( first.is_err(), "the script is empty, so the first call fails downstream, not on acquisition" );

  let started_at = std::time::Instant::now();
  let second = bucket.call( RawRequest::post_with_explicit_body( "https://stkai.example/rqc/my-job", b"{}".to_vec(), Duration::from_secs( 5 ) ) ).await;
  let elapsed = started_at.elapsed();

  assert!( matches!( second, Err( SdkError::ClientSideThrottleTimeout( _ ) ) ) );
  assert!( elapsed < Duration::from_millis( 250 ), "max_wait_time=0.1s should fire well under a second" );
}
