//! S2 (retried create) : create fails once with a retryable 503, succeeds on the second
//! attempt, and the resulting wall time reflects the configured initial backoff delay.

use super::the_module;
use std::sync::Arc;
use std::time::{ Duration, Instant };
use the_module::testing::{ ScriptedResponse, ScriptedTransport };
use the_module::{ HandlerPipeline, HttpMethod, JsonHandler, RequestEnvelope, ResponseStatus, RqcConfig, RqcProtocol, TracingListener };

fn rqc_config() -> RqcConfig
{
  RqcConfig
  {
    request_timeout : Duration::from_secs( 5 ),
    retry_max_retries : 3,
    retry_initial_delay : Duration::from_millis( 100 ),
    poll_retry_max_retries : 1,
    poll_interval : Duration::from_millis( 10 ),
    poll_max_duration : Duration::from_secs( 5 ),
    overload_timeout : Duration::from_secs( 5 ),
    max_workers : 4,
    base_url : "https://stkai.example/rqc".to_string(),
  }
}

#[ tokio::test ]
async fn second_attempt_succeeds_after_one_retryable_failure()
{
  let transport = Arc::new( ScriptedTransport::with_explicit_script( vec!
  [
    ScriptedResponse::json( HttpMethod::Post, 503, r#"{"message":"overloaded"}"# ),
    ScriptedResponse::json( HttpMethod::Post, 200, r#"{"execution_id":"e2"}"# ),
    ScriptedResponse::json( HttpMethod::Get, 200, r#"{"progress":{"status":"COMPLETED"},"result":"{\"y\": 3}"}"# ),
  ] ) );

  let handlers = HandlerPipeline::new().with_handler( Arc::new( JsonHandler ) );
  let rqc = RqcProtocol::new( transport.clone(), rqc_config(), handlers, vec![ Arc::new( TracingListener ) ] );

  let request = RequestEnvelope::with_explicit_id( serde_json::json!( { "x" : 1 } ), Some( "r2".to_string() ), None );

  let started_at = Instant::now();
  let response = rqc.execute( "my-job", request ).await;
  let elapsed = started_at.elapsed();

  assert_eq!( response.status, ResponseStatus::Completed );
  assert_eq!( response.result.unwrap().as_json(), Some( &serde_json::json!( { "y" : 3 } ) ) );
  assert_eq!( transport.call_count(), 3 );
  assert!( elapsed >= Duration::from_millis( 100 ), "wall time {elapsed:?} should reflect the first retry's backoff" );
}
