//! S4 (overload timeout) : every poll reports `CREATED`, so the overload watchdog fires
//! before `poll_max_duration` would, producing a TIMEOUT envelope whose message mentions
//! the overload condition.

use super::the_module;
use std::sync::Arc;
use std::time::{ Duration, Instant };
use the_module::testing::{ ScriptedResponse, ScriptedTransport };
use the_module::{ HandlerPipeline, HttpMethod, RequestEnvelope, ResponseStatus, RqcConfig, RqcProtocol, TracingListener };

fn rqc_config() -> RqcConfig
{
  RqcConfig
  {
    request_timeout : Duration::from_secs( 5 ),
    retry_max_retries : 3,
    retry_initial_delay : Duration::from_millis( 10 ),
    poll_retry_max_retries : 1,
    poll_interval : Duration::from_millis( 20 ),
    poll_max_duration : Duration::from_secs( 5 ),
    overload_timeout : Duration::from_millis( 150 ),
    max_workers : 4,
    base_url : "https://stkai.example/rqc".to_string(),
  }
}

#[ tokio::test ]
async fn stuck_in_created_times_out_with_overload_message()
{
  let mut script = vec![ ScriptedResponse::json( HttpMethod::Post, 200, r#"{"execution_id":"e4"}"# ) ];
  for _ in 0..30
  {
    script.push( ScriptedResponse::json( HttpMethod::Get, 200, r#"{"progress":{"status":"CREATED"}}"# ) );
  }
  let transport = Arc::new( ScriptedTransport::with_explicit_script( script ) );

  let rqc = RqcProtocol::new( transport, rqc_config(), HandlerPipeline::new(), vec![ Arc::new( TracingListener ) ] );
  let request = RequestEnvelope::with_explicit_id( serde_json::json!( { "x" : 1 } ), Some( "r4".to_string() ), None );

  let started_at = Instant::now();
  let response = rqc.execute( "my-job", request ).await;
  let elapsed = started_at.elapsed();

  assert_eq!( response.status, ResponseStatus::Timeout );
  assert!( response.error.as_deref().unwrap_or_default().contains( "overload" ) );
  assert!( elapsed >= Duration::from_millis( 150 ) );
  assert!( elapsed < Duration::from_secs( 5 ), "should fire the overload watchdog, not poll_max_duration" );
}
