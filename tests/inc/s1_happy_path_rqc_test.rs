//! S1 (happy path RQC) : create succeeds, one non-terminal poll, then COMPLETED with a JSON result.

use super::the_module;
use std::sync::Arc;
use std::time::Duration;
use the_module::testing::{ ScriptedResponse, ScriptedTransport };
use the_module::{ HandlerPipeline, HttpMethod, JsonHandler, RequestEnvelope, ResponseStatus, RqcConfig, RqcProtocol, TracingListener };

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
async fn completes_after_one_intermediate_poll()
{
  let transport = Arc::new( ScriptedTransport::with_explicit_script( vec!
  [
    ScriptedResponse::json( HttpMethod::Post, 200, r#"{"execution_id":"e1"}"# ),
    ScriptedResponse::json( HttpMethod::Get, 200, r#"{"progress":{"status":"RUNNING"}}"# ),
    ScriptedResponse::json( HttpMethod::Get, 200, r#"{"progress":{"status":"COMPLETED"},"result":"{\"y\": 2}"}"# ),
  ] ) );

  let handlers = HandlerPipeline::new().with_handler( Arc::new( JsonHandler ) );
  let rqc = RqcProtocol::new( transport.clone(), rqc_config(), handlers, vec![ Arc::new( TracingListener ) ] );

  let request = RequestEnvelope::with_explicit_id( serde_json::json!( { "x" : 1 } ), Some( "r1".to_string() ), None );
  let response = rqc.execute( "my-job", request ).await;

  assert_eq!( response.status, ResponseStatus::Completed );
  assert_eq!( response.raw_result.as_deref(), Some( "{\"y\": 2}" ) );
  assert_eq!( response.result.unwrap().as_json(), Some( &serde_json::json!( { "y" : 2 } ) ) );
  assert_eq!( transport.call_count(), 3 );
}
