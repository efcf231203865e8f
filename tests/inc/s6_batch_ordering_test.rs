//! S6 (batch ordering) : `BatchExecutor` preserves input order in its output regardless of
//! the order in which individual items' RQC executions actually complete, while still
//! bounding concurrency to `max_workers`.

use super::the_module;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use std::time::Duration;
use the_module::{ BatchExecutor, HandlerPipeline, JsonHandler, RawRequest, RawResponse, RequestEnvelope, ResponseStatus, RqcConfig, RqcProtocol, SdkResult, Transport };

#[ derive( Debug ) ]
struct PerItemDelayTransport
{
  in_flight : AtomicUsize,
  high_water_mark : AtomicUsize,
}

impl PerItemDelayTransport
{
  fn new() -> Self
  {
    Self { in_flight : AtomicUsize::new( 0 ), high_water_mark : AtomicUsize::new( 0 ) }
  }

  fn high_water_mark( &self ) -> usize
  {
    self.high_water_mark.load( Ordering::SeqCst )
  }
}

#[ async_trait ]
impl Transport for PerItemDelayTransport
{
  async fn call( &self, request : RawRequest ) -> SdkResult< RawResponse >
  {
    if request.method.is_work_creating()
    {
      let current = self.in_flight.fetch_add( 1, Ordering::SeqCst ) + 1;
      self.high_water_mark.fetch_max( current, Ordering::SeqCst );

      let body : serde_json::Value = serde_json::from_slice( request.body.as_deref().unwrap_or( b"{}" ) ).unwrap();
      let n = body[ "payload" ][ "n" ].as_u64().unwrap();
      // earlier items take longer, so completion order is the reverse of input order
      tokio::time::sleep( Duration::from_millis( ( 5 - n ) * 20 ) ).await;

      self.in_flight.fetch_sub( 1, Ordering::SeqCst );

      let response_body = format!( r#"{{"execution_id":"exec-{n}"}}"# );
      return Ok( RawResponse { status_code : 200, headers : HashMap::new(), body_bytes : response_body.into_bytes() } );
    }

    let execution_id = request.url.rsplit( '/' ).next().unwrap();
    let n : u64 = execution_id.strip_prefix( "exec-" ).unwrap().parse().unwrap();
    let response_body = format!( r#"{{"progress":{{"status":"COMPLETED"}},"result":"{{\"n\": {n}}}"}}"# );
    Ok( RawResponse { status_code : 200, headers : HashMap::new(), body_bytes : response_body.into_bytes() } )
  }
}

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
    max_workers : 2,
    base_url : "https://stkai.example/rqc".to_string(),
  }
}

#[ tokio::test ]
async fn output_order_matches_input_order_despite_reversed_completion()
{
  let transport = Arc::new( PerItemDelayTransport::new() );
  let handlers = HandlerPipeline::new().with_handler( Arc::new( JsonHandler ) );
  let rqc = Arc::new( RqcProtocol::new( transport.clone(), rqc_config(), handlers, vec![] ) );

  let executor = BatchExecutor::with_explicit_workers( 2 );
  let pipeline = Arc::new( move | n : u64 |
  {
    let rqc = rqc.clone();
    async move
    {
      let request = RequestEnvelope::with_explicit_id( serde_json::json!( { "n" : n } ), Some( format!( "item-{n}" ) ), None );
      rqc.execute( "my-job", request ).await
    }
  } );

  let items = vec![ 0_u64, 1, 2, 3, 4 ];
  let results = executor.run( items, pipeline ).await;

  assert_eq!( results.len(), 5 );
  for ( n, response ) in results.iter().enumerate()
  {
    assert_eq!( response.status, ResponseStatus::Completed );
    assert_eq!( response.result.as_ref().unwrap().as_json(), Some( &serde_json::json!( { "n" : n } ) ) );
  }

  assert!( transport.high_water_mark() <= 2, "concurrency should be bounded by max_workers" );
}
