//! S5 (conversation capture) : with a `ConversationScope` active, the Agent protocol
//! auto-threads the scope's `conversation_id` into the second call's outgoing body.

use super::the_module;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use the_module::{ AgentConfig, AgentProtocol, ChatRequest, ConversationScope, HandlerPipeline, RawRequest, RawResponse, SdkResult, Transport, TracingListener };

#[ derive( Debug ) ]
struct BodyCapturingTransport
{
  responses : Mutex< Vec< Vec< u8 > > >,
  captured_bodies : Mutex< Vec< Vec< u8 > > >,
}

impl BodyCapturingTransport
{
  fn with_explicit_responses( responses : Vec< Vec< u8 > > ) -> Self
  {
    Self { responses : Mutex::new( responses.into_iter().rev().collect() ), captured_bodies : Mutex::new( Vec::new() ) }
  }

  fn captured_bodies( &self ) -> Vec< Vec< u8 > >
  {
    self.captured_bodies.lock().clone()
  }
}

#[ async_trait ]
impl Transport for BodyCapturingTransport
{
  async fn call( &self, request : RawRequest ) -> SdkResult< RawResponse >
  {
    self.captured_bodies.lock().push( request.body.clone().unwrap_or_default() );
    let body = self.responses.lock().pop().expect( "BodyCapturingTransport : script exhausted" );
    Ok( RawResponse { status_code : 200, headers : std::collections::HashMap::new(), body_bytes : body } )
  }
}

fn agent_config() -> AgentConfig
{
  AgentConfig
  {
    request_timeout : Duration::from_secs( 5 ),
    base_url : "https://stkai.example/agent".to_string(),
    retry_max_retries : 3,
    retry_initial_delay : Duration::from_millis( 10 ),
  }
}

#[ tokio::test ]
async fn second_call_carries_captured_conversation_id()
{
  let transport = Arc::new( BodyCapturingTransport::with_explicit_responses( vec!
  [
    br#"{"result":"hi there","conversation_id":"c1"}"#.to_vec(),
    br#"{"result":"continuing","conversation_id":"c1"}"#.to_vec(),
  ] ) );

  let agent = AgentProtocol::new(
    transport.clone(), agent_config(), "agent-1", HandlerPipeline::new(), vec![ Arc::new( TracingListener ) ],
  );

  let _scope = ConversationScope::enter();

  let first = agent.chat( ChatRequest::new( "hello" ) ).await;
  assert!( first.is_ok() );

  let second = agent.chat( ChatRequest::new( "and then?" ) ).await;
  assert!( second.is_ok() );

  let bodies = transport.captured_bodies();
  assert_eq!( bodies.len(), 2 );

  let first_body : serde_json::Value = serde_json::from_slice( &bodies[ 0 ] ).unwrap();
  assert!( first_body.get( "conversation_id" ).is_none() );

  let second_body : serde_json::Value = serde_json::from_slice( &bodies[ 1 ] ).unwrap();
  assert_eq!( second_body.get( "conversation_id" ).and_then( serde_json::Value::as_str ), Some( "c1" ) );
  assert_eq!( second_body.get( "use_conversation" ).and_then( serde_json::Value::as_bool ), Some( true ) );
}
