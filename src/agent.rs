//! Single-phase Agent protocol : one POST, response carries the full result synchronously.
//! Integrates with `ConversationScope` to auto-thread a `conversation_id` across a sequence
//! of calls without the caller passing it explicitly.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::config::AgentConfig;
  use crate::envelope::{ ConversationScope, ResponseEnvelope };
  use crate::error::{ SdkError, SdkResult };
  use crate::handlers::HandlerPipeline;
  use crate::listeners::{ self, Listener, ListenerContextMap };
  use crate::retry_logic::{ RetryConfig, RetryExecutor };
  use crate::transport::{ RawRequest, Transport };
  use std::sync::Arc;

  /// A chat turn submitted to the Agent protocol.
  #[ derive( Debug, Clone ) ]
  pub struct ChatRequest
  {
    pub user_prompt : String,
    pub conversation_id : Option< String >,
    pub use_knowledge_sources : Option< bool >,
    pub return_knowledge_sources : Option< bool >,
    pub metadata : Option< serde_json::Value >,
  }

  impl ChatRequest
  {
    #[ must_use ]
    pub fn new( user_prompt : impl Into< String > ) -> Self
    {
      Self
      {
        user_prompt : user_prompt.into(),
        conversation_id : None,
        use_knowledge_sources : None,
        return_knowledge_sources : None,
        metadata : None,
      }
    }

    #[ must_use ]
    pub fn with_conversation_id( mut self, conversation_id : impl Into< String > ) -> Self
    {
      self.conversation_id = Some( conversation_id.into() );
      self
    }
  }

  #[ derive( serde::Deserialize ) ]
  struct ChatResponseBody
  {
    #[ serde( alias = "message" ) ]
    result : Option< String >,
    conversation_id : Option< String >,
  }

  /// The assembled Agent protocol : a transport stack, a handler pipeline, and listeners.
  #[ derive( Debug ) ]
  pub struct AgentProtocol
  {
    transport : Arc< dyn Transport >,
    config : AgentConfig,
    agent_id : String,
    handlers : HandlerPipeline,
    listeners : Vec< Arc< dyn Listener > >,
  }

  impl AgentProtocol
  {
    #[ must_use ]
    pub fn new(
      transport : Arc< dyn Transport >,
      config : AgentConfig,
      agent_id : impl Into< String >,
      handlers : HandlerPipeline,
      listeners : Vec< Arc< dyn Listener > >,
    ) -> Self
    {
      Self { transport, config, agent_id : agent_id.into(), handlers, listeners }
    }

    /// Send one chat turn. Never raises. If a `ConversationScope` is active, its id enriches
    /// the outgoing request (unless the request already carries one), and a successful
    /// response captures the scope's id on first use.
    pub async fn chat( &self, mut request : ChatRequest ) -> ResponseEnvelope
    {
      let envelope = crate::envelope::RequestEnvelope::new( serde_json::json!( { "user_prompt" : request.user_prompt } ) );
      let span = tracing::info_span!( "agent.chat", request_id = %envelope.id, agent_id = %self.agent_id );
      let _entered = span.enter();

      let mut context = ListenerContextMap::new();
      listeners::dispatch_before_execute( &self.listeners, &envelope, &mut context );

      if request.conversation_id.is_none()
      {
        request.conversation_id = ConversationScope::current_conversation_id();
      }

      let retry = RetryExecutor::new( RetryConfig::with_explicit_config( self.config.retry_max_retries, self.config.retry_initial_delay ) );
      let outcome = retry.execute( | | self.send_chat( &request ) ).await;

      let response = match outcome
      {
        Ok( ( body, raw_response ) ) =>
        {
          if let Some( conversation_id ) = &body.conversation_id
          {
            if ConversationScope::is_active()
            {
              ConversationScope::capture( conversation_id.clone() );
            }
          }

          let raw_result = body.result.clone();
          match self.handlers.run( raw_result.clone(), raw_response.clone(), &envelope.id )
          {
            Ok( value ) => ResponseEnvelope::success( value, raw_result, raw_response ),
            Err( error ) => ResponseEnvelope::error( format!( "handler pipeline failed : {error}" ) ),
          }
        }
        Err( error ) => ResponseEnvelope::error( format!( "agent chat failed : {error}" ) ),
      };

      listeners::dispatch_after_execute( &self.listeners, &envelope, &response, &mut context );
      response
    }

    async fn send_chat( &self, request : &ChatRequest ) -> SdkResult< ( ChatResponseBody, serde_json::Value ) >
    {
      let mut body = serde_json::Map::new();
      body.insert( "user_prompt".to_string(), serde_json::Value::String( request.user_prompt.clone() ) );
      if let Some( conversation_id ) = &request.conversation_id
      {
        body.insert( "conversation_id".to_string(), serde_json::Value::String( conversation_id.clone() ) );
        body.insert( "use_conversation".to_string(), serde_json::Value::Bool( true ) );
      }
      if let Some( flag ) = request.use_knowledge_sources
      {
        body.insert( "use_knowledge_sources".to_string(), serde_json::Value::Bool( flag ) );
      }
      if let Some( flag ) = request.return_knowledge_sources
      {
        body.insert( "return_knowledge_sources".to_string(), serde_json::Value::Bool( flag ) );
      }
      if let Some( metadata ) = &request.metadata
      {
        body.insert( "metadata".to_string(), metadata.clone() );
      }

      let encoded = serde_json::to_vec( &serde_json::Value::Object( body ) )
        .map_err( | e | SdkError::MalformedResponse( format!( "failed to encode chat request : {e}" ) ) )?;

      let raw_request = RawRequest::post_with_explicit_body(
        format!( "{}/v1/agent/{}/chat", self.config.base_url, self.agent_id ),
        encoded,
        self.config.request_timeout,
      ).with_header( "Content-Type", "application/json" );

      let response = self.transport.call( raw_request ).await?;

      if let Some( error ) = SdkError::from_status( response.status_code, "agent chat failed".to_string(), response.retry_after_header() )
      {
        return Err( error );
      }

      let raw_value : serde_json::Value = serde_json::from_slice( &response.body_bytes )
        .map_err( | e | SdkError::MalformedResponse( format!( "agent response malformed : {e}" ) ) )?;
      let parsed : ChatResponseBody = serde_json::from_value( raw_value.clone() )
        .map_err( | e | SdkError::MalformedResponse( format!( "agent response missing fields : {e}" ) ) )?;

      Ok( ( parsed, raw_value ) )
    }
  }
}

pub use private::{ ChatRequest, AgentProtocol };
