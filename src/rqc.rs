//! Two-phase request/create/poll protocol : POST to create an execution, then GET until a
//! terminal status, bounded by both a total wall budget and an overload watchdog.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::config::RqcConfig;
  use crate::envelope::{ ExecutionStatus, RequestEnvelope, ResponseEnvelope };
  use crate::error::{ SdkError, SdkResult };
  use crate::handlers::HandlerPipeline;
  use crate::listeners::{ self, Listener, ListenerContextMap };
  use crate::retry_logic::{ RetryConfig, RetryExecutor };
  use crate::transport::{ RawRequest, Transport };
  use chrono::Utc;
  use std::sync::Arc;
  use std::time::{ Duration, Instant };

  #[ derive( serde::Deserialize ) ]
  struct CreateExecutionBody
  {
    execution_id : String,
  }

  #[ derive( serde::Deserialize ) ]
  struct PollProgress
  {
    status : String,
  }

  #[ derive( serde::Deserialize ) ]
  struct PollBody
  {
    progress : PollProgress,
    #[ serde( default ) ]
    result : Option< serde_json::Value >,
  }

  /// The assembled RQC protocol : a transport stack, a handler pipeline, and listeners, wired
  /// to implement the create/poll state machine.
  #[ derive( Debug ) ]
  pub struct RqcProtocol
  {
    transport : Arc< dyn Transport >,
    config : RqcConfig,
    handlers : HandlerPipeline,
    listeners : Vec< Arc< dyn Listener > >,
  }

  impl RqcProtocol
  {
    #[ must_use ]
    pub fn new( transport : Arc< dyn Transport >, config : RqcConfig, handlers : HandlerPipeline, listeners : Vec< Arc< dyn Listener > > ) -> Self
    {
      Self { transport, config, handlers, listeners }
    }

    /// Run the full create/poll protocol for one request against `slug` (the job-type path
    /// segment under `base_url`). Never raises : every outcome is encoded in the envelope.
    pub async fn execute( &self, slug : &str, request : RequestEnvelope ) -> ResponseEnvelope
    {
      let span = tracing::info_span!( "rqc.execute", request_id = %request.id, slug );
      let _entered = span.enter();

      let mut context = ListenerContextMap::new();
      listeners::dispatch_before_execute( &self.listeners, &request, &mut context );

      let response = self.execute_inner( slug, request.clone(), &mut context ).await;

      listeners::dispatch_after_execute( &self.listeners, &request, &response, &mut context );
      response
    }

    async fn execute_inner( &self, slug : &str, request : RequestEnvelope, context : &mut ListenerContextMap ) -> ResponseEnvelope
    {
      let create_retry = RetryExecutor::new( RetryConfig::with_explicit_config( self.config.retry_max_retries, self.config.retry_initial_delay ) );

      listeners::dispatch_create_execution_start( &self.listeners, &request, context );
      let create_result = create_retry.execute( | | self.create_execution( slug, &request ) ).await;
      listeners::dispatch_create_execution_end( &self.listeners, &request, context );

      let ( execution_id, submitted_at ) = match create_result
      {
        Ok( value ) => value,
        Err( error ) => return ResponseEnvelope::error( format!( "create-execution failed : {error}" ) ),
      };

      let stamped_request = request.stamp_submitted( execution_id.clone(), submitted_at );
      self.poll_until_terminal( &stamped_request, &execution_id, context ).await
    }

    async fn create_execution( &self, slug : &str, request : &RequestEnvelope ) -> SdkResult< ( String, chrono::DateTime< Utc > ) >
    {
      let mut body = serde_json::Map::new();
      body.insert( "payload".to_string(), request.payload.clone() );
      if let Some( metadata ) = &request.metadata
      {
        body.insert( "metadata".to_string(), metadata.clone() );
      }
      let encoded = serde_json::to_vec( &serde_json::Value::Object( body ) )
        .map_err( | e | SdkError::MalformedResponse( format!( "failed to encode request body : {e}" ) ) )?;

      let raw_request = RawRequest::post_with_explicit_body(
        format!( "{}/{slug}", self.config.base_url ),
        encoded,
        self.config.request_timeout,
      ).with_header( "Content-Type", "application/json" );

      let response = self.transport.call( raw_request ).await?;

      if let Some( error ) = SdkError::from_status( response.status_code, "create-execution failed".to_string(), response.retry_after_header() )
      {
        return Err( error );
      }

      let parsed : CreateExecutionBody = serde_json::from_slice( &response.body_bytes )
        .map_err( | e | SdkError::MalformedResponse( format!( "create-execution response missing execution_id : {e}" ) ) )?;

      Ok( ( parsed.execution_id, Utc::now() ) )
    }

    async fn poll_once( &self, execution_id : &str ) -> SdkResult< ( ExecutionStatus, serde_json::Value ) >
    {
      let raw_request = RawRequest::get_with_explicit_timeout(
        format!( "{}/executions/{execution_id}", self.config.base_url ),
        self.config.request_timeout,
      );
      let response = self.transport.call( raw_request ).await?;

      if let Some( error ) = SdkError::from_status( response.status_code, "poll failed".to_string(), response.retry_after_header() )
      {
        return Err( error );
      }

      let parsed : PollBody = serde_json::from_slice( &response.body_bytes )
        .map_err( | e | SdkError::MalformedResponse( format!( "poll response malformed : {e}" ) ) )?;
      let raw_value : serde_json::Value = serde_json::from_slice( &response.body_bytes ).unwrap_or( serde_json::Value::Null );

      Ok( ( ExecutionStatus::from( parsed.status.as_str() ), raw_value ) )
    }

    async fn poll_until_terminal( &self, request : &RequestEnvelope, execution_id : &str, context : &mut ListenerContextMap ) -> ResponseEnvelope
    {
      let poll_retry = RetryExecutor::new(
        RetryConfig::with_explicit_config( self.config.poll_retry_max_retries, self.config.retry_initial_delay )
      );

      let started_at = Instant::now();
      let mut created_since : Option< Instant > = None;
      let mut previous_status = "CREATED".to_string();

      loop
      {
        if started_at.elapsed() > self.config.poll_max_duration
        {
          return ResponseEnvelope::timeout( "poll_max_duration exceeded".to_string() );
        }

        listeners::dispatch_get_result_start( &self.listeners, request, context );
        let poll_result = poll_retry.execute( | | self.poll_once( execution_id ) ).await;
        listeners::dispatch_get_result_end( &self.listeners, request, context );

        let ( status, raw_response ) = match poll_result
        {
          Ok( value ) => value,
          Err( error ) => return ResponseEnvelope::error( format!( "poll failed : {error}" ) ),
        };

        let status_label = match &status
        {
          ExecutionStatus::Completed => "COMPLETED",
          ExecutionStatus::Failure => "FAILURE",
          ExecutionStatus::Error => "ERROR",
          ExecutionStatus::Created => "CREATED",
          ExecutionStatus::Unknown( raw ) => raw.as_str(),
        };

        if status_label != previous_status
        {
          tracing::debug!( target : "stkai_sdk::rqc", request_id = %request.id, from = %previous_status, to = status_label, "poll transition" );
          listeners::dispatch_status_change( &self.listeners, request, &previous_status, status_label, context );
          previous_status = status_label.to_string();
        }

        if status.starts_overload_watchdog()
        {
          let since = *created_since.get_or_insert_with( Instant::now );
          if since.elapsed() > self.config.overload_timeout
          {
            return ResponseEnvelope::timeout( "execution stuck in CREATED past overload_timeout".to_string() );
          }
        }
        else
        {
          created_since = None;
        }

        if status.is_terminal()
        {
          return self.finalize( status, raw_response, &request.id );
        }

        tokio::time::sleep( self.config.poll_interval ).await;
      }
    }

    fn finalize( &self, status : ExecutionStatus, raw_response : serde_json::Value, request_id : &str ) -> ResponseEnvelope
    {
      match status
      {
        ExecutionStatus::Completed =>
        {
          let raw_result = raw_response.get( "result" ).and_then( serde_json::Value::as_str ).map( ToString::to_string );
          match self.handlers.run( raw_result.clone(), raw_response.clone(), request_id )
          {
            Ok( value ) => ResponseEnvelope::completed( value, raw_result, raw_response ),
            Err( error ) => ResponseEnvelope
            {
              status : crate::envelope::ResponseStatus::Error,
              result : None,
              raw_result,
              error : Some( format!( "handler pipeline failed : {error}" ) ),
              raw_response : Some( raw_response ),
            },
          }
        }
        ExecutionStatus::Failure => ResponseEnvelope::failure( "execution reported FAILURE".to_string(), Some( raw_response ) ),
        ExecutionStatus::Error => ResponseEnvelope::error( "execution reported ERROR".to_string() ),
        ExecutionStatus::Created | ExecutionStatus::Unknown( _ ) => unreachable!( "finalize only called on terminal status" ),
      }
    }
  }
}

pub use private::RqcProtocol;
