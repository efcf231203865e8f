//! Result-handler pipeline : a linear chain of handlers turning a raw platform result into
//! the value a caller actually wants.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::error::{ SdkError, SdkResult };
  use std::sync::Arc;

  /// The output of a handler, and of the pipeline as a whole.
  #[ derive( Debug, Clone, PartialEq ) ]
  pub enum HandlerValue
  {
    Raw( String ),
    Json( serde_json::Value ),
  }

  impl HandlerValue
  {
    #[ must_use ]
    pub fn as_raw_str( &self ) -> Option< &str >
    {
      match self
      {
        Self::Raw( s ) => Some( s ),
        Self::Json( _ ) => None,
      }
    }

    #[ must_use ]
    pub fn as_json( &self ) -> Option< &serde_json::Value >
    {
      match self
      {
        Self::Json( v ) => Some( v ),
        Self::Raw( _ ) => None,
      }
    }
  }

  /// What a handler sees. `previous_output` is `None` for the first handler in the chain;
  /// afterwards it carries the prior handler's `HandlerValue`.
  #[ derive( Debug, Clone ) ]
  pub struct HandlerContext
  {
    pub raw_result : Option< String >,
    pub raw_response : serde_json::Value,
    pub request_id : String,
    pub previous_output : Option< HandlerValue >,
    pub handled_flag : bool,
  }

  /// A unary transform `HandlerContext → HandlerValue`. Implementations must not panic;
  /// fallible work returns `Err(SdkError::HandlerFailure)`.
  pub trait Handler : Send + Sync + core::fmt::Debug
  {
    /// # Errors
    /// Returns `SdkError::HandlerFailure` if the transform cannot produce a value.
    fn handle( &self, context : &HandlerContext ) -> SdkResult< HandlerValue >;
  }

  /// Identity handler : passes `raw_result` through unchanged.
  #[ derive( Debug, Default, Clone, Copy ) ]
  pub struct RawHandler;

  impl Handler for RawHandler
  {
    fn handle( &self, context : &HandlerContext ) -> SdkResult< HandlerValue >
    {
      if let Some( previous ) = &context.previous_output
      {
        return Ok( previous.clone() );
      }
      Ok( HandlerValue::Raw( context.raw_result.clone().unwrap_or_default() ) )
    }
  }

  /// Parses a string result as JSON, first stripping a fenced code block
  /// (` ```json ... ``` ` or bare ` ``` ... ``` `) if present. Idempotent : running it twice
  /// on already-structured input returns an equivalent value.
  #[ derive( Debug, Default, Clone, Copy ) ]
  pub struct JsonHandler;

  impl JsonHandler
  {
    fn strip_fence( input : &str ) -> &str
    {
      let trimmed = input.trim();
      let Some( after_open ) = trimmed.strip_prefix( "```" ) else { return trimmed };
      let after_open = after_open.strip_prefix( "json" ).unwrap_or( after_open );
      let after_open = after_open.strip_prefix( '\n' ).unwrap_or( after_open );
      after_open.strip_suffix( "```" ).unwrap_or( after_open ).trim()
    }
  }

  impl Handler for JsonHandler
  {
    fn handle( &self, context : &HandlerContext ) -> SdkResult< HandlerValue >
    {
      if let Some( HandlerValue::Json( value ) ) = &context.previous_output
      {
        return Ok( HandlerValue::Json( value.clone() ) );
      }

      let source = match &context.previous_output
      {
        Some( HandlerValue::Raw( s ) ) => s.clone(),
        None => context.raw_result.clone().unwrap_or_default(),
        Some( HandlerValue::Json( _ ) ) => unreachable!(),
      };

      let stripped = Self::strip_fence( &source );
      let parsed : serde_json::Value = serde_json::from_str( stripped )
        .map_err( | e | SdkError::HandlerFailure( format!( "json handler : {e}" ) ) )?;
      Ok( HandlerValue::Json( parsed ) )
    }
  }

  /// A linear chain of handlers. Each handler's output becomes the next handler's
  /// `previous_output`; the last handler's output becomes `ResponseEnvelope.result`.
  #[ derive( Debug, Clone, Default ) ]
  pub struct HandlerPipeline
  {
    handlers : Vec< Arc< dyn Handler > >,
  }

  impl HandlerPipeline
  {
    #[ must_use ]
    pub fn new() -> Self
    {
      Self { handlers : Vec::new() }
    }

    #[ must_use ]
    pub fn with_handler( mut self, handler : Arc< dyn Handler > ) -> Self
    {
      self.handlers.push( handler );
      self
    }

    /// Run every handler in order. An empty pipeline is equivalent to a single `RawHandler`.
    ///
    /// # Errors
    /// Propagates the first `SdkError::HandlerFailure` encountered.
    pub fn run( &self, raw_result : Option< String >, raw_response : serde_json::Value, request_id : &str ) -> SdkResult< HandlerValue >
    {
      if self.handlers.is_empty()
      {
        return RawHandler.handle( &HandlerContext
        {
          raw_result,
          raw_response,
          request_id : request_id.to_string(),
          previous_output : None,
          handled_flag : false,
        } );
      }

      let mut context = HandlerContext
      {
        raw_result,
        raw_response,
        request_id : request_id.to_string(),
        previous_output : None,
        handled_flag : false,
      };

      for handler in &self.handlers
      {
        let output = handler.handle( &context )?;
        context.previous_output = Some( output );
        context.handled_flag = true;
      }

      Ok( context.previous_output.expect( "non-empty pipeline always produces an output" ) )
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn raw_handler_is_identity()
    {
      let pipeline = HandlerPipeline::new().with_handler( Arc::new( RawHandler ) );
      let out = pipeline.run( Some( "hello".to_string() ), serde_json::json!( {} ), "r1" ).unwrap();
      assert_eq!( out, HandlerValue::Raw( "hello".to_string() ) );
    }

    #[ test ]
    fn json_handler_strips_fence()
    {
      let pipeline = HandlerPipeline::new().with_handler( Arc::new( JsonHandler ) );
      let fenced = "```json\n{\"y\": 2}\n```".to_string();
      let out = pipeline.run( Some( fenced ), serde_json::json!( {} ), "r1" ).unwrap();
      assert_eq!( out, HandlerValue::Json( serde_json::json!( { "y" : 2 } ) ) );
    }

    #[ test ]
    fn json_handler_is_idempotent_on_already_structured_input()
    {
      let pipeline = HandlerPipeline::new()
        .with_handler( Arc::new( JsonHandler ) )
        .with_handler( Arc::new( JsonHandler ) );
      let out = pipeline.run( Some( "{\"y\": 2}".to_string() ), serde_json::json!( {} ), "r1" ).unwrap();
      assert_eq!( out, HandlerValue::Json( serde_json::json!( { "y" : 2 } ) ) );
    }

    #[ test ]
    fn empty_pipeline_behaves_like_raw_handler()
    {
      let pipeline = HandlerPipeline::new();
      let out = pipeline.run( Some( "hi".to_string() ), serde_json::json!( {} ), "r1" ).unwrap();
      assert_eq!( out, HandlerValue::Raw( "hi".to_string() ) );
    }
  }
}

pub use private::{ HandlerValue, HandlerContext, Handler, RawHandler, JsonHandler, HandlerPipeline };
