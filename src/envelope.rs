//! The request/response value types every protocol (RQC, Agent) is built around, plus the
//! dynamically-scoped `ConversationScope` the Agent protocol consults.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::handlers::HandlerValue;
  use chrono::{ DateTime, Utc };
  use std::cell::RefCell;
  use std::sync::{ Arc, Mutex };
  use uuid::Uuid;

  /// The caller-owned unit of work submitted to either protocol.
  ///
  /// Immutable after construction except for two derived audit fields
  /// (`execution_id`, `submitted_at`), which only the RQC state machine stamps, via
  /// `stamp_submitted` (a consuming setter, since the type is otherwise a plain value).
  #[ derive( Debug, Clone ) ]
  pub struct RequestEnvelope
  {
    pub payload : serde_json::Value,
    pub id : String,
    pub metadata : Option< serde_json::Value >,
    pub execution_id : Option< String >,
    pub submitted_at : Option< DateTime< Utc > >,
  }

  impl RequestEnvelope
  {
    /// Build an envelope, auto-generating `id` if none is supplied.
    #[ must_use ]
    pub fn with_explicit_id( payload : serde_json::Value, id : Option< String >, metadata : Option< serde_json::Value > ) -> Self
    {
      Self
      {
        payload,
        id : id.unwrap_or_else( | | Uuid::new_v4().to_string() ),
        metadata,
        execution_id : None,
        submitted_at : None,
      }
    }

    /// Build an envelope with an auto-generated id (compatibility wrapper).
    #[ must_use ]
    pub fn new( payload : serde_json::Value ) -> Self
    {
      Self::with_explicit_id( payload, None, None )
    }

    /// Attach caller-supplied metadata.
    #[ must_use ]
    pub fn with_metadata( mut self, metadata : serde_json::Value ) -> Self
    {
      self.metadata = Some( metadata );
      self
    }

    /// Record the `execution_id` the create phase returned and the instant it was recorded.
    /// Only the RQC state machine calls this.
    #[ must_use ]
    pub fn stamp_submitted( mut self, execution_id : String, submitted_at : DateTime< Utc > ) -> Self
    {
      self.execution_id = Some( execution_id );
      self.submitted_at = Some( submitted_at );
      self
    }
  }

  /// Outcome vocabulary shared by both protocols. RQC never produces `Success`; Agent never
  /// produces `Completed` or `Failure`.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum ResponseStatus
  {
    Completed,
    Failure,
    Error,
    Timeout,
    Success,
  }

  impl core::fmt::Display for ResponseStatus
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      let label = match self
      {
        Self::Completed => "COMPLETED",
        Self::Failure => "FAILURE",
        Self::Error => "ERROR",
        Self::Timeout => "TIMEOUT",
        Self::Success => "SUCCESS",
      };
      f.write_str( label )
    }
  }

  /// The value always returned to callers; the public surface never raises.
  #[ derive( Debug, Clone ) ]
  pub struct ResponseEnvelope
  {
    pub status : ResponseStatus,
    pub result : Option< HandlerValue >,
    pub raw_result : Option< String >,
    pub error : Option< String >,
    pub raw_response : Option< serde_json::Value >,
  }

  impl ResponseEnvelope
  {
    #[ must_use ]
    pub fn completed( result : HandlerValue, raw_result : Option< String >, raw_response : serde_json::Value ) -> Self
    {
      Self { status : ResponseStatus::Completed, result : Some( result ), raw_result, error : None, raw_response : Some( raw_response ) }
    }

    #[ must_use ]
    pub fn success( result : HandlerValue, raw_result : Option< String >, raw_response : serde_json::Value ) -> Self
    {
      Self { status : ResponseStatus::Success, result : Some( result ), raw_result, error : None, raw_response : Some( raw_response ) }
    }

    #[ must_use ]
    pub fn failure( error : String, raw_response : Option< serde_json::Value > ) -> Self
    {
      Self { status : ResponseStatus::Failure, result : None, raw_result : None, error : Some( error ), raw_response }
    }

    #[ must_use ]
    pub fn error( error : String ) -> Self
    {
      Self { status : ResponseStatus::Error, result : None, raw_result : None, error : Some( error ), raw_response : None }
    }

    #[ must_use ]
    pub fn timeout( error : String ) -> Self
    {
      Self { status : ResponseStatus::Timeout, result : None, raw_result : None, error : Some( error ), raw_response : None }
    }

    #[ must_use ]
    pub fn is_ok( &self ) -> bool
    {
      matches!( self.status, ResponseStatus::Completed | ResponseStatus::Success )
    }
  }

  /// Server-reported status string during RQC polling. Anything not in the recognized set is
  /// treated as non-terminal so the client tolerates new intermediate states the server might
  /// introduce.
  #[ derive( Debug, Clone, PartialEq, Eq ) ]
  pub enum ExecutionStatus
  {
    Completed,
    Failure,
    Error,
    Created,
    Unknown( String ),
  }

  impl ExecutionStatus
  {
    #[ must_use ]
    pub fn is_terminal( &self ) -> bool
    {
      matches!( self, Self::Completed | Self::Failure | Self::Error )
    }

    #[ must_use ]
    pub fn starts_overload_watchdog( &self ) -> bool
    {
      matches!( self, Self::Created )
    }
  }

  impl From< &str > for ExecutionStatus
  {
    fn from( value : &str ) -> Self
    {
      match value
      {
        "COMPLETED" => Self::Completed,
        "FAILURE" => Self::Failure,
        "ERROR" => Self::Error,
        "CREATED" => Self::Created,
        other => Self::Unknown( other.to_string() ),
      }
    }
  }

  struct ScopeFrame
  {
    conversation_id : Mutex< Option< String > >,
  }

  thread_local!
  {
    static SCOPE_STACK : RefCell< Vec< Arc< ScopeFrame > > > = const { RefCell::new( Vec::new() ) };
  }

  /// RAII handle for an entered conversation scope. Dropping it pops the scope, discarding
  /// any id it captured.
  #[ derive( Debug ) ]
  pub struct ConversationScopeGuard
  {
    _private : (),
  }

  impl Drop for ConversationScopeGuard
  {
    fn drop( &mut self )
    {
      SCOPE_STACK.with( | stack | { stack.borrow_mut().pop(); } );
    }
  }

  /// A dynamically-scoped region that the Agent protocol consults to auto-thread a
  /// `conversation_id` through a sequence of calls, without the caller passing it explicitly.
  ///
  /// Scopes nest on a per-thread stack; the innermost entered scope is the one Agent calls see.
  /// Note: because the stack is thread-local, a scope entered on one executor thread is not
  /// visible if an awaited call resumes on a different worker thread. Callers that need the
  /// scope to span `.await` points under a work-stealing runtime should pre-seed the id
  /// (`enter_with_preset`) rather than relying on capture.
  #[ derive( Debug ) ]
  pub struct ConversationScope;

  impl ConversationScope
  {
    /// Enter a fresh scope with no preset id; it will capture the first successful response's
    /// `conversation_id`.
    #[ must_use ]
    pub fn enter() -> ConversationScopeGuard
    {
      Self::enter_with_preset( None )
    }

    /// Enter a scope pre-seeded with a known id, avoiding the capture race when concurrent
    /// batch calls enter the scope before any response has arrived.
    #[ must_use ]
    pub fn enter_with_preset( conversation_id : Option< String > ) -> ConversationScopeGuard
    {
      SCOPE_STACK.with( | stack |
      {
        stack.borrow_mut().push( Arc::new( ScopeFrame { conversation_id : Mutex::new( conversation_id ) } ) );
      } );
      ConversationScopeGuard { _private : () }
    }

    /// The innermost active scope's captured id, if any scope is active and has one.
    #[ must_use ]
    pub fn current_conversation_id() -> Option< String >
    {
      SCOPE_STACK.with( | stack |
      {
        stack.borrow().last().and_then( | frame | frame.conversation_id.lock().unwrap().clone() )
      } )
    }

    /// Whether any scope is currently active.
    #[ must_use ]
    pub fn is_active() -> bool
    {
      SCOPE_STACK.with( | stack | !stack.borrow().is_empty() )
    }

    /// Record `conversation_id` into the innermost active scope, only if it has none yet.
    /// A no-op if no scope is active.
    pub fn capture( conversation_id : String )
    {
      SCOPE_STACK.with( | stack |
      {
        if let Some( frame ) = stack.borrow().last()
        {
          let mut slot = frame.conversation_id.lock().unwrap();
          if slot.is_none()
          {
            *slot = Some( conversation_id );
          }
        }
      } );
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn request_envelope_auto_generates_id()
    {
      let env = RequestEnvelope::new( serde_json::json!( { "x" : 1 } ) );
      assert!( !env.id.is_empty() );
      assert!( env.execution_id.is_none() );
    }

    #[ test ]
    fn execution_status_unknown_is_non_terminal()
    {
      let status = ExecutionStatus::from( "RUNNING" );
      assert!( !status.is_terminal() );
      assert!( !status.starts_overload_watchdog() );
    }

    #[ test ]
    fn conversation_scope_capture_and_nesting()
    {
      let _outer = ConversationScope::enter_with_preset( Some( "outer-id".to_string() ) );
      assert_eq!( ConversationScope::current_conversation_id(), Some( "outer-id".to_string() ) );

      {
        let _inner = ConversationScope::enter();
        assert_eq!( ConversationScope::current_conversation_id(), None );
        ConversationScope::capture( "inner-id".to_string() );
        assert_eq!( ConversationScope::current_conversation_id(), Some( "inner-id".to_string() ) );
      }

      assert_eq!( ConversationScope::current_conversation_id(), Some( "outer-id".to_string() ) );
    }
  }
}

pub use private::{ RequestEnvelope, ResponseEnvelope, ResponseStatus, ExecutionStatus, ConversationScope, ConversationScopeGuard };
