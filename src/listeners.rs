//! Event listeners : synchronous lifecycle hooks dispatched around the state machine's phase
//! boundaries. A listener that fails does not abort the call; the failure is logged and
//! swallowed.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::envelope::{ RequestEnvelope, ResponseEnvelope };
  use std::collections::HashMap;
  use std::panic::{ catch_unwind, AssertUnwindSafe };
  use std::sync::Arc;

  /// Per-call scratch space threaded through every hook invocation unchanged; listeners use
  /// it to carry state between hooks (e.g. a start timestamp).
  pub type ListenerContextMap = HashMap< String, serde_json::Value >;

  /// Core lifecycle hooks, invoked around the RQC/Agent protocol's phase boundaries.
  pub trait Listener : Send + Sync + core::fmt::Debug
  {
    fn on_before_execute( &self, _request : &RequestEnvelope, _context : &mut ListenerContextMap ) {}

    /// RQC-only : invoked on every poll transition.
    fn on_status_change( &self, _request : &RequestEnvelope, _old : &str, _new : &str, _context : &mut ListenerContextMap ) {}

    fn on_after_execute( &self, _request : &RequestEnvelope, _response : &ResponseEnvelope, _context : &mut ListenerContextMap ) {}

    /// Returns `Some(self)` when this listener also implements `PhasedListener`, so the RQC
    /// create/poll dispatch can reach the finer-grained hooks through a `Vec<Arc<dyn Listener>>`
    /// without a downcast. A `PhasedListener` impl must override this to return `Some(self)`.
    fn as_phased( &self ) -> Option< &dyn PhasedListener >
    {
      None
    }
  }

  /// Finer-grained hooks some listeners want around the two HTTP phases specifically.
  pub trait PhasedListener : Listener
  {
    fn on_create_execution_start( &self, _request : &RequestEnvelope, _context : &mut ListenerContextMap ) {}
    fn on_create_execution_end( &self, _request : &RequestEnvelope, _context : &mut ListenerContextMap ) {}
    fn on_get_result_start( &self, _request : &RequestEnvelope, _context : &mut ListenerContextMap ) {}
    fn on_get_result_end( &self, _request : &RequestEnvelope, _context : &mut ListenerContextMap ) {}
  }

  /// Built-in listener that mirrors lifecycle events into `tracing` spans, at `debug` level.
  #[ derive( Debug, Default, Clone, Copy ) ]
  pub struct TracingListener;

  impl Listener for TracingListener
  {
    fn on_before_execute( &self, request : &RequestEnvelope, _context : &mut ListenerContextMap )
    {
      tracing::debug!( target : "stkai_sdk::listener", request_id = %request.id, "before_execute" );
    }

    fn on_status_change( &self, request : &RequestEnvelope, old : &str, new : &str, _context : &mut ListenerContextMap )
    {
      tracing::debug!( target : "stkai_sdk::listener", request_id = %request.id, old, new, "status_change" );
    }

    fn on_after_execute( &self, request : &RequestEnvelope, response : &ResponseEnvelope, _context : &mut ListenerContextMap )
    {
      tracing::debug!( target : "stkai_sdk::listener", request_id = %request.id, status = %response.status, "after_execute" );
    }

    fn as_phased( &self ) -> Option< &dyn PhasedListener >
    {
      Some( self )
    }
  }

  impl PhasedListener for TracingListener
  {
    fn on_create_execution_start( &self, request : &RequestEnvelope, _context : &mut ListenerContextMap )
    {
      tracing::debug!( target : "stkai_sdk::listener", request_id = %request.id, "create_execution_start" );
    }

    fn on_create_execution_end( &self, request : &RequestEnvelope, _context : &mut ListenerContextMap )
    {
      tracing::debug!( target : "stkai_sdk::listener", request_id = %request.id, "create_execution_end" );
    }

    fn on_get_result_start( &self, request : &RequestEnvelope, _context : &mut ListenerContextMap )
    {
      tracing::debug!( target : "stkai_sdk::listener", request_id = %request.id, "get_result_start" );
    }

    fn on_get_result_end( &self, request : &RequestEnvelope, _context : &mut ListenerContextMap )
    {
      tracing::debug!( target : "stkai_sdk::listener", request_id = %request.id, "get_result_end" );
    }
  }

  /// Invokes every listener's `on_before_execute` in registration order, logging and
  /// swallowing any panic.
  pub fn dispatch_before_execute( listeners : &[ Arc< dyn Listener > ], request : &RequestEnvelope, context : &mut ListenerContextMap )
  {
    for listener in listeners
    {
      let outcome = catch_unwind( AssertUnwindSafe( | | listener.on_before_execute( request, context ) ) );
      if outcome.is_err()
      {
        tracing::error!( target : "stkai_sdk::listener", request_id = %request.id, "listener panicked in on_before_execute, swallowed" );
      }
    }
  }

  pub fn dispatch_status_change( listeners : &[ Arc< dyn Listener > ], request : &RequestEnvelope, old : &str, new : &str, context : &mut ListenerContextMap )
  {
    for listener in listeners
    {
      let outcome = catch_unwind( AssertUnwindSafe( | | listener.on_status_change( request, old, new, context ) ) );
      if outcome.is_err()
      {
        tracing::error!( target : "stkai_sdk::listener", request_id = %request.id, "listener panicked in on_status_change, swallowed" );
      }
    }
  }

  pub fn dispatch_after_execute( listeners : &[ Arc< dyn Listener > ], request : &RequestEnvelope, response : &ResponseEnvelope, context : &mut ListenerContextMap )
  {
    for listener in listeners
    {
      let outcome = catch_unwind( AssertUnwindSafe( | | listener.on_after_execute( request, response, context ) ) );
      if outcome.is_err()
      {
        tracing::error!( target : "stkai_sdk::listener", request_id = %request.id, "listener panicked in on_after_execute, swallowed" );
      }
    }
  }

  /// Invokes `on_create_execution_start` on every listener that implements `PhasedListener`,
  /// in registration order, logging and swallowing any panic. Listeners that only implement
  /// the core `Listener` hooks are silently skipped (`as_phased` returns `None`).
  pub fn dispatch_create_execution_start( listeners : &[ Arc< dyn Listener > ], request : &RequestEnvelope, context : &mut ListenerContextMap )
  {
    for listener in listeners
    {
      let Some( phased ) = listener.as_phased() else { continue };
      let outcome = catch_unwind( AssertUnwindSafe( | | phased.on_create_execution_start( request, context ) ) );
      if outcome.is_err()
      {
        tracing::error!( target : "stkai_sdk::listener", request_id = %request.id, "listener panicked in on_create_execution_start, swallowed" );
      }
    }
  }

  pub fn dispatch_create_execution_end( listeners : &[ Arc< dyn Listener > ], request : &RequestEnvelope, context : &mut ListenerContextMap )
  {
    for listener in listeners
    {
      let Some( phased ) = listener.as_phased() else { continue };
      let outcome = catch_unwind( AssertUnwindSafe( | | phased.on_create_execution_end( request, context ) ) );
      if outcome.is_err()
      {
        tracing::error!( target : "stkai_sdk::listener", request_id = %request.id, "listener panicked in on_create_execution_end, swallowed" );
      }
    }
  }

  pub fn dispatch_get_result_start( listeners : &[ Arc< dyn Listener > ], request : &RequestEnvelope, context : &mut ListenerContextMap )
  {
    for listener in listeners
    {
      let Some( phased ) = listener.as_phased() else { continue };
      let outcome = catch_unwind( AssertUnwindSafe( | | phased.on_get_result_start( request, context ) ) );
      if outcome.is_err()
      {
        tracing::error!( target : "stkai_sdk::listener", request_id = %request.id, "listener panicked in on_get_result_start, swallowed" );
      }
    }
  }

  pub fn dispatch_get_result_end( listeners : &[ Arc< dyn Listener > ], request : &RequestEnvelope, context : &mut ListenerContextMap )
  {
    for listener in listeners
    {
      let Some( phased ) = listener.as_phased() else { continue };
      let outcome = catch_unwind( AssertUnwindSafe( | | phased.on_get_result_end( request, context ) ) );
      if outcome.is_err()
      {
        tracing::error!( target : "stkai_sdk::listener", request_id = %request.id, "listener panicked in on_get_result_end, swallowed" );
      }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::envelope::ResponseStatus;
    use std::sync::atomic::{ AtomicUsize, Ordering };

    #[ derive( Debug ) ]
    struct PanickingListener;
    impl Listener for PanickingListener
    {
      fn on_before_execute( &self, _request : &RequestEnvelope, _context : &mut ListenerContextMap )
      {
        panic!( "boom" );
      }
    }

    #[ derive( Debug ) ]
    struct CountingListener( Arc< AtomicUsize > );
    impl Listener for CountingListener
    {
      fn on_before_execute( &self, _request : &RequestEnvelope, _context : &mut ListenerContextMap )
      {
        self.0.fetch_add( 1, Ordering::SeqCst );
      }
    }

    #[ test ]
    fn panicking_listener_does_not_stop_dispatch()
    {
      let counter = Arc::new( AtomicUsize::new( 0 ) );
      let listeners : Vec< Arc< dyn Listener > > = vec!
      [
        Arc::new( PanickingListener ),
        Arc::new( CountingListener( counter.clone() ) ),
      ];
      let request = RequestEnvelope::new( serde_json::json!( {} ) );
      let mut context = ListenerContextMap::new();
      dispatch_before_execute( &listeners, &request, &mut context );
      assert_eq!( counter.load( Ordering::SeqCst ), 1 );
    }

    #[ test ]
    fn tracing_listener_does_not_panic_on_any_hook()
    {
      let listener = TracingListener;
      let request = RequestEnvelope::new( serde_json::json!( {} ) );
      let mut context = ListenerContextMap::new();
      listener.on_before_execute( &request, &mut context );
      listener.on_status_change( &request, "CREATED", "RUNNING", &mut context );
      listener.on_after_execute( &request, &ResponseEnvelope::error( "boom".to_string() ), &mut context );
      let _ = ResponseStatus::Error;
    }

    #[ derive( Debug, Default ) ]
    struct PhasedCountingListener
    {
      create_starts : AtomicUsize,
      create_ends : AtomicUsize,
      get_result_starts : AtomicUsize,
      get_result_ends : AtomicUsize,
    }

    impl Listener for PhasedCountingListener
    {
      fn as_phased( &self ) -> Option< &dyn PhasedListener >
      {
        Some( self )
      }
    }

    impl PhasedListener for PhasedCountingListener
    {
      fn on_create_execution_start( &self, _request : &RequestEnvelope, _context : &mut ListenerContextMap )
      {
        self.create_starts.fetch_add( 1, Ordering::SeqCst );
      }

      fn on_create_execution_end( &self, _request : &RequestEnvelope, _context : &mut ListenerContextMap )
      {
        self.create_ends.fetch_add( 1, Ordering::SeqCst );
      }

      fn on_get_result_start( &self, _request : &RequestEnvelope, _context : &mut ListenerContextMap )
      {
        self.get_result_starts.fetch_add( 1, Ordering::SeqCst );
      }

      fn on_get_result_end( &self, _request : &RequestEnvelope, _context : &mut ListenerContextMap )
      {
        self.get_result_ends.fetch_add( 1, Ordering::SeqCst );
      }
    }

    #[ test ]
    fn phased_dispatch_reaches_a_registered_phased_listener_through_vec_dyn_listener()
    {
      let phased = Arc::new( PhasedCountingListener::default() );
      // stored as `Arc<dyn Listener>`, the same way the RQC protocol holds its listeners
      let listeners : Vec< Arc< dyn Listener > > = vec![ phased.clone() ];
      let request = RequestEnvelope::new( serde_json::json!( {} ) );
      let mut context = ListenerContextMap::new();

      dispatch_create_execution_start( &listeners, &request, &mut context );
      dispatch_create_execution_end( &listeners, &request, &mut context );
      dispatch_get_result_start( &listeners, &request, &mut context );
      dispatch_get_result_end( &listeners, &request, &mut context );

      assert_eq!( phased.create_starts.load( Ordering::SeqCst ), 1 );
      assert_eq!( phased.create_ends.load( Ordering::SeqCst ), 1 );
      assert_eq!( phased.get_result_starts.load( Ordering::SeqCst ), 1 );
      assert_eq!( phased.get_result_ends.load( Ordering::SeqCst ), 1 );
    }

    #[ test ]
    fn phased_dispatch_skips_listeners_that_only_implement_the_core_hooks()
    {
      let counting = Arc::new( CountingListener( Arc::new( AtomicUsize::new( 0 ) ) ) );
      let listeners : Vec< Arc< dyn Listener > > = vec![ counting ];
      let request = RequestEnvelope::new( serde_json::json!( {} ) );
      let mut context = ListenerContextMap::new();

      // must not panic even though none of these listeners implement PhasedListener
      dispatch_create_execution_start( &listeners, &request, &mut context );
      dispatch_get_result_end( &listeners, &request, &mut context );
    }
  }
}

pub use private::
{
  ListenerContextMap,
  Listener,
  PhasedListener,
  TracingListener,
  dispatch_before_execute,
  dispatch_status_change,
  dispatch_after_execute,
  dispatch_create_execution_start,
  dispatch_create_execution_end,
  dispatch_get_result_start,
  dispatch_get_result_end,
};
