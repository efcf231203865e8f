//! Bounded-concurrency batch executor : runs a pipeline over a list of items with at most
//! `max_workers` concurrent in flight, preserving input order in the output, and never
//! propagating a worker panic out of the batch.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::envelope::ResponseEnvelope;
  use std::future::Future;
  use std::sync::Arc;
  use tokio::sync::Semaphore;

  /// Explicit worker-count configuration.
  #[ derive( Debug, Clone, Copy ) ]
  pub struct BatchExecutor
  {
    max_workers : usize,
  }

  impl BatchExecutor
  {
    /// Build an executor with an explicit concurrency cap.
    #[ must_use ]
    pub fn with_explicit_workers( max_workers : usize ) -> Self
    {
      Self { max_workers : max_workers.max( 1 ) }
    }

    /// Run `pipeline` over every item in `items`, at most `max_workers` concurrently.
    /// `pipeline` must itself never raise (the RQC/Agent protocols already guarantee this);
    /// a worker that panics is caught and converted into an ERROR envelope at its slot.
    pub async fn run< T, F, Fut >( &self, items : Vec< T >, pipeline : Arc< F > ) -> Vec< ResponseEnvelope >
    where
      T : Send + 'static,
      F : Fn( T ) -> Fut + Send + Sync + 'static,
      Fut : Future< Output = ResponseEnvelope > + Send + 'static,
    {
      let semaphore = Arc::new( Semaphore::new( self.max_workers ) );
      let mut handles = Vec::with_capacity( items.len() );

      for ( index, item ) in items.into_iter().enumerate()
      {
        let semaphore = semaphore.clone();
        let pipeline = pipeline.clone();
        let handle = tokio::spawn( async move
        {
          let _permit = semaphore.acquire_owned().await.expect( "semaphore is never closed" );
          pipeline( item ).await
        } );
        handles.push( ( index, handle ) );
      }

      let mut results : Vec< ResponseEnvelope > = Vec::with_capacity( handles.len() );
      results.resize_with( handles.len(), | | ResponseEnvelope::error( "slot never filled".to_string() ) );

      for ( index, handle ) in handles
      {
        results[ index ] = match handle.await
        {
          Ok( response ) => response,
          Err( join_error ) =>
          {
            tracing::error!( target : "stkai_sdk::batch", index, error = %join_error, "batch worker panicked, converting to ERROR" );
            ResponseEnvelope::error( format!( "batch worker panicked : {join_error}" ) )
          }
        };
      }

      results
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;
    use crate::envelope::ResponseStatus;

    #[ tokio::test ]
    async fn preserves_order_under_concurrency()
    {
      let executor = BatchExecutor::with_explicit_workers( 2 );
      let pipeline = Arc::new( | n : u32 | async move
      {
        tokio::time::sleep( std::time::Duration::from_millis( u64::from( 10 - n ) ) ).await;
        ResponseEnvelope::success( crate::handlers::HandlerValue::Raw( n.to_string() ), None, serde_json::json!( {} ) )
      } );

      let results = executor.run( vec![ 0, 1, 2, 3, 4 ], pipeline ).await;
      let values : Vec< String > = results.iter()
        .map( | r | r.result.as_ref().and_then( crate::handlers::HandlerValue::as_raw_str ).unwrap().to_string() )
        .collect();
      assert_eq!( values, vec![ "0", "1", "2", "3", "4" ] );
    }

    #[ tokio::test ]
    async fn panicking_worker_becomes_error_envelope()
    {
      let executor = BatchExecutor::with_explicit_workers( 4 );
      let pipeline = Arc::new( | n : u32 | async move
      {
        if n == 1
        {
          panic!( "boom" );
        }
        ResponseEnvelope::success( crate::handlers::HandlerValue::Raw( n.to_string() ), None, serde_json::json!( {} ) )
      } );

      let results = executor.run( vec![ 0, 1, 2 ], pipeline ).await;
      assert_eq!( results[ 0 ].status, ResponseStatus::Success );
      assert_eq!( results[ 1 ].status, ResponseStatus::Error );
      assert_eq!( results[ 2 ].status, ResponseStatus::Success );
    }
  }
}

pub use private::BatchExecutor;
