//! In-crate test doubles for `Transport`, so every layer above it is testable without a
//! live network dependency. Compiled under `#[cfg(test)]` for internal unit tests and under
//! the `test-util` feature for downstream integration tests.

use super::{ HttpMethod, RawRequest, RawResponse, Transport };
use crate::error::{ SdkError, SdkResult };
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{ AtomicUsize, Ordering };

/// One canned response, keyed loosely by method : call-order scenarios don't need path
/// matching, since each scenario enqueues its responses in the order it expects to consume them.
#[ derive( Debug, Clone ) ]
pub struct ScriptedResponse
{
  pub method : HttpMethod,
  pub status_code : u16,
  pub headers : Vec< ( String, String ) >,
  pub body : Vec< u8 >,
}

impl ScriptedResponse
{
  /// Build a 2xx JSON response.
  #[ must_use ]
  pub fn json( method : HttpMethod, status_code : u16, body : impl Into< String > ) -> Self
  {
    Self { method, status_code, headers : vec![], body : body.into().into_bytes() }
  }

  /// Attach a header, returning `self` for chaining.
  #[ must_use ]
  pub fn with_header( mut self, key : impl Into< String >, value : impl Into< String > ) -> Self
  {
    self.headers.push( ( key.into(), value.into() ) );
    self
  }
}

/// A `Transport` driven by a queue of canned responses, one per call, in enqueue order.
///
/// Panics (via a returned `SdkError::Network`) if called more times than scripted ; this is
/// intentional for integration tests that want to assert exact call counts.
#[ derive( Debug ) ]
pub struct ScriptedTransport
{
  queue : Mutex< VecDeque< ScriptedResponse > >,
  calls : AtomicUsize,
}

impl ScriptedTransport
{
  /// Build a transport from an explicit, ordered list of canned responses.
  #[ must_use ]
  pub fn with_explicit_script( responses : Vec< ScriptedResponse > ) -> Self
  {
    Self { queue : Mutex::new( responses.into() ), calls : AtomicUsize::new( 0 ) }
  }

  /// Number of calls made so far.
  #[ must_use ]
  pub fn call_count( &self ) -> usize
  {
    self.calls.load( Ordering::SeqCst )
  }
}

#[ async_trait ]
impl Transport for ScriptedTransport
{
  async fn call( &self, _request : RawRequest ) -> SdkResult< RawResponse >
  {
    self.calls.fetch_add( 1, Ordering::SeqCst );
    let next = self.queue.lock().pop_front();
    let Some( scripted ) = next else
    {
      return Err( SdkError::Network( "ScriptedTransport : script exhausted".to_string() ) );
    };
    Ok( RawResponse
    {
      status_code : scripted.status_code,
      headers : scripted.headers.into_iter().collect(),
      body_bytes : scripted.body,
    } )
  }
}

/// Wraps another transport and records concurrency high-water-mark and call order, used to
/// assert the batch executor's `max_workers` bound and limiter acquisition behavior.
#[ derive( Debug ) ]
pub struct RecordingTransport
{
  inner : Box< dyn Transport >,
  in_flight : AtomicUsize,
  high_water_mark : AtomicUsize,
  call_order : Mutex< Vec< std::time::Instant > >,
}

impl RecordingTransport
{
  /// Wrap `inner`, recording every call.
  #[ must_use ]
  pub fn new( inner : Box< dyn Transport > ) -> Self
  {
    Self { inner, in_flight : AtomicUsize::new( 0 ), high_water_mark : AtomicUsize::new( 0 ), call_order : Mutex::new( Vec::new() ) }
  }

  /// The maximum number of concurrent in-flight calls observed so far.
  #[ must_use ]
  pub fn high_water_mark( &self ) -> usize
  {
    self.high_water_mark.load( Ordering::SeqCst )
  }

  /// Timestamps of every call, in the order `call` was invoked.
  #[ must_use ]
  pub fn call_order( &self ) -> Vec< std::time::Instant >
  {
    self.call_order.lock().clone()
  }
}

#[ async_trait ]
impl Transport for RecordingTransport
{
  async fn call( &self, request : RawRequest ) -> SdkResult< RawResponse >
  {
    self.call_order.lock().push( std::time::Instant::now() );
    let current = self.in_flight.fetch_add( 1, Ordering::SeqCst ) + 1;
    self.high_water_mark.fetch_max( current, Ordering::SeqCst );
    let result = self.inner.call( request ).await;
    self.in_flight.fetch_sub( 1, Ordering::SeqCst );
    result
  }
}
