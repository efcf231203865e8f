//! The HTTP transport contract and its base (network-performing) implementation.
//!
//! `Transport` is the single capability every decorator (auth, limiters, retry) composes
//! over : a method accepting a method/url/headers/body/timeout and returning a status code,
//! headers and raw body bytes, or failing with a classified `SdkError`. No retry happens at
//! this layer — that is the retry engine's job, one layer up.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::error::{ SdkError, SdkResult };
  use async_trait::async_trait;
  use std::{ collections::HashMap, time::Duration, sync::Arc };

  /// HTTP method recognized by the pipeline. Only the two methods the wire protocol uses.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum HttpMethod
  {
    /// A work-creating call; consumed against the rate-limiter quota.
    Post,
    /// A polling read; never throttled.
    Get,
  }

  impl HttpMethod
  {
    /// Whether this method creates new work against the server-side quota.
    #[ must_use ]
    pub fn is_work_creating( self ) -> bool
    {
      matches!( self, Self::Post )
    }
  }

  /// An outgoing request at the transport boundary.
  #[ derive( Debug, Clone ) ]
  pub struct RawRequest
  {
    pub method : HttpMethod,
    pub url : String,
    pub headers : HashMap< String, String >,
    pub body : Option< Vec< u8 > >,
    pub timeout : Duration,
  }

  impl RawRequest
  {
    /// Build a GET request with an explicit timeout (no implicit default).
    #[ must_use ]
    pub fn get_with_explicit_timeout( url : impl Into< String >, timeout : Duration ) -> Self
    {
      Self { method : HttpMethod::Get, url : url.into(), headers : HashMap::new(), body : None, timeout }
    }

    /// Build a POST request with an explicit body and timeout.
    #[ must_use ]
    pub fn post_with_explicit_body( url : impl Into< String >, body : Vec< u8 >, timeout : Duration ) -> Self
    {
      Self { method : HttpMethod::Post, url : url.into(), headers : HashMap::new(), body : Some( body ), timeout }
    }

    /// Attach a header, returning `self` for chaining.
    #[ must_use ]
    pub fn with_header( mut self, key : impl Into< String >, value : impl Into< String > ) -> Self
    {
      self.headers.insert( key.into(), value.into() );
      self
    }
  }

  /// An incoming response at the transport boundary.
  #[ derive( Debug, Clone ) ]
  pub struct RawResponse
  {
    pub status_code : u16,
    pub headers : HashMap< String, String >,
    pub body_bytes : Vec< u8 >,
  }

  impl RawResponse
  {
    /// The `Retry-After` header, if present, unparsed.
    #[ must_use ]
    pub fn retry_after_header( &self ) -> Option< &str >
    {
      self.headers.iter()
        .find( | ( k, _ ) | k.eq_ignore_ascii_case( "retry-after" ) )
        .map( | ( _, v ) | v.as_str() )
    }

    /// Whether the status code is in the success range.
    #[ must_use ]
    pub fn is_success( &self ) -> bool
    {
      ( 200..300 ).contains( &self.status_code )
    }
  }

  /// The single capability every decorator composes over.
  ///
  /// Implementations compose as a chain : each decorator holds an `Arc<dyn Transport>` to
  /// the next inner transport and implements this same trait, so protocol code
  /// (`rqc`/`agent`) is written once against `dyn Transport` regardless of stack depth.
  #[ async_trait ]
  pub trait Transport : Send + Sync + core::fmt::Debug
  {
    /// Perform one request. No retries, no rate limiting beyond what this specific
    /// implementation itself adds.
    async fn call( &self, request : RawRequest ) -> SdkResult< RawResponse >;
  }

  /// The innermost transport : performs the real network call via `reqwest`, with no auth,
  /// throttling, or retry behavior of its own.
  #[ derive( Debug, Clone ) ]
  pub struct HttpTransport
  {
    client : reqwest::Client,
  }

  impl HttpTransport
  {
    /// Build a transport over an explicit, already-configured `reqwest::Client`.
    #[ must_use ]
    pub fn with_explicit_client( client : reqwest::Client ) -> Self
    {
      Self { client }
    }

    /// Build a transport over a default `reqwest::Client` (compatibility wrapper).
    ///
    /// NOTE: this is a compatibility wrapper with sensible defaults. For explicit control
    /// over connection pooling, TLS, etc., use `with_explicit_client`.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::with_explicit_client( reqwest::Client::new() )
    }
  }

  impl Default for HttpTransport
  {
    fn default() -> Self
    {
      Self::new()
    }
  }

  #[ async_trait ]
  impl Transport for HttpTransport
  {
    async fn call( &self, request : RawRequest ) -> SdkResult< RawResponse >
    {
      let span = tracing::debug_span!( "transport.http", method = ?request.method, url = %request.url );
      let _entered = span.enter();

      let mut builder = match request.method
      {
        HttpMethod::Get => self.client.get( &request.url ),
        HttpMethod::Post => self.client.post( &request.url ),
      };
      builder = builder.timeout( request.timeout );
      for ( key, value ) in &request.headers
      {
        builder = builder.header( key, value );
      }
      if let Some( body ) = request.body
      {
        builder = builder.body( body );
      }

      let response = builder.send().await.map_err( SdkError::from )?;
      let status_code = response.status().as_u16();
      let headers = response.headers().iter()
        .filter_map( | ( k, v ) | v.to_str().ok().map( | v | ( k.to_string(), v.to_string() ) ) )
        .collect();
      let body_bytes = response.bytes().await.map_err( SdkError::from )?.to_vec();

      Ok( RawResponse { status_code, headers, body_bytes } )
    }
  }

  /// Shared handle to a transport, passed down the decorator chain.
  pub type TransportHandle = Arc< dyn Transport >;
}

pub use private::{ HttpMethod, RawRequest, RawResponse, Transport, HttpTransport, TransportHandle };

#[ cfg( any( test, feature = "test-util" ) ) ]
pub mod testing;
