//! Error taxonomy for the request-lifecycle control plane.
//!
//! Every failure mode that can flow back up the decorator stack is a variant of `SdkError`.
//! Each variant carries whatever structure the retry engine or the caller-facing envelope
//! needs : a status code, an optional `Retry-After` value, a source error.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use std::{ fmt, time::Duration };

  /// A single error produced anywhere along the transport / retry / protocol pipeline.
  ///
  /// `SdkError` never crosses the public `execute`/`chat`/`execute_many`/`chat_many`
  /// boundary : those always return a `ResponseEnvelope` whose `error` field carries this
  /// error's `Display` text.
  #[ derive( Debug ) ]
  pub enum SdkError
  {
    /// Connection refused, DNS failure, TLS failure, socket timeout below the HTTP layer.
    Network( String ),
    /// HTTP 5xx.
    HostError { status : u16, message : String },
    /// HTTP 408, or elapsed time exceeded the configured per-call timeout.
    RequestTimeout( String ),
    /// HTTP 429, with the `Retry-After` header value (seconds) if present and valid.
    ServerThrottle { retry_after : Option< u64 >, message : String },
    /// `max_wait_time` exceeded while waiting for a rate-limiter token.
    ClientSideThrottleTimeout( String ),
    /// HTTP 4xx other than 408/429.
    ClientError { status : u16, message : String },
    /// 2xx but the body could not be parsed, or a required field (e.g. `execution_id`) was absent.
    MalformedResponse( String ),
    /// An error raised inside the result-handler pipeline.
    HandlerFailure( String ),
    /// HTTP 401 not recovered by a single credential refresh.
    AuthFailure( String ),
    /// A configuration value rejected by `configure()`.
    Config( String ),
  }

  impl fmt::Display for SdkError
  {
    fn fmt( &self, f : &mut fmt::Formatter< '_ > ) -> fmt::Result
    {
      match self
      {
        Self::Network( msg ) => write!( f, "network error : {msg}" ),
        Self::HostError { status, message } => write!( f, "host error ({status}) : {message}" ),
        Self::RequestTimeout( msg ) => write!( f, "request timeout : {msg}" ),
        Self::ServerThrottle { retry_after, message } => match retry_after
        {
          Some( secs ) => write!( f, "server throttle (retry after {secs}s) : {message}" ),
          None => write!( f, "server throttle : {message}" ),
        },
        Self::ClientSideThrottleTimeout( msg ) => write!( f, "client-side throttle timeout : {msg}" ),
        Self::ClientError { status, message } => write!( f, "client error ({status}) : {message}" ),
        Self::MalformedResponse( msg ) => write!( f, "malformed response : {msg}" ),
        Self::HandlerFailure( msg ) => write!( f, "handler failure : {msg}" ),
        Self::AuthFailure( msg ) => write!( f, "authentication failure : {msg}" ),
        Self::Config( msg ) => write!( f, "configuration error : {msg}" ),
      }
    }
  }

  impl core::error::Error for SdkError {}

  impl SdkError
  {
    /// Whether the retry engine should re-attempt the operation that produced this error.
    #[ must_use ]
    pub fn is_retryable( &self ) -> bool
    {
      matches!(
        self,
        Self::Network( _ )
          | Self::HostError { .. }
          | Self::RequestTimeout( _ )
          | Self::ServerThrottle { .. }
          | Self::ClientSideThrottleTimeout( _ )
      )
    }

    /// The server-supplied `Retry-After` duration, if this error carries one and it is
    /// within the 60-second ceiling the retry engine honors.
    #[ must_use ]
    pub fn retry_after( &self ) -> Option< Duration >
    {
      match self
      {
        Self::ServerThrottle { retry_after : Some( secs ), .. } => Some( Duration::from_secs( *secs ) ),
        _ => None,
      }
    }

    /// Build a `ServerThrottle` from a status-429 response, parsing `Retry-After` as seconds
    /// only (an HTTP-date value fails to parse and is treated as absent).
    #[ must_use ]
    pub fn server_throttle( message : String, retry_after_header : Option< &str > ) -> Self
    {
      let retry_after = retry_after_header
        .and_then( | v | v.trim().parse::< u64 >().ok() )
        .filter( | secs | *secs <= 60 );
      Self::ServerThrottle { retry_after, message }
    }

    /// Classify a completed HTTP response by status code into the appropriate variant.
    /// Returns `None` for 2xx (the caller owns success handling).
    #[ must_use ]
    pub fn from_status( status : u16, message : String, retry_after_header : Option< &str > ) -> Option< Self >
    {
      match status
      {
        200..=299 => None,
        401 => Some( Self::AuthFailure( message ) ),
        408 => Some( Self::RequestTimeout( message ) ),
        429 => Some( Self::server_throttle( message, retry_after_header ) ),
        500..=599 => Some( Self::HostError { status, message } ),
        400..=499 => Some( Self::ClientError { status, message } ),
        _ => Some( Self::ClientError { status, message } ),
      }
    }
  }

  impl From< reqwest::Error > for SdkError
  {
    fn from( error : reqwest::Error ) -> Self
    {
      if error.is_timeout()
      {
        Self::RequestTimeout( error.to_string() )
      }
      else
      {
        Self::Network( error.to_string() )
      }
    }
  }

  impl From< serde_json::Error > for SdkError
  {
    fn from( error : serde_json::Error ) -> Self
    {
      Self::MalformedResponse( format!( "JSON error : {error}" ) )
    }
  }

  /// Result alias used throughout the crate's internal pipeline.
  pub type SdkResult< T > = core::result::Result< T, SdkError >;
}

pub use private::{ SdkError, SdkResult };
