//! Fixed-rate token-bucket throttling decorator.
//!
//! Only work-creating calls (POST) consume a token; polling reads (GET) pass through
//! unthrottled, since polling is unbounded per job and must not count against the quota.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::error::{ SdkError, SdkResult };
  use crate::jitter::EphemeralJitter;
  use crate::transport::{ RawRequest, RawResponse, Transport };
  use async_trait::async_trait;
  use parking_lot::Mutex;
  use std::sync::Arc;
  use std::time::{ Duration, Instant };

  struct BucketState
  {
    current_tokens : f64,
    last_refill : Instant,
  }

  /// Explicit token-bucket parameters. `fill_rate` is derived as `max_requests / time_window`.
  #[ derive( Debug, Clone, Copy ) ]
  pub struct TokenBucketConfig
  {
    pub capacity : f64,
    pub fill_rate : f64,
    pub max_wait_time : Option< Duration >,
  }

  impl TokenBucketConfig
  {
    /// Build config from the configuration surface's `(max_requests, time_window)` pair.
    #[ must_use ]
    pub fn with_explicit_rate( max_requests : f64, time_window : Duration, max_wait_time : Option< Duration > ) -> Self
    {
      Self
      {
        capacity : max_requests,
        fill_rate : max_requests / time_window.as_secs_f64(),
        max_wait_time,
      }
    }
  }

  /// A transport decorator enforcing a fixed request rate over work-creating calls.
  #[ derive( Debug ) ]
  pub struct TokenBucketTransport
  {
    inner : Arc< dyn Transport >,
    config : TokenBucketConfig,
    state : Mutex< BucketState >,
  }

  impl TokenBucketTransport
  {
    /// Wrap `inner` with a token bucket, starting at full capacity.
    #[ must_use ]
    pub fn new( inner : Arc< dyn Transport >, config : TokenBucketConfig ) -> Self
    {
      Self
      {
        inner,
        config,
        state : Mutex::new( BucketState { current_tokens : config.capacity, last_refill : Instant::now() } ),
      }
    }

    /// Current token count, for tests and diagnostics.
    #[ must_use ]
    pub fn current_tokens( &self ) -> f64
    {
      self.state.lock().current_tokens
    }

    /// Try to acquire one token, sleeping and retrying refill as needed. Returns an error
    /// once `needed_wait` would exceed `max_wait_time`.
    async fn acquire( &self ) -> SdkResult< () >
    {
      loop
      {
        let needed_wait =
        {
          let mut state = self.state.lock();
          let now = Instant::now();
          let elapsed = now.duration_since( state.last_refill ).as_secs_f64();
          state.current_tokens = ( state.current_tokens + elapsed * self.config.fill_rate ).min( self.config.capacity );
          state.last_refill = now;

          if state.current_tokens >= 1.0
          {
            state.current_tokens -= 1.0;
            return Ok( () );
          }

          ( 1.0 - state.current_tokens ) / self.config.fill_rate
        };

        if let Some( max_wait ) = self.config.max_wait_time
        {
          if Duration::from_secs_f64( needed_wait ) > max_wait
          {
            return Err( SdkError::ClientSideThrottleTimeout(
              format!( "needed wait {needed_wait:.3}s exceeds max_wait_time {:.3}s", max_wait.as_secs_f64() )
            ) );
          }
        }

        let jittered_wait = EphemeralJitter::apply_multiplicative( needed_wait, 0.20 ).max( 0.0 );
        tracing::debug!( target : "stkai_sdk::token_bucket", wait_secs = jittered_wait, "sleeping for token refill" );
        tokio::time::sleep( Duration::from_secs_f64( jittered_wait ) ).await;
      }
    }
  }

  #[ async_trait ]
  impl Transport for TokenBucketTransport
  {
    async fn call( &self, request : RawRequest ) -> SdkResult< RawResponse >
    {
      let _span = tracing::debug_span!( "transport.token_bucket", method = ?request.method ).entered();
      if request.method.is_work_creating()
      {
        self.acquire().await?;
      }
      self.inner.call( request ).await
    }
  }
}

pub use private::{ TokenBucketConfig, TokenBucketTransport };
