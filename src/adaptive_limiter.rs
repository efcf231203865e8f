//! Feedback-driven (AIMD) throttling decorator.
//!
//! Same acquisition contract as the token bucket, but `effective_rate` is mutable and the
//! limiter observes outcomes on the return path : every 2xx nudges the rate up, a 429 cuts
//! it down, multiplicatively, clamped to `min_floor_rate`. The amount of increase/decrease
//! is perturbed by **structural** jitter so that independent processes sharing a quota
//! desynchronize instead of oscillating in lock-step.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::error::{ SdkError, SdkResult };
  use crate::jitter::{ EphemeralJitter, StructuralJitter };
  use crate::transport::{ RawRequest, RawResponse, Transport };
  use async_trait::async_trait;
  use parking_lot::Mutex;
  use std::sync::Arc;
  use std::time::{ Duration, Instant };

  struct AdaptiveState
  {
    effective_rate : f64,
    current_tokens : f64,
    last_refill : Instant,
  }

  /// Explicit adaptive-limiter parameters.
  #[ derive( Debug, Clone, Copy ) ]
  pub struct AdaptiveLimiterConfig
  {
    pub max_rate : f64,
    pub min_floor_rate : f64,
    pub penalty_factor : f64,
    pub recovery_factor : f64,
    pub max_wait_time : Option< Duration >,
  }

  impl AdaptiveLimiterConfig
  {
    /// Build config from the configuration surface's `rate_limit` group.
    #[ must_use ]
    pub fn with_explicit_config(
      max_requests : f64,
      min_rate_floor_fraction : f64,
      penalty_factor : f64,
      recovery_factor : f64,
      max_wait_time : Option< Duration >,
    ) -> Self
    {
      Self
      {
        max_rate : max_requests,
        min_floor_rate : ( max_requests * min_rate_floor_fraction ).max( f64::MIN_POSITIVE ),
        penalty_factor,
        recovery_factor,
        max_wait_time,
      }
    }
  }

  /// A transport decorator enforcing a server-feedback-adjusted request rate over
  /// work-creating calls.
  #[ derive( Debug ) ]
  pub struct AdaptiveLimiterTransport
  {
    inner : Arc< dyn Transport >,
    config : AdaptiveLimiterConfig,
    structural_jitter : StructuralJitter,
    state : Mutex< AdaptiveState >,
  }

  impl AdaptiveLimiterTransport
  {
    /// Wrap `inner`, starting optimistically at `max_rate` (cold start).
    #[ must_use ]
    pub fn new( inner : Arc< dyn Transport >, config : AdaptiveLimiterConfig ) -> Self
    {
      Self::with_explicit_jitter( inner, config, StructuralJitter::new() )
    }

    /// Wrap `inner` with an explicit structural-jitter source, for tests wanting two
    /// "independent processes" seeded differently.
    #[ must_use ]
    pub fn with_explicit_jitter( inner : Arc< dyn Transport >, config : AdaptiveLimiterConfig, structural_jitter : StructuralJitter ) -> Self
    {
      Self
      {
        inner,
        structural_jitter,
        state : Mutex::new( AdaptiveState { effective_rate : config.max_rate, current_tokens : config.max_rate, last_refill : Instant::now() } ),
        config,
      }
    }

    /// Current effective rate, for tests and diagnostics.
    #[ must_use ]
    pub fn effective_rate( &self ) -> f64
    {
      self.state.lock().effective_rate
    }

    async fn acquire( &self ) -> SdkResult< () >
    {
      loop
      {
        let needed_wait =
        {
          let mut state = self.state.lock();
          let now = Instant::now();
          let elapsed = now.duration_since( state.last_refill ).as_secs_f64();
          state.current_tokens = ( state.current_tokens + elapsed * state.effective_rate ).min( state.effective_rate );
          state.last_refill = now;

          if state.current_tokens >= 1.0
          {
            state.current_tokens -= 1.0;
            return Ok( () );
          }

          ( 1.0 - state.current_tokens ) / state.effective_rate.max( f64::MIN_POSITIVE )
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
        tokio::time::sleep( Duration::from_secs_f64( jittered_wait ) ).await;
      }
    }

    fn on_success( &self )
    {
      let mut state = self.state.lock();
      let increase = self.config.max_rate * self.config.recovery_factor * self.structural_jitter.sample_multiplier();
      state.effective_rate = ( state.effective_rate + increase ).min( self.config.max_rate );
    }

    fn on_throttle( &self )
    {
      let mut state = self.state.lock();
      let decay = 1.0 - self.config.penalty_factor * self.structural_jitter.sample_multiplier();
      state.effective_rate = ( state.effective_rate * decay ).max( self.config.min_floor_rate );
      tracing::warn!(
        target : "stkai_sdk::adaptive_limiter",
        new_effective_rate = state.effective_rate,
        "429 received, applying AIMD penalty"
      );
    }
  }

  #[ async_trait ]
  impl Transport for AdaptiveLimiterTransport
  {
    async fn call( &self, request : RawRequest ) -> SdkResult< RawResponse >
    {
      let _span = tracing::debug_span!( "transport.adaptive_limiter", method = ?request.method ).entered();
      let is_work_creating = request.method.is_work_creating();
      if is_work_creating
      {
        self.acquire().await?;
      }

      let response = self.inner.call( request ).await?;

      if is_work_creating
      {
        if response.status_code == 429
        {
          self.on_throttle();
          let message = format!( "adaptive limiter observed 429 at effective_rate {:.3}", self.effective_rate() );
          return Err( SdkError::server_throttle( message, response.retry_after_header() ) );
        }
        if response.is_success()
        {
          self.on_success();
        }
      }

      Ok( response )
    }
  }
}

pub use private::{ AdaptiveLimiterConfig, AdaptiveLimiterTransport };
