//! The retry engine : classification of outcomes, exponential backoff with jitter, and
//! `Retry-After` compliance, layered around any fallible async operation.
//!
//! The engine is layered **outside** the limiter decorators, so a `server_throttle` error
//! raised by the adaptive limiter (which has already applied its AIMD penalty) is what
//! drives backoff here.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::error::{ SdkError, SdkResult };
  use crate::jitter::EphemeralJitter;
  use std::time::{ Duration, Instant };

  /// Explicit retry-engine configuration.
  #[ derive( Debug, Clone, Copy, PartialEq ) ]
  pub struct RetryConfig
  {
    max_retries : u32,
    initial_delay : Duration,
  }

  impl RetryConfig
  {
    /// Create retry configuration with explicit parameters (no defaults).
    ///
    /// # Arguments
    /// * `max_retries` - number of retryable failures tolerated after the first attempt;
    ///   `0` disables retry (single attempt).
    /// * `initial_delay` - base for the exponential backoff schedule.
    #[ must_use ]
    pub fn with_explicit_config( max_retries : u32, initial_delay : Duration ) -> Self
    {
      Self { max_retries, initial_delay }
    }

    /// Create retry configuration with the configuration surface's documented defaults
    /// (compatibility wrapper).
    ///
    /// NOTE: this is a compatibility wrapper with sensible defaults. For explicit control,
    /// use `with_explicit_config()`.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::with_explicit_config( 3, Duration::from_millis( 500 ) )
    }

    #[ must_use ]
    pub fn max_retries( &self ) -> u32
    {
      self.max_retries
    }

    #[ must_use ]
    pub fn initial_delay( &self ) -> Duration
    {
      self.initial_delay
    }

    /// Derive the poll-phase budget as `min(1, create_retries)`.
    #[ must_use ]
    pub fn derived_poll_budget( &self ) -> Self
    {
      Self { max_retries : self.max_retries.min( 1 ), initial_delay : self.initial_delay }
    }
  }

  impl Default for RetryConfig
  {
    fn default() -> Self
    {
      Self::new()
    }
  }

  /// Per-invocation bookkeeping the retry engine threads through its loop and that a caller
  /// may inspect after a successful retried call (e.g. for metrics/listeners).
  #[ derive( Debug, Clone ) ]
  pub struct RetryContext
  {
    pub attempt_number : u32,
    pub elapsed_so_far : Duration,
    pub last_error_kind : Option< String >,
    pub suggested_delay : Duration,
  }

  impl RetryContext
  {
    fn new() -> Self
    {
      Self { attempt_number : 0, elapsed_so_far : Duration::ZERO, last_error_kind : None, suggested_delay : Duration::ZERO }
    }
  }

  /// Compute `delay(n)` : exponential base, clamped up to an honored
  /// `Retry-After` (≤ 60s only), then perturbed with 0–30% ephemeral jitter.
  #[ must_use ]
  pub fn compute_delay( initial_delay : Duration, attempt_number : u32, retry_after : Option< Duration > ) -> Duration
  {
    let exponent = attempt_number.saturating_sub( 1 );
    let base_secs = initial_delay.as_secs_f64() * 2f64.powi( i32::try_from( exponent ).unwrap_or( i32::MAX ) );
    let base_secs = match retry_after
    {
      Some( ra ) if ra <= Duration::from_secs( 60 ) => base_secs.max( ra.as_secs_f64() ),
      _ => base_secs,
    };
    Duration::from_secs_f64( EphemeralJitter::apply_additive( base_secs, 0.30 ) )
  }

  /// Runs a fallible async operation with retry, reentrant and stateless between calls : a
  /// fresh `RetryContext` is created per invocation of `execute`.
  #[ derive( Debug, Clone, Copy ) ]
  pub struct RetryExecutor
  {
    config : RetryConfig,
  }

  impl RetryExecutor
  {
    /// Build an executor over an explicit configuration.
    #[ must_use ]
    pub fn new( config : RetryConfig ) -> Self
    {
      Self { config }
    }

    #[ must_use ]
    pub fn config( &self ) -> RetryConfig
    {
      self.config
    }

    /// Execute `operation`, retrying on a retryable `SdkError` up to `config.max_retries`
    /// times. Returns the final error (retryable-exhausted or non-retryable) unchanged.
    pub async fn execute< F, Fut, T >( &self, operation : F ) -> SdkResult< T >
    where
      F : Fn() -> Fut,
      Fut : core::future::Future< Output = SdkResult< T > >,
    {
      let start = Instant::now();
      let mut ctx = RetryContext::new();

      loop
      {
        ctx.attempt_number += 1;
        match operation().await
        {
          Ok( value ) => return Ok( value ),
          Err( error ) =>
          {
            ctx.elapsed_so_far = start.elapsed();
            ctx.last_error_kind = Some( error.to_string() );

            let retries_used = ctx.attempt_number - 1;
            if !error.is_retryable() || retries_used >= self.config.max_retries
            {
              return Err( error );
            }

            let delay = compute_delay( self.config.initial_delay, ctx.attempt_number, error.retry_after() );
            ctx.suggested_delay = delay;
            tracing::warn!(
              target : "stkai_sdk::retry",
              attempt = ctx.attempt_number,
              delay_secs = delay.as_secs_f64(),
              error = %error,
              "retrying after delay"
            );
            tokio::time::sleep( delay ).await;
          }
        }
      }
    }
  }

  #[ cfg( test ) ]
  mod tests
  {
    use super::*;

    #[ test ]
    fn exponential_growth_without_retry_after()
    {
      let d1 = compute_delay( Duration::from_millis( 100 ), 1, None );
      let d2 = compute_delay( Duration::from_millis( 100 ), 2, None );
      // attempt 1 : base 100ms * 1.0..1.3 ; attempt 2 : base 200ms * 1.0..1.3
      assert!( d1.as_secs_f64() <= 0.130 + 1e-9 );
      assert!( d2.as_secs_f64() >= 0.200 - 1e-9 );
    }

    #[ test ]
    fn retry_after_over_60s_is_ignored()
    {
      let d = compute_delay( Duration::from_millis( 100 ), 1, Some( Duration::from_secs( 120 ) ) );
      assert!( d < Duration::from_secs( 1 ) );
    }

    #[ test ]
    fn retry_after_under_60s_is_honored()
    {
      let d = compute_delay( Duration::from_millis( 100 ), 1, Some( Duration::from_secs( 5 ) ) );
      assert!( d >= Duration::from_secs( 5 ) );
    }
  }
}

pub use private::{ RetryConfig, RetryContext, RetryExecutor, compute_delay };
