//! Deterministic and ephemeral jitter primitives, and the monotonic clock used throughout
//! the decorator stack.
//!
//! Two independent jitter sources are provided. **Structural** jitter is seeded from a
//! stable process identity (hostname + pid) so that repeated runs on the same host
//! reproduce the same multiplier sequence; this is the anti-synchronization mechanism the
//! adaptive limiter relies on when several independent processes share a server-side quota.
//! **Ephemeral** jitter is reseeded freely and is used to keep retry/backoff sleeps from
//! colliding across attempts.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use rand::{ Rng, SeedableRng };
  use rand::rngs::StdRng;
  use core::hash::{ Hash, Hasher };
  use std::collections::hash_map::DefaultHasher;
  use parking_lot::Mutex;

  /// Multiply `base` by `1 + uniform(-pct, +pct)` using the supplied uniform sample in `[0, 1)`.
  #[ must_use ]
  pub fn apply_jitter( base : f64, pct : f64, sample : f64 ) -> f64
  {
    let offset = ( sample * 2.0 - 1.0 ) * pct;
    base * ( 1.0 + offset )
  }

  /// Derive a stable 64-bit seed from the current host identity and process id.
  ///
  /// Same process (same pid, same host) always derives the same seed, which is the whole
  /// point of structural jitter : two runs on the same host reproduce the same sequence,
  /// while two different processes sharing a quota desynchronize.
  #[ must_use ]
  pub fn process_identity_seed() -> u64
  {
    let hostname = hostname_best_effort();
    let pid = std::process::id();

    let mut hasher = DefaultHasher::new();
    hostname.hash( &mut hasher );
    pid.hash( &mut hasher );
    hasher.finish()
  }

  fn hostname_best_effort() -> String
  {
    std::env::var( "HOSTNAME" )
      .or_else( | _ | std::env::var( "COMPUTERNAME" ) )
      .unwrap_or_else( | _ | "unknown-host".to_string() )
  }

  /// Per-process deterministic RNG used for structural jitter.
  ///
  /// Wraps `rand::rngs::StdRng` behind a mutex so the same source can be shared across the
  /// limiter's decorator instances without re-seeding on every call.
  #[ derive( Debug ) ]
  pub struct StructuralJitter
  {
    rng : Mutex< StdRng >,
    pct : f64,
  }

  impl StructuralJitter
  {
    /// Build a structural jitter source with an explicit seed and `±pct` amplitude.
    #[ must_use ]
    pub fn with_explicit_seed( seed : u64, pct : f64 ) -> Self
    {
      Self { rng : Mutex::new( StdRng::seed_from_u64( seed ) ), pct }
    }

    /// Build a structural jitter source seeded from `(host, pid)` with the standard ±20% amplitude.
    ///
    /// NOTE: this is a compatibility wrapper over `with_explicit_seed`. For explicit control
    /// over the seed (e.g. in tests wanting two independent "processes"), use `with_explicit_seed`.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::with_explicit_seed( process_identity_seed(), 0.20 )
    }

    /// Sample a jittered multiplier, `1 + uniform(-pct, +pct)`.
    pub fn sample_multiplier( &self ) -> f64
    {
      let sample : f64 = self.rng.lock().random();
      1.0 + ( sample * 2.0 - 1.0 ) * self.pct
    }

    /// Apply this jitter source to a base value.
    pub fn apply( &self, base : f64 ) -> f64
    {
      base * self.sample_multiplier()
    }
  }

  impl Default for StructuralJitter
  {
    fn default() -> Self
    {
      Self::new()
    }
  }

  /// Ephemeral per-process jitter used for retry/backoff sleeps.
  ///
  /// Backed by `fastrand`'s thread-local generator; unlike `StructuralJitter` it is not
  /// seeded from a stable identity and is free to vary run to run.
  #[ derive( Debug, Default, Clone, Copy ) ]
  pub struct EphemeralJitter;

  impl EphemeralJitter
  {
    /// Apply additive jitter in `[0, pct]`, e.g. retry backoff's `1 + uniform(0, 0.3)`.
    #[ must_use ]
    pub fn apply_additive( base : f64, pct : f64 ) -> f64
    {
      base * ( 1.0 + fastrand::f64() * pct )
    }

    /// Apply multiplicative jitter in `[-pct, +pct]`.
    #[ must_use ]
    pub fn apply_multiplicative( base : f64, pct : f64 ) -> f64
    {
      base * ( 1.0 + ( fastrand::f64() * 2.0 - 1.0 ) * pct )
    }
  }

  /// Monotonic clock abstraction, overridable in tests via a fixed offset.
  ///
  /// Production code always uses `std::time::Instant`; the crate does not currently need a
  /// fully mockable clock because scenario tests use short real sleeps (sub-second), but the
  /// trait exists so a future virtual-time test harness has a seam to attach to.
  pub trait Clock : Send + Sync
  {
    /// Current monotonic instant.
    fn now( &self ) -> std::time::Instant;
  }

  /// The real, wall-driven monotonic clock.
  #[ derive( Debug, Default, Clone, Copy ) ]
  pub struct SystemClock;

  impl Clock for SystemClock
  {
    fn now( &self ) -> std::time::Instant
    {
      std::time::Instant::now()
    }
  }
}

pub use private::
{
  apply_jitter,
  process_identity_seed,
  StructuralJitter,
  EphemeralJitter,
  Clock,
  SystemClock,
};
