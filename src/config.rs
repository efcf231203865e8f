//! Layered configuration resolution with explicit precedence and source attribution.
//!
//! Five option groups are recognized : `auth`, `rqc`, `agent`, `rate_limit`, and the
//! metadata group `sdk`. Every field is stored alongside the layer that produced its
//! current value, from lowest to highest precedence : hardcoded default, environment
//! variable (`<PREFIX>_<GROUP>_<OPTION>`), host-CLI probe, `configure()` caller value.
//! `explain()` reports both the value and the source for every recognized field.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use std::{ collections::BTreeMap, sync::{ Arc, OnceLock }, time::Duration };
  use parking_lot::RwLock;

  /// Where a configuration field's current value came from.
  #[ derive( Debug, Clone, PartialEq, Eq ) ]
  pub enum ConfigSource
  {
    /// A hardcoded default baked into the crate.
    Default,
    /// Read from the environment variable named here.
    Env( String ),
    /// Supplied by the host CLI probe.
    HostCli,
    /// Set explicitly by the caller through `configure()`.
    User,
  }

  impl core::fmt::Display for ConfigSource
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      match self
      {
        Self::Default => write!( f, "default" ),
        Self::Env( var ) => write!( f, "env:{var}" ),
        Self::HostCli => write!( f, "host_cli" ),
        Self::User => write!( f, "user" ),
      }
    }
  }

  /// A raw configuration value, untyped so the registry can store heterogeneous fields in
  /// one map while typed config structs do the narrowing on read.
  #[ derive( Debug, Clone, PartialEq ) ]
  pub enum ConfigValue
  {
    /// Boolean toggle.
    Bool( bool ),
    /// Unsigned integer (counts, retry budgets, worker pools).
    U64( u64 ),
    /// Floating point (rates, factors).
    F64( f64 ),
    /// A duration, or `None` for "unlimited".
    Duration( Option< Duration > ),
    /// A string, or `None` for "unset".
    Str( Option< String > ),
  }

  /// A `(value, source)` pair, as returned by `explain()`.
  #[ derive( Debug, Clone ) ]
  pub struct ConfigField
  {
    /// The field's fully-qualified name, `group.option`.
    pub name : String,
    /// Its current resolved value.
    pub value : ConfigValue,
    /// The layer that produced `value`.
    pub source : ConfigSource,
  }

  type FieldMap = BTreeMap< String, ( ConfigValue, ConfigSource ) >;

  fn defaults() -> FieldMap
  {
    let mut m = FieldMap::new();
    macro_rules! default_field
    {
      ( $name:expr, $value:expr ) =>
      {
        m.insert( $name.to_string(), ( $value, ConfigSource::Default ) );
      };
    }

    default_field!( "auth.client_id", ConfigValue::Str( None ) );
    default_field!( "auth.client_secret", ConfigValue::Str( None ) );
    default_field!( "auth.token_url", ConfigValue::Str( None ) );

    default_field!( "rqc.request_timeout", ConfigValue::Duration( Some( Duration::from_secs( 30 ) ) ) );
    default_field!( "rqc.retry_max_retries", ConfigValue::U64( 3 ) );
    default_field!( "rqc.retry_initial_delay", ConfigValue::Duration( Some( Duration::from_millis( 500 ) ) ) );
    default_field!( "rqc.poll_retry_max_retries", ConfigValue::U64( 1 ) );
    default_field!( "rqc.poll_interval", ConfigValue::Duration( Some( Duration::from_secs( 10 ) ) ) );
    default_field!( "rqc.poll_max_duration", ConfigValue::Duration( Some( Duration::from_secs( 600 ) ) ) );
    default_field!( "rqc.overload_timeout", ConfigValue::Duration( Some( Duration::from_secs( 60 ) ) ) );
    default_field!( "rqc.max_workers", ConfigValue::U64( 8 ) );
    default_field!( "rqc.base_url", ConfigValue::Str( Some( "https://api.stkai.example/rqc".to_string() ) ) );

    default_field!( "agent.request_timeout", ConfigValue::Duration( Some( Duration::from_secs( 60 ) ) ) );
    default_field!( "agent.base_url", ConfigValue::Str( Some( "https://api.stkai.example/agent".to_string() ) ) );
    default_field!( "agent.retry_max_retries", ConfigValue::U64( 3 ) );
    default_field!( "agent.retry_initial_delay", ConfigValue::Duration( Some( Duration::from_millis( 500 ) ) ) );

    default_field!( "rate_limit.enabled", ConfigValue::Bool( false ) );
    default_field!( "rate_limit.strategy", ConfigValue::Str( Some( "token_bucket".to_string() ) ) );
    default_field!( "rate_limit.max_requests", ConfigValue::F64( 100.0 ) );
    default_field!( "rate_limit.time_window", ConfigValue::Duration( Some( Duration::from_secs( 60 ) ) ) );
    default_field!( "rate_limit.max_wait_time", ConfigValue::Duration( Some( Duration::from_secs( 45 ) ) ) );
    default_field!( "rate_limit.min_rate_floor", ConfigValue::F64( 0.1 ) );
    default_field!( "rate_limit.penalty_factor", ConfigValue::F64( 0.3 ) );
    default_field!( "rate_limit.recovery_factor", ConfigValue::F64( 0.05 ) );

    default_field!( "sdk.log_level", ConfigValue::Str( Some( "info".to_string() ) ) );

    m
  }

  /// A curated `(max_wait_time, min_rate_floor, penalty_factor, recovery_factor)` bundle for
  /// the adaptive limiter. `conservative` backs off hardest; `optimistic` barely backs off.
  #[ derive( Debug, Clone, Copy, PartialEq, Eq ) ]
  pub enum AdaptivePreset
  {
    /// Largest penalty, smallest recovery, highest floor.
    Conservative,
    /// The balanced default ratios.
    Balanced,
    /// Smallest penalty, largest recovery, lowest floor.
    Optimistic,
  }

  impl AdaptivePreset
  {
    /// Resolve the preset into concrete `(min_rate_floor, penalty_factor, recovery_factor)`.
    #[ must_use ]
    pub fn ratios( self ) -> ( f64, f64, f64 )
    {
      match self
      {
        Self::Conservative => ( 0.25, 0.5, 0.02 ),
        Self::Balanced => ( 0.1, 0.3, 0.05 ),
        Self::Optimistic => ( 0.05, 0.15, 0.1 ),
      }
    }
  }

  /// Immutable, fully-resolved snapshot of every configuration field. Readers clone the
  /// cheap `Arc` handle; writers publish a new snapshot under an exclusive lock.
  #[ derive( Debug, Clone ) ]
  pub struct ConfigSnapshot
  {
    fields : FieldMap,
  }

  impl ConfigSnapshot
  {
    fn get_duration( &self, key : &str ) -> Option< Duration >
    {
      match self.fields.get( key )
      {
        Some( ( ConfigValue::Duration( d ), _ ) ) => *d,
        _ => None,
      }
    }

    fn get_u64( &self, key : &str ) -> u64
    {
      match self.fields.get( key )
      {
        Some( ( ConfigValue::U64( v ), _ ) ) => *v,
        _ => 0,
      }
    }

    fn get_f64( &self, key : &str ) -> f64
    {
      match self.fields.get( key )
      {
        Some( ( ConfigValue::F64( v ), _ ) ) => *v,
        _ => 0.0,
      }
    }

    fn get_bool( &self, key : &str ) -> bool
    {
      matches!( self.fields.get( key ), Some( ( ConfigValue::Bool( true ), _ ) ) )
    }

    fn get_str( &self, key : &str ) -> Option< String >
    {
      match self.fields.get( key )
      {
        Some( ( ConfigValue::Str( s ), _ ) ) => s.clone(),
        _ => None,
      }
    }

    /// Resolve the `rqc` group into a typed config struct.
    #[ must_use ]
    pub fn rqc( &self ) -> RqcConfig
    {
      RqcConfig
      {
        request_timeout : self.get_duration( "rqc.request_timeout" ).unwrap_or( Duration::from_secs( 30 ) ),
        retry_max_retries : self.get_u64( "rqc.retry_max_retries" ) as u32,
        retry_initial_delay : self.get_duration( "rqc.retry_initial_delay" ).unwrap_or( Duration::from_millis( 500 ) ),
        poll_retry_max_retries : self.get_u64( "rqc.poll_retry_max_retries" ) as u32,
        poll_interval : self.get_duration( "rqc.poll_interval" ).unwrap_or( Duration::from_secs( 10 ) ),
        poll_max_duration : self.get_duration( "rqc.poll_max_duration" ).unwrap_or( Duration::from_secs( 600 ) ),
        overload_timeout : self.get_duration( "rqc.overload_timeout" ).unwrap_or( Duration::from_secs( 60 ) ),
        max_workers : self.get_u64( "rqc.max_workers" ) as usize,
        base_url : self.get_str( "rqc.base_url" ).unwrap_or_default(),
      }
    }

    /// Resolve the `agent` group into a typed config struct.
    #[ must_use ]
    pub fn agent( &self ) -> AgentConfig
    {
      AgentConfig
      {
        request_timeout : self.get_duration( "agent.request_timeout" ).unwrap_or( Duration::from_secs( 60 ) ),
        base_url : self.get_str( "agent.base_url" ).unwrap_or_default(),
        retry_max_retries : self.get_u64( "agent.retry_max_retries" ) as u32,
        retry_initial_delay : self.get_duration( "agent.retry_initial_delay" ).unwrap_or( Duration::from_millis( 500 ) ),
      }
    }

    /// Resolve the `rate_limit` group into a typed config struct.
    #[ must_use ]
    pub fn rate_limit( &self ) -> RateLimitConfig
    {
      RateLimitConfig
      {
        enabled : self.get_bool( "rate_limit.enabled" ),
        strategy : self.get_str( "rate_limit.strategy" ).unwrap_or_else( || "token_bucket".to_string() ),
        max_requests : self.get_f64( "rate_limit.max_requests" ),
        time_window : self.get_duration( "rate_limit.time_window" ).unwrap_or( Duration::from_secs( 60 ) ),
        max_wait_time : self.get_duration( "rate_limit.max_wait_time" ),
        min_rate_floor : self.get_f64( "rate_limit.min_rate_floor" ),
        penalty_factor : self.get_f64( "rate_limit.penalty_factor" ),
        recovery_factor : self.get_f64( "rate_limit.recovery_factor" ),
      }
    }

    /// Resolve the `auth` group into a typed config struct.
    #[ must_use ]
    pub fn auth( &self ) -> AuthConfig
    {
      AuthConfig
      {
        client_id : self.get_str( "auth.client_id" ),
        client_secret : self.get_str( "auth.client_secret" ),
        token_url : self.get_str( "auth.token_url" ),
      }
    }

    /// List every recognized field with its current value and source, sorted by name.
    #[ must_use ]
    pub fn explain( &self ) -> Vec< ConfigField >
    {
      self.fields.iter()
        .map( | ( name, ( value, source ) ) | ConfigField { name : name.clone(), value : value.clone(), source : source.clone() } )
        .collect()
    }
  }

  /// Resolved `rqc` configuration group.
  #[ derive( Debug, Clone ) ]
  pub struct RqcConfig
  {
    pub request_timeout : Duration,
    pub retry_max_retries : u32,
    pub retry_initial_delay : Duration,
    pub poll_retry_max_retries : u32,
    pub poll_interval : Duration,
    pub poll_max_duration : Duration,
    pub overload_timeout : Duration,
    pub max_workers : usize,
    pub base_url : String,
  }

  /// Resolved `agent` configuration group.
  #[ derive( Debug, Clone ) ]
  pub struct AgentConfig
  {
    pub request_timeout : Duration,
    pub base_url : String,
    pub retry_max_retries : u32,
    pub retry_initial_delay : Duration,
  }

  /// Resolved `rate_limit` configuration group.
  #[ derive( Debug, Clone ) ]
  pub struct RateLimitConfig
  {
    pub enabled : bool,
    pub strategy : String,
    pub max_requests : f64,
    pub time_window : Duration,
    pub max_wait_time : Option< Duration >,
    pub min_rate_floor : f64,
    pub penalty_factor : f64,
    pub recovery_factor : f64,
  }

  /// Resolved `auth` configuration group. `client_secret` is intentionally a plain `String`
  /// here; callers needing redaction should wrap it with `crate::secret::Secret` at the call
  /// site before logging.
  #[ derive( Debug, Clone ) ]
  pub struct AuthConfig
  {
    pub client_id : Option< String >,
    pub client_secret : Option< String >,
    pub token_url : Option< String >,
  }

  /// A set of overrides to apply via `configure()`. Only set fields are written; all others
  /// keep their prior value and source.
  #[ derive( Debug, Clone, Default ) ]
  pub struct ConfigOverrides
  {
    entries : Vec< ( String, ConfigValue ) >,
  }

  impl ConfigOverrides
  {
    /// Start an empty override set.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::default()
    }

    /// Set `group.option` to `value`.
    #[ must_use ]
    pub fn with( mut self, field : impl Into< String >, value : ConfigValue ) -> Self
    {
      self.entries.push( ( field.into(), value ) );
      self
    }
  }

  fn parse_nullable_duration( raw : &str ) -> Option< Duration >
  {
    let lower = raw.trim().to_ascii_lowercase();
    if matches!( lower.as_str(), "unlimited" | "none" | "null" )
    {
      None
    }
    else
    {
      raw.trim().parse::< f64 >().ok().map( Duration::from_secs_f64 )
    }
  }

  fn apply_env_overrides( fields : &mut FieldMap, prefix : &str )
  {
    for key in fields.keys().cloned().collect::< Vec< _ > >()
    {
      let env_var = format!( "{prefix}{}", key.to_ascii_uppercase().replace( '.', "_" ) );
      if let Ok( raw ) = std::env::var( &env_var )
      {
        let ( existing, _ ) = fields.get( &key ).cloned().expect( "key just listed from fields" );
        let parsed = match existing
        {
          ConfigValue::Bool( _ ) => raw.trim().parse::< bool >().ok().map( ConfigValue::Bool ),
          ConfigValue::U64( _ ) => raw.trim().parse::< u64 >().ok().map( ConfigValue::U64 ),
          ConfigValue::F64( _ ) => raw.trim().parse::< f64 >().ok().map( ConfigValue::F64 ),
          ConfigValue::Duration( _ ) => Some( ConfigValue::Duration( parse_nullable_duration( &raw ) ) ),
          ConfigValue::Str( _ ) => Some( ConfigValue::Str( Some( raw.clone() ) ) ),
        };
        if let Some( value ) = parsed
        {
          fields.insert( key, ( value, ConfigSource::Env( env_var ) ) );
        }
      }
    }
  }

  /// The process-wide (or per-`Sdk`) configuration registry.
  ///
  /// `ConfigRegistry::global()` exposes the process-wide singleton used by the free
  /// functions `configure`/`reset`/`explain`. An `Sdk` handle may instead hold its own
  /// `ConfigRegistry` instance (`ConfigRegistry::with_explicit_prefix`) for callers who want
  /// several independently configured clients in one process.
  #[ derive( Debug ) ]
  pub struct ConfigRegistry
  {
    snapshot : RwLock< Arc< ConfigSnapshot > >,
    env_prefix : String,
    host_cli_overrides : RwLock< Vec< ( String, ConfigValue ) > >,
  }

  impl ConfigRegistry
  {
    /// Build a registry with an explicit environment-variable prefix (no defaults implied).
    #[ must_use ]
    pub fn with_explicit_prefix( env_prefix : impl Into< String > ) -> Self
    {
      let mut fields = defaults();
      let env_prefix = env_prefix.into();
      apply_env_overrides( &mut fields, &env_prefix );
      Self
      {
        snapshot : RwLock::new( Arc::new( ConfigSnapshot { fields } ) ),
        env_prefix,
        host_cli_overrides : RwLock::new( Vec::new() ),
      }
    }

    /// Build a registry using the standard `STKAI_` prefix.
    ///
    /// NOTE: this is a compatibility wrapper over `with_explicit_prefix`. For a custom
    /// prefix, use `with_explicit_prefix` directly.
    #[ must_use ]
    pub fn new() -> Self
    {
      Self::with_explicit_prefix( "STKAI_" )
    }

    /// The process-wide singleton instance.
    pub fn global() -> &'static Self
    {
      static GLOBAL : OnceLock< ConfigRegistry > = OnceLock::new();
      GLOBAL.get_or_init( ConfigRegistry::new )
    }

    /// A lock-free, cheap-to-clone read of the current resolved configuration.
    #[ must_use ]
    pub fn snapshot( &self ) -> Arc< ConfigSnapshot >
    {
      Arc::clone( &self.snapshot.read() )
    }

    /// Apply user overrides, recorded with source `User`. Takes precedence over every other layer.
    ///
    /// # Errors
    /// Returns `SdkError::Config` if an override's type does not match the field's declared type.
    pub fn configure( &self, overrides : ConfigOverrides ) -> crate::error::SdkResult< () >
    {
      let mut next = ( *self.snapshot.read() ).clone();
      for ( name, value ) in overrides.entries
      {
        let Some( ( existing, _ ) ) = next.fields.get( &name ) else
        {
          return Err( crate::error::SdkError::Config( format!( "unknown configuration field : {name}" ) ) );
        };
        if core::mem::discriminant( existing ) != core::mem::discriminant( &value )
        {
          return Err( crate::error::SdkError::Config( format!( "type mismatch for field {name}" ) ) );
        }
        next.fields.insert( name, ( value, ConfigSource::User ) );
      }
      #[ cfg( feature = "enabled" ) ]
      tracing::debug!( target : "stkai_sdk::config", "configuration updated via configure()" );
      *self.snapshot.write() = Arc::new( next );
      Ok( () )
    }

    /// Record host-CLI-derived values (lower precedence than `configure()`, higher than env/default).
    pub fn apply_host_cli_values( &self, values : Vec< ( String, ConfigValue ) > )
    {
      let mut next = ( *self.snapshot.read() ).clone();
      for ( name, value ) in &values
      {
        if let Some( ( _, source ) ) = next.fields.get( name )
        {
          if *source != ConfigSource::User
          {
            next.fields.insert( name.clone(), ( value.clone(), ConfigSource::HostCli ) );
          }
        }
      }
      *self.host_cli_overrides.write() = values;
      *self.snapshot.write() = Arc::new( next );
    }

    /// Restore every field to its default or environment-derived value, discarding
    /// `configure()` and host-CLI layers.
    pub fn reset( &self )
    {
      let mut fields = defaults();
      apply_env_overrides( &mut fields, &self.env_prefix );
      #[ cfg( feature = "enabled" ) ]
      tracing::debug!( target : "stkai_sdk::config", "configuration reset to defaults/env" );
      *self.snapshot.write() = Arc::new( ConfigSnapshot { fields } );
    }

    /// Report value and source for every recognized field.
    #[ must_use ]
    pub fn explain( &self ) -> Vec< ConfigField >
    {
      self.snapshot().explain()
    }
  }

  impl Default for ConfigRegistry
  {
    fn default() -> Self
    {
      Self::new()
    }
  }

  /// Apply overrides to the process-wide registry.
  ///
  /// # Errors
  /// See `ConfigRegistry::configure`.
  pub fn configure( overrides : ConfigOverrides ) -> crate::error::SdkResult< () >
  {
    ConfigRegistry::global().configure( overrides )
  }

  /// Reset the process-wide registry to defaults/env.
  pub fn reset()
  {
    ConfigRegistry::global().reset();
  }

  /// Explain the process-wide registry's current state.
  #[ must_use ]
  pub fn explain() -> Vec< ConfigField >
  {
    ConfigRegistry::global().explain()
  }
}

pub use private::
{
  ConfigSource,
  ConfigValue,
  ConfigField,
  ConfigSnapshot,
  ConfigOverrides,
  ConfigRegistry,
  RqcConfig,
  AgentConfig,
  RateLimitConfig,
  AuthConfig,
  AdaptivePreset,
  configure,
  reset,
  explain,
};
