#![ doc( html_root_url = "https://docs.rs/stkai-sdk/latest/stkai_sdk/" ) ]
#![ cfg_attr( doc, doc = include_str!( concat!( env!( "CARGO_MANIFEST_DIR" ), "/", "readme.md" ) ) ) ]

#![ allow( clippy::missing_inline_in_public_items ) ]
#![ allow( clippy::std_instead_of_core ) ]
#![ allow( clippy::must_use_candidate ) ]

//! Client-side request-lifecycle control plane for a polling-based LLM platform.
//!
//! This crate owns everything between "I have a payload" and "I have a `ResponseEnvelope`" :
//! authentication, rate limiting (fixed-rate and adaptive), retry with backoff, the two-phase
//! create/poll (RQC) protocol, the single-phase Agent protocol, a bounded-concurrency batch
//! executor, a result-handler pipeline, and lifecycle listeners. It does not know what the
//! payloads mean — that is the caller's concern.
//!
//! # Example
//!
//! ```no_run
//! use stkai_sdk::{ Sdk, AuthMode, RequestEnvelope };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result< (), Box< dyn std::error::Error > > {
//! let sdk = Arc::new( Sdk::with_explicit_auth( AuthMode::Standalone
//! {
//!   client_id : "client".to_string(),
//!   client_secret : "secret".into(),
//!   token_url : "https://auth.example/token".to_string(),
//! } ) );
//!
//! let request = RequestEnvelope::new( serde_json::json!( { "x" : 1 } ) );
//! let response = sdk.execute( "my-job", request ).await;
//! println!( "status : {}", response.status );
//! # Ok( () )
//! # }
//! ```

#[ cfg( feature = "enabled" ) ]
mod jitter;
#[ cfg( feature = "enabled" ) ]
mod error;
#[ cfg( feature = "enabled" ) ]
mod config;
#[ cfg( feature = "enabled" ) ]
mod transport;
#[ cfg( feature = "enabled" ) ]
mod secret;
#[ cfg( feature = "authentication" ) ]
mod authentication;
#[ cfg( feature = "rate-limiting" ) ]
mod token_bucket;
#[ cfg( feature = "rate-limiting" ) ]
mod adaptive_limiter;
#[ cfg( feature = "retry-logic" ) ]
mod retry_logic;
#[ cfg( feature = "enabled" ) ]
mod handlers;
#[ cfg( feature = "enabled" ) ]
mod listeners;
#[ cfg( feature = "enabled" ) ]
mod envelope;
#[ cfg( feature = "rqc" ) ]
mod rqc;
#[ cfg( feature = "agent" ) ]
mod agent;
#[ cfg( feature = "batch-processing" ) ]
mod batch;
#[ cfg( feature = "enabled" ) ]
mod client;

#[ cfg( feature = "enabled" ) ]
pub use jitter::{ Clock, SystemClock, StructuralJitter, EphemeralJitter };
#[ cfg( feature = "enabled" ) ]
pub use error::{ SdkError, SdkResult };
#[ cfg( feature = "enabled" ) ]
pub use config::
{
  ConfigSource, ConfigValue, ConfigField, ConfigSnapshot, ConfigOverrides, ConfigRegistry,
  RqcConfig, AgentConfig, RateLimitConfig, AuthConfig, AdaptivePreset,
  configure, reset, explain,
};
#[ cfg( feature = "enabled" ) ]
pub use transport::{ HttpMethod, RawRequest, RawResponse, Transport, HttpTransport, TransportHandle };
#[ cfg( feature = "enabled" ) ]
pub use secret::Secret;
#[ cfg( feature = "authentication" ) ]
pub use authentication::
{
  TokenLease, AuthProvider, ClientCredentialsProvider, HostCliProbe, HostCliTransport, StandaloneTransport,
};
#[ cfg( feature = "rate-limiting" ) ]
pub use token_bucket::{ TokenBucketConfig, TokenBucketTransport };
#[ cfg( feature = "rate-limiting" ) ]
pub use adaptive_limiter::{ AdaptiveLimiterConfig, AdaptiveLimiterTransport };
#[ cfg( feature = "retry-logic" ) ]
pub use retry_logic::{ RetryConfig, RetryContext, RetryExecutor, compute_delay };
#[ cfg( feature = "enabled" ) ]
pub use envelope::
{
  RequestEnvelope, ResponseEnvelope, ResponseStatus, ExecutionStatus, ConversationScope, ConversationScopeGuard,
};
#[ cfg( feature = "enabled" ) ]
pub use handlers::{ HandlerValue, HandlerContext, Handler, RawHandler, JsonHandler, HandlerPipeline };
#[ cfg( feature = "enabled" ) ]
pub use listeners::
{
  ListenerContextMap, Listener, PhasedListener, TracingListener,
  dispatch_before_execute, dispatch_status_change, dispatch_after_execute,
  dispatch_create_execution_start, dispatch_create_execution_end,
  dispatch_get_result_start, dispatch_get_result_end,
};
#[ cfg( feature = "rqc" ) ]
pub use rqc::RqcProtocol;
#[ cfg( feature = "agent" ) ]
pub use agent::{ ChatRequest, AgentProtocol };
#[ cfg( feature = "batch-processing" ) ]
pub use batch::BatchExecutor;
#[ cfg( feature = "enabled" ) ]
pub use client::{ Sdk, AuthMode };

#[ cfg( any( test, feature = "test-util" ) ) ]
pub use transport::testing;

/// Serde-related exports.
#[ cfg( feature = "enabled" ) ]
pub mod ser
{
  pub use serde::{ Serialize, Deserialize };
  pub use serde_with::*;
}

/// Error-related exports.
#[ cfg( feature = "enabled" ) ]
pub mod error_tools
{
  pub use error_tools::*;
  pub use error_tools::dependency::thiserror;
}
