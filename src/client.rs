//! Environment-aware assembly : the top-level factory that reads the Config Registry and
//! wires the decorator stack (auth → limiter → retry → protocol) a caller actually uses.

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::adaptive_limiter::{ AdaptiveLimiterConfig, AdaptiveLimiterTransport };
  use crate::agent::{ AgentProtocol, ChatRequest };
  use crate::authentication::{ AuthProvider, ClientCredentialsProvider, HostCliProbe, HostCliTransport, StandaloneTransport };
  use crate::batch::BatchExecutor;
  use crate::config::{ AgentConfig, ConfigRegistry, ConfigSnapshot };
  use crate::envelope::{ RequestEnvelope, ResponseEnvelope };
  use crate::handlers::{ HandlerPipeline, JsonHandler, RawHandler };
  use crate::listeners::{ Listener, TracingListener };
  use crate::rqc::RqcProtocol;
  use crate::secret::Secret;
  use crate::token_bucket::{ TokenBucketConfig, TokenBucketTransport };
  use crate::transport::{ HttpTransport, Transport };
  use std::collections::HashMap;
  use std::sync::{ Arc, Mutex };

  /// How a call authenticates against the remote service.
  #[ derive( Debug, Clone ) ]
  pub enum AuthMode
  {
    /// Delegate to an external host CLI that already holds credentials.
    HostCli( Arc< dyn HostCliProbe > ),
    /// Own a client-credentials grant against `auth.token_url`.
    Standalone { client_id : String, client_secret : Secret, token_url : String },
  }

  /// The assembled SDK handle : owns the decorator stack for both protocols, built once from
  /// a configuration snapshot and reused across calls. Agent protocols are created lazily per
  /// `agent_id` and cached, since the chat endpoint is agent-scoped.
  #[ derive( Debug ) ]
  pub struct Sdk
  {
    rqc : RqcProtocol,
    agents : Mutex< HashMap< String, Arc< AgentProtocol > > >,
    agent_transport : Arc< dyn Transport >,
    agent_config : AgentConfig,
    batch : BatchExecutor,
  }

  impl Sdk
  {
    /// Build an SDK handle by reading the current process-wide Config Registry snapshot.
    #[ must_use ]
    pub fn with_explicit_auth( auth_mode : AuthMode ) -> Self
    {
      Self::with_explicit_snapshot( ConfigRegistry::global().snapshot(), auth_mode )
    }

    /// Build an SDK handle with an explicit, caller-supplied configuration snapshot (useful
    /// for tests that don't want to touch the process-wide registry).
    #[ must_use ]
    pub fn with_explicit_snapshot( snapshot : Arc< ConfigSnapshot >, auth_mode : AuthMode ) -> Self
    {
      let transport = Self::build_transport( &snapshot, auth_mode );

      let rqc_config = snapshot.rqc();
      let listeners : Vec< Arc< dyn Listener > > = vec![ Arc::new( TracingListener ) ];
      let handlers = HandlerPipeline::new().with_handler( Arc::new( RawHandler ) );

      let rqc = RqcProtocol::new( transport.clone(), rqc_config.clone(), handlers, listeners );
      let batch = BatchExecutor::with_explicit_workers( rqc_config.max_workers );

      Self
      {
        rqc,
        agents : Mutex::new( HashMap::new() ),
        agent_transport : transport,
        agent_config : snapshot.agent(),
        batch,
      }
    }

    fn build_transport( snapshot : &ConfigSnapshot, auth_mode : AuthMode ) -> Arc< dyn Transport >
    {
      let base : Arc< dyn Transport > = Arc::new( HttpTransport::new() );

      let authed : Arc< dyn Transport > = match auth_mode
      {
        AuthMode::HostCli( probe ) => Arc::new( HostCliTransport::new( base, probe ) ),
        AuthMode::Standalone { client_id, client_secret, token_url } =>
        {
          let provider : Arc< dyn AuthProvider > = Arc::new( ClientCredentialsProvider::with_explicit_credentials( client_id, client_secret, token_url ) );
          Arc::new( StandaloneTransport::new( base, provider ) )
        }
      };

      let rate_limit = snapshot.rate_limit();
      if !rate_limit.enabled
      {
        return authed;
      }

      match rate_limit.strategy.as_str()
      {
        "adaptive" =>
        {
          let config = AdaptiveLimiterConfig::with_explicit_config(
            rate_limit.max_requests,
            rate_limit.min_rate_floor,
            rate_limit.penalty_factor,
            rate_limit.recovery_factor,
            rate_limit.max_wait_time,
          );
          Arc::new( AdaptiveLimiterTransport::new( authed, config ) )
        }
        _ =>
        {
          let config = TokenBucketConfig::with_explicit_rate( rate_limit.max_requests, rate_limit.time_window, rate_limit.max_wait_time );
          Arc::new( TokenBucketTransport::new( authed, config ) )
        }
      }
    }

    /// Run one request through the RQC protocol. Never raises.
    pub async fn execute( &self, slug : &str, request : RequestEnvelope ) -> ResponseEnvelope
    {
      self.rqc.execute( slug, request ).await
    }

    /// Send one chat turn to `agent_id`. Never raises.
    pub async fn chat( &self, agent_id : &str, request : ChatRequest ) -> ResponseEnvelope
    {
      let protocol = self.agent_protocol_for( agent_id );
      protocol.chat( request ).await
    }

    fn agent_protocol_for( &self, agent_id : &str ) -> Arc< AgentProtocol >
    {
      let mut agents = self.agents.lock().unwrap();
      if let Some( existing ) = agents.get( agent_id )
      {
        return existing.clone();
      }

      let listeners : Vec< Arc< dyn Listener > > = vec![ Arc::new( TracingListener ) ];
      let handlers = HandlerPipeline::new().with_handler( Arc::new( JsonHandler ) );
      let protocol = Arc::new( AgentProtocol::new( self.agent_transport.clone(), self.agent_config.clone(), agent_id, handlers, listeners ) );
      agents.insert( agent_id.to_string(), protocol.clone() );
      protocol
    }
  }

  /// Batch-oriented entry points, requiring the `Sdk` to be held behind an `Arc` since each
  /// worker needs an owned handle that outlives the spawning call.
  impl Sdk
  {
    /// Run a batch of requests through the RQC protocol, at most `rqc.max_workers` concurrent,
    /// preserving input order in the output.
    pub async fn execute_many( self : Arc< Self >, slug : &str, requests : Vec< RequestEnvelope > ) -> Vec< ResponseEnvelope >
    {
      let slug = slug.to_string();
      let sdk = self.clone();
      let pipeline = Arc::new( move | request : RequestEnvelope |
      {
        let sdk = sdk.clone();
        let slug = slug.clone();
        async move { sdk.execute( &slug, request ).await }
      } );
      self.batch.run( requests, pipeline ).await
    }

    /// Run a batch of chat turns against `agent_id`, at most `rqc.max_workers` concurrent,
    /// preserving input order in the output.
    pub async fn chat_many( self : Arc< Self >, agent_id : &str, requests : Vec< ChatRequest > ) -> Vec< ResponseEnvelope >
    {
      let agent_id = agent_id.to_string();
      let sdk = self.clone();
      let pipeline = Arc::new( move | request : ChatRequest |
      {
        let sdk = sdk.clone();
        let agent_id = agent_id.clone();
        async move { sdk.chat( &agent_id, request ).await }
      } );
      self.batch.run( requests, pipeline ).await
    }
  }
}

pub use private::{ Sdk, AuthMode };
