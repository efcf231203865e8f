//! Auth-applying transports : the two concrete ways a call acquires credentials before it
//! reaches the network.
//!
//! A **host-CLI** transport asks an external probe for a base URL and a pre-signed bearer
//! header per call and is otherwise stateless. A **standalone** transport owns a cached
//! bearer token with an expiry, refreshed through an `AuthProvider` on expiry or on a single
//! 401 (one retry permitted per call to avoid infinite recursion).

#[ allow( clippy::missing_inline_in_public_items ) ]
mod private
{
  use crate::error::{ SdkError, SdkResult };
  use crate::secret::Secret;
  use crate::transport::{ RawRequest, RawResponse, Transport };
  use async_trait::async_trait;
  use std::sync::Arc;
  use std::time::Instant;
  use tokio::sync::Mutex as AsyncMutex;

  /// A bearer token and its expiry, as returned by an `AuthProvider`.
  #[ derive( Clone ) ]
  pub struct TokenLease
  {
    pub bearer_token : Secret,
    pub expires_at : Instant,
  }

  impl core::fmt::Debug for TokenLease
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_struct( "TokenLease" ).field( "bearer_token", &self.bearer_token ).field( "expires_at", &self.expires_at ).finish()
    }
  }

  /// Owns credential acquisition for the standalone transport. Implementations may perform a
  /// blocking HTTP call to an OAuth2-style token endpoint with `client_credentials`.
  #[ async_trait ]
  pub trait AuthProvider : Send + Sync + core::fmt::Debug
  {
    /// Acquire a fresh token lease.
    ///
    /// # Errors
    /// Returns `SdkError::AuthFailure` if the token endpoint cannot be reached or rejects
    /// the credentials.
    async fn acquire( &self ) -> SdkResult< TokenLease >;

    /// Force the next `acquire()` to bypass any cache and fetch a fresh lease. Called on a
    /// 401 so the standalone transport can retry once with new credentials.
    async fn invalidate( &self );
  }

  /// Client-credentials grant `AuthProvider`, talking to `token_url` with
  /// `{client_id, client_secret, grant_type=client_credentials}`.
  #[ derive( Debug ) ]
  pub struct ClientCredentialsProvider
  {
    client_id : String,
    client_secret : Secret,
    token_url : String,
    http : reqwest::Client,
    cached : AsyncMutex< Option< TokenLease > >,
  }

  impl ClientCredentialsProvider
  {
    /// Build a provider with explicit credentials and token endpoint.
    #[ must_use ]
    pub fn with_explicit_credentials( client_id : String, client_secret : Secret, token_url : String ) -> Self
    {
      Self
      {
        client_id,
        client_secret,
        token_url,
        http : reqwest::Client::new(),
        cached : AsyncMutex::new( None ),
      }
    }
  }

  #[ derive( serde::Deserialize ) ]
  struct TokenResponse
  {
    access_token : String,
    expires_in : u64,
  }

  #[ async_trait ]
  impl AuthProvider for ClientCredentialsProvider
  {
    async fn acquire( &self ) -> SdkResult< TokenLease >
    {
      let mut cached = self.cached.lock().await;
      if let Some( lease ) = cached.as_ref()
      {
        if lease.expires_at > Instant::now()
        {
          return Ok( lease.clone() );
        }
      }

      let response = self.http.post( &self.token_url )
        .form( &[
          ( "client_id", self.client_id.as_str() ),
          ( "client_secret", self.client_secret.expose() ),
          ( "grant_type", "client_credentials" ),
        ] )
        .send()
        .await
        .map_err( | e | SdkError::AuthFailure( format!( "token request failed : {e}" ) ) )?;

      if !response.status().is_success()
      {
        return Err( SdkError::AuthFailure( format!( "token endpoint returned {}", response.status() ) ) );
      }

      let parsed : TokenResponse = response.json().await
        .map_err( | e | SdkError::AuthFailure( format!( "malformed token response : {e}" ) ) )?;

      let lease = TokenLease
      {
        bearer_token : Secret::from( parsed.access_token ),
        expires_at : Instant::now() + std::time::Duration::from_secs( parsed.expires_in ),
      };
      *cached = Some( lease.clone() );
      Ok( lease )
    }

    async fn invalidate( &self )
    {
      *self.cached.lock().await = None;
    }
  }

  /// Supplies URLs and pre-signed per-call auth headers when a host CLI is present on the
  /// machine (e.g. a locally running control-plane agent that already holds credentials).
  #[ async_trait ]
  pub trait HostCliProbe : Send + Sync + core::fmt::Debug
  {
    /// Whether the host CLI is reachable right now.
    async fn is_available( &self ) -> bool;
    /// The RQC base URL the host CLI wants used, if it has an opinion.
    async fn base_url_for_rqc( &self ) -> Option< String >;
    /// The Agent base URL the host CLI wants used, if it has an opinion.
    async fn base_url_for_agent( &self ) -> Option< String >;
    /// Sign a request with a per-call authentication header.
    ///
    /// # Errors
    /// Returns `SdkError::AuthFailure` if signing fails.
    async fn sign( &self, request : RawRequest ) -> SdkResult< RawRequest >;
  }

  /// The innermost-but-one transport wrapping `HttpTransport`, delegating auth to a
  /// `HostCliProbe`. Stateless : every call re-asks the probe to sign the request.
  #[ derive( Debug ) ]
  pub struct HostCliTransport
  {
    inner : Arc< dyn Transport >,
    probe : Arc< dyn HostCliProbe >,
  }

  impl HostCliTransport
  {
    /// Wrap `inner`, signing every call through `probe`.
    #[ must_use ]
    pub fn new( inner : Arc< dyn Transport >, probe : Arc< dyn HostCliProbe > ) -> Self
    {
      Self { inner, probe }
    }
  }

  #[ async_trait ]
  impl Transport for HostCliTransport
  {
    async fn call( &self, request : RawRequest ) -> SdkResult< RawResponse >
    {
      let _span = tracing::debug_span!( "transport.host_cli", method = ?request.method ).entered();
      let signed = self.probe.sign( request ).await?;
      self.inner.call( signed ).await
    }
  }

  /// Wraps `inner`, attaching a bearer token from an `AuthProvider`. Retries exactly once on
  /// a 401, invalidating the cached token first, to avoid recursive refresh loops.
  #[ derive( Debug ) ]
  pub struct StandaloneTransport
  {
    inner : Arc< dyn Transport >,
    provider : Arc< dyn AuthProvider >,
  }

  impl StandaloneTransport
  {
    /// Wrap `inner`, authenticating every call through `provider`.
    #[ must_use ]
    pub fn new( inner : Arc< dyn Transport >, provider : Arc< dyn AuthProvider > ) -> Self
    {
      Self { inner, provider }
    }

    async fn call_with_token( &self, request : &RawRequest, token : &Secret ) -> SdkResult< RawResponse >
    {
      let authed = request.clone().with_header( "Authorization", format!( "Bearer {}", token.expose() ) );
      self.inner.call( authed ).await
    }
  }

  #[ async_trait ]
  impl Transport for StandaloneTransport
  {
    async fn call( &self, request : RawRequest ) -> SdkResult< RawResponse >
    {
      let _span = tracing::debug_span!( "transport.standalone_auth", method = ?request.method ).entered();
      let lease = self.provider.acquire().await?;
      let response = self.call_with_token( &request, &lease.bearer_token ).await?;

      if response.status_code == 401
      {
        tracing::warn!( target : "stkai_sdk::auth", "401 received, invalidating cached token and retrying once" );
        self.provider.invalidate().await;
        let refreshed = self.provider.acquire().await?;
        let retried = self.call_with_token( &request, &refreshed.bearer_token ).await?;
        if retried.status_code == 401
        {
          return Err( SdkError::AuthFailure( "401 persisted after credential refresh".to_string() ) );
        }
        return Ok( retried );
      }

      Ok( response )
    }
  }
}

pub use private::
{
  TokenLease,
  AuthProvider,
  ClientCredentialsProvider,
  HostCliProbe,
  HostCliTransport,
  StandaloneTransport,
};
