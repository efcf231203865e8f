//! A string wrapper that never prints its contents through `Debug` or `Display`.
//!
//! Used for `client_secret` and bearer tokens so an accidental `{:?}` on a config struct or
//! a log line never leaks a credential.

mod private
{
  use secrecy::{ ExposeSecret, SecretString };

  /// A secret string value, backed by `secrecy::SecretString`. Construct with `From<String>`;
  /// read with `expose()`.
  #[ derive( Clone ) ]
  pub struct Secret( SecretString );

  impl Secret
  {
    /// Expose the underlying value. Named loudly on purpose : every call site should read
    /// as "yes, I really need the raw value here".
    #[ must_use ]
    pub fn expose( &self ) -> &str
    {
      self.0.expose_secret()
    }
  }

  impl From< String > for Secret
  {
    fn from( value : String ) -> Self
    {
      Self( SecretString::from( value ) )
    }
  }

  impl From< &str > for Secret
  {
    fn from( value : &str ) -> Self
    {
      Self( SecretString::from( value.to_string() ) )
    }
  }

  impl core::fmt::Debug for Secret
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      f.debug_tuple( "Secret" ).field( &"<REDACTED>" ).finish()
    }
  }

  impl core::fmt::Display for Secret
  {
    fn fmt( &self, f : &mut core::fmt::Formatter< '_ > ) -> core::fmt::Result
    {
      write!( f, "<REDACTED>" )
    }
  }
}

pub use private::Secret;
