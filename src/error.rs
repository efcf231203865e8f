//! Error taxonomy for the SDK.

mod core;

pub use self::core::{ SdkError, SdkResult };
