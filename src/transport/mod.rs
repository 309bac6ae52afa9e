pub mod eapi;
pub mod ssh;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DeviceError;

pub use eapi::EapiTransport;
pub use ssh::SshTransport;

/// Login for every switch in a run. The password is never printed.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection settings shared by both transports
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub ssh_port: u16,
    pub eapi_protocol: String,
    pub eapi_port: u16,
    pub verify_ssl: bool,
    pub timeout: Duration,
}

/// Something that can open a configuration session to a switch
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs ("ssh" or "eapi")
    fn name(&self) -> &'static str;

    async fn connect(&self, host: &str) -> Result<Box<dyn Session>, DeviceError>;
}

/// An authenticated connection to one switch
#[async_trait]
pub trait Session: Send {
    /// Run the configuration sequence, returning device output on success
    async fn run_config(&mut self, commands: &[String]) -> Result<String, DeviceError>;

    /// Release the connection. Called on every exit path, including after a
    /// timed-out `run_config`, so it must not wait on the abandoned call.
    async fn close(self: Box<Self>);
}

/// Pick the transport once for the whole run
pub fn select(use_eapi: bool, credentials: Credentials, options: TransportOptions) -> Result<Box<dyn Transport>, DeviceError> {
    if use_eapi {
        Ok(Box::new(EapiTransport::new(credentials, options)?))
    } else {
        Ok(Box::new(SshTransport::new(credentials, options)))
    }
}
