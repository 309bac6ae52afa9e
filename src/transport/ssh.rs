use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex_lite::Regex;

use super::{Credentials, Session, Transport, TransportOptions};
use crate::error::DeviceError;

// libssh2 codes that mean the server answered and said no
const LIBSSH2_ERROR_PASSWORD_EXPIRED: i32 = -15;
const LIBSSH2_ERROR_METHOD_NONE: i32 = -17;
const LIBSSH2_ERROR_AUTHENTICATION_FAILED: i32 = -18;
const LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED: i32 = -19;
const LIBSSH2_ERROR_METHOD_NOT_SUPPORTED: i32 = -33;

/// Any EOS CLI line starting with `% ` reports a problem
static CLI_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%\s+\S").expect("CLI error pattern is valid"));

/// Answers every keyboard-interactive prompt (EOS asks for "Password:") with the login password
struct EosPasswordResponder<'a> {
    password: &'a str,
}

impl ssh2::KeyboardInteractivePrompt for EosPasswordResponder<'_> {
    fn prompt<'p>(&mut self, _username: &str, _instructions: &str, prompts: &[ssh2::Prompt<'p>]) -> Vec<String> {
        vec![self.password.to_string(); prompts.len()]
    }
}

/// Configures switches through the EOS CLI over an interactive SSH shell
pub struct SshTransport {
    credentials: Credentials,
    options: TransportOptions,
}

impl SshTransport {
    pub fn new(credentials: Credentials, options: TransportOptions) -> Self {
        Self { credentials, options }
    }
}

#[async_trait]
impl Transport for SshTransport {
    fn name(&self) -> &'static str {
        "ssh"
    }

    async fn connect(&self, host: &str) -> Result<Box<dyn Session>, DeviceError> {
        let host = host.to_string();
        let port = self.options.ssh_port;
        let user = self.credentials.username.clone();
        let pass = self.credentials.password.clone();
        let timeout = self.options.timeout;

        let (session, socket) = tokio::task::spawn_blocking(move || ssh_connect(&host, port, &user, &pass, timeout))
            .await
            .map_err(|e| DeviceError::Connection(format!("Task join error: {}", e)))??;

        Ok(Box::new(SshSession {
            session,
            socket,
            busy: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct SshSession {
    session: ssh2::Session,
    /// Second handle on the session's socket, used to abort a stuck run
    socket: TcpStream,
    /// Set while a blocking run holds the session
    busy: Arc<AtomicBool>,
}

#[async_trait]
impl Session for SshSession {
    async fn run_config(&mut self, commands: &[String]) -> Result<String, DeviceError> {
        let session = self.session.clone();
        let commands = commands.to_vec();
        let busy = self.busy.clone();

        busy.store(true, Ordering::SeqCst);
        tokio::task::spawn_blocking(move || {
            let result = ssh_run_interactive(&session, &commands);
            busy.store(false, Ordering::SeqCst);
            result
        })
        .await
        .map_err(|e| DeviceError::Connection(format!("Task join error: {}", e)))?
    }

    async fn close(self: Box<Self>) {
        let SshSession { session, socket, busy } = *self;

        // An abandoned run still owns the session; cut the socket so it stops
        if busy.load(Ordering::SeqCst) {
            tracing::debug!("SSH run still in progress, shutting down socket");
            if let Err(e) = socket.shutdown(Shutdown::Both) {
                tracing::debug!("SSH socket shutdown failed: {}", e);
            }
            return;
        }

        let result = tokio::task::spawn_blocking(move || session.disconnect(None, "done", None)).await;
        if let Ok(Err(e)) = result {
            tracing::debug!("SSH disconnect failed: {}", e);
        }
    }
}

/// Open TCP, handshake, and log in. Host keys are accepted on first use;
/// the fingerprint is logged at debug.
/// This is blocking, so call from a spawn_blocking context.
fn ssh_connect(host: &str, port: u16, user: &str, pass: &str, timeout: Duration) -> Result<(ssh2::Session, TcpStream), DeviceError> {
    let addrs: Vec<_> = (host, port)
        .to_socket_addrs()
        .map_err(|e| DeviceError::Connection(format!("Invalid address {}:{}: {}", host, port, e)))?
        .collect();

    let mut last_err = None;
    let mut tcp = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => {
                tcp = Some(stream);
                break;
            }
            Err(e) => last_err = Some(e),
        }
    }
    let tcp = tcp.ok_or_else(|| {
        DeviceError::Connection(match last_err {
            Some(e) => format!("TCP connection failed: {}", e),
            None => format!("No addresses for {}", host),
        })
    })?;

    tcp.set_read_timeout(Some(timeout)).ok();
    tcp.set_write_timeout(Some(timeout)).ok();
    let socket = tcp.try_clone()
        .map_err(|e| DeviceError::Connection(format!("Failed to clone socket: {}", e)))?;

    let mut session = ssh2::Session::new()
        .map_err(|e| DeviceError::Connection(format!("Failed to create SSH session: {}", e)))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
    session.handshake()
        .map_err(|e| DeviceError::Connection(format!("SSH handshake failed: {}", e)))?;

    if let Some(hash) = session.host_key_hash(ssh2::HashType::Sha256) {
        let fingerprint: String = hash.iter().map(|b| format!("{:02x}", b)).collect();
        tracing::debug!("{}: host key sha256 {}", host, fingerprint);
    }

    login(&session, user, pass)?;
    Ok((session, socket))
}

/// Password auth, then keyboard-interactive (what EOS usually offers).
/// Only a server refusal is an authentication failure; I/O trouble on the
/// way is a connection failure.
fn login(session: &ssh2::Session, user: &str, pass: &str) -> Result<(), DeviceError> {
    match session.userauth_password(user, pass) {
        Ok(()) if session.authenticated() => return Ok(()),
        Ok(()) => {}
        Err(e) => {
            let err = classify_auth_error(&e);
            if err.kind() != "authentication" {
                return Err(err);
            }
            tracing::debug!("Password auth refused for {}, trying keyboard-interactive", user);
        }
    }

    let mut responder = EosPasswordResponder { password: pass };
    match session.userauth_keyboard_interactive(user, &mut responder) {
        Ok(()) if session.authenticated() => Ok(()),
        Ok(()) => Err(DeviceError::Authentication(format!("SSH login rejected for user {}", user))),
        Err(e) => Err(classify_auth_error(&e)),
    }
}

/// Split libssh2 userauth errors into refusals and transport failures
fn classify_auth_error(e: &ssh2::Error) -> DeviceError {
    match e.code() {
        ssh2::ErrorCode::Session(
            LIBSSH2_ERROR_PASSWORD_EXPIRED
            | LIBSSH2_ERROR_METHOD_NONE
            | LIBSSH2_ERROR_AUTHENTICATION_FAILED
            | LIBSSH2_ERROR_PUBLICKEY_UNVERIFIED
            | LIBSSH2_ERROR_METHOD_NOT_SUPPORTED,
        ) => DeviceError::Authentication(format!("SSH login rejected: {}", e.message())),
        _ => DeviceError::Connection(format!("SSH login interrupted: {}", e)),
    }
}

/// Drive the EOS CLI through a PTY shell and check the transcript for errors.
/// This is blocking, so call from a spawn_blocking context.
fn ssh_run_interactive(session: &ssh2::Session, commands: &[String]) -> Result<String, DeviceError> {
    let io_err = |what: &str, e: &dyn std::fmt::Display| DeviceError::Connection(format!("{}: {}", what, e));

    let mut channel = session.channel_session()
        .map_err(|e| io_err("Failed to open channel", &e))?;
    channel.request_pty("vt100", None, None)
        .map_err(|e| io_err("Failed to request PTY", &e))?;
    channel.shell()
        .map_err(|e| io_err("Failed to start shell", &e))?;

    let script = shell_script(commands);
    channel.write_all(script.as_bytes())
        .map_err(|e| io_err("Failed to send commands", &e))?;
    channel.flush().ok();
    channel.send_eof().ok();

    let mut raw = Vec::new();
    channel.read_to_end(&mut raw)
        .map_err(|e| io_err("Failed to read output", &e))?;
    let _ = channel.wait_close();

    let output = String::from_utf8_lossy(&raw).into_owned();
    match find_cli_error(&output) {
        Some(line) => Err(DeviceError::Command(line)),
        None => Ok(output),
    }
}

/// Lines typed into the shell: escalate, disable paging, configure, log out
fn shell_script(commands: &[String]) -> String {
    let mut script = String::from("enable\nterminal length 0\n");
    for cmd in commands {
        script.push_str(cmd);
        script.push('\n');
    }
    script.push_str("exit\n");
    script
}

/// First EOS error line in a CLI transcript, if any
fn find_cli_error(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|line| CLI_ERROR.is_match(line))
        .map(str::to_string)
}
