//! SSH transport: discovery commands over exec channels, downloads over SFTP

use ssh2::{ErrorCode, Session, Sftp};
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::SshConfig;
use crate::error::{SetupError, TransferError, TransportError};
use crate::remote::{dir_exists_via_shell, find_via_shell, stat_via_shell};
use crate::transfer::download_into;
use crate::transport::{CommandOutput, Connector, RemoteQuery, RemoteSession, RemoteShell};

// LIBSSH2_ERROR_TIMEOUT
const SSH_TIMEOUT: i32 = -9;

fn is_timeout(err: &ssh2::Error) -> bool {
    matches!(err.code(), ErrorCode::Session(SSH_TIMEOUT))
}

/// Opens one authenticated session per call
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Option<Duration> {
        (self.config.timeout_secs > 0).then(|| Duration::from_secs(self.config.timeout_secs))
    }

    fn tcp_connect(&self) -> Result<TcpStream, SetupError> {
        let addr = self.config.address();
        let connect_err = |source: io::Error| SetupError::Connect {
            addr: addr.clone(),
            source,
        };
        let sock = addr
            .to_socket_addrs()
            .map_err(connect_err)?
            .next()
            .ok_or_else(|| {
                connect_err(io::Error::new(io::ErrorKind::NotFound, "host did not resolve"))
            })?;
        let tcp = match self.timeout() {
            Some(t) => TcpStream::connect_timeout(&sock, t),
            None => TcpStream::connect(sock),
        }
        .map_err(connect_err)?;
        Ok(tcp)
    }
}

impl Connector for SshConnector {
    type Session = SshSession;

    fn connect(&self) -> Result<SshSession, SetupError> {
        let addr = self.config.address();
        let tcp = self.tcp_connect()?;

        let mut session = Session::new().map_err(|e| SetupError::Handshake {
            addr: addr.clone(),
            message: e.to_string(),
        })?;
        session.set_tcp_stream(tcp);
        if let Some(t) = self.timeout() {
            session.set_timeout(u32::try_from(t.as_millis()).unwrap_or(u32::MAX));
        }
        session.handshake().map_err(|e| SetupError::Handshake {
            addr: addr.clone(),
            message: e.to_string(),
        })?;

        session
            .userauth_pubkey_file(
                &self.config.username,
                None,
                &self.config.private_key_path,
                self.config.passphrase.as_deref(),
            )
            .map_err(|e| SetupError::Auth {
                user: self.config.username.clone(),
                message: e.to_string(),
            })?;
        if !session.authenticated() {
            return Err(SetupError::Auth {
                user: self.config.username.clone(),
                message: "server rejected the key".into(),
            });
        }

        log::debug!("connected to {} as {}", addr, self.config.username);
        Ok(SshSession {
            session,
            sftp: None,
            timeout: self.timeout(),
        })
    }
}

/// Authenticated connection; disconnects on drop
pub struct SshSession {
    session: Session,
    sftp: Option<Sftp>,
    timeout: Option<Duration>,
}

impl SshSession {
    fn sftp(&mut self) -> Result<&Sftp, TransferError> {
        if self.sftp.is_none() {
            let sftp = self.session.sftp().map_err(|e| {
                if is_timeout(&e) {
                    TransferError::Timeout
                } else {
                    TransferError::Connect(format!("SFTP subsystem unavailable: {}", e))
                }
            })?;
            self.sftp = Some(sftp);
        }
        self.sftp
            .as_ref()
            .ok_or_else(|| TransferError::Connect("SFTP subsystem unavailable".into()))
    }
}

fn channel_err(command: &str, err: ssh2::Error) -> TransportError {
    if is_timeout(&err) {
        TransportError::Timeout(command.to_string())
    } else {
        TransportError::Channel(err.to_string())
    }
}

fn read_err(command: &str, err: io::Error) -> TransportError {
    if err.kind() == io::ErrorKind::TimedOut {
        TransportError::Timeout(command.to_string())
    } else {
        TransportError::Channel(err.to_string())
    }
}

/// Keep the UTF-8 lines of `raw`, dropping the rest with a warning
fn utf8_lines(raw: &[u8], command: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for line in raw.split(|b| *b == b'\n').filter(|l| !l.is_empty()) {
        match std::str::from_utf8(line) {
            Ok(text) => {
                out.push_str(text);
                out.push('\n');
            }
            Err(_) => log::warn!(
                "skipping non UTF-8 output line of `{}`: {}",
                command,
                String::from_utf8_lossy(line)
            ),
        }
    }
    out
}

/// Read one chunk into `sink`; `Ok(false)` when nothing was ready
fn pump<R: Read>(stream: &mut R, buf: &mut [u8], sink: &mut Vec<u8>) -> io::Result<bool> {
    match stream.read(buf) {
        Ok(0) => Ok(false),
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

impl SshSession {
    /// Drain stdout and stderr together until the remote closes both.
    /// Unread stderr holds the channel window and would stall stdout.
    fn drain(
        &self,
        channel: &mut ssh2::Channel,
        command: &str,
    ) -> Result<(Vec<u8>, Vec<u8>), TransportError> {
        let mut idle_since = Instant::now();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut buf = vec![0u8; 32 * 1024];
        loop {
            let got_out = pump(channel, &mut buf, &mut stdout).map_err(|e| read_err(command, e))?;
            let got_err =
                pump(&mut channel.stderr(), &mut buf, &mut stderr).map_err(|e| read_err(command, e))?;
            if got_out || got_err {
                idle_since = Instant::now();
                continue;
            }
            if channel.eof() {
                return Ok((stdout, stderr));
            }
            if self.timeout.is_some_and(|t| idle_since.elapsed() >= t) {
                return Err(TransportError::Timeout(command.to_string()));
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl RemoteShell for SshSession {
    fn exec(&mut self, command: &str) -> Result<CommandOutput, TransportError> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| channel_err(command, e))?;
        channel.exec(command).map_err(|e| channel_err(command, e))?;

        self.session.set_blocking(false);
        let drained = self.drain(&mut channel, command);
        self.session.set_blocking(true);
        let (raw_out, raw_err) = drained?;
        let stdout = utf8_lines(&raw_out, command);
        let stderr = String::from_utf8_lossy(&raw_err).into_owned();

        channel.wait_close().map_err(|e| channel_err(command, e))?;
        let exit_status = channel.exit_status().map_err(|e| channel_err(command, e))?;

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_status,
        })
    }
}

impl RemoteQuery for SshSession {
    fn dir_exists(&mut self, root: &str) -> Result<bool, TransportError> {
        dir_exists_via_shell(self, root)
    }

    fn find_by_name(&mut self, root: &str, name: &str) -> Result<Option<String>, TransportError> {
        find_via_shell(self, root, name)
    }

    fn stat_size(&mut self, path: &str) -> Result<Option<u64>, TransportError> {
        stat_via_shell(self, path)
    }
}

impl RemoteSession for SshSession {
    fn fetch_file(&mut self, remote: &str, local: &Path) -> Result<u64, TransferError> {
        let sftp = self.sftp()?;
        let file = sftp.open(Path::new(remote)).map_err(|e| {
            if is_timeout(&e) {
                TransferError::Timeout
            } else {
                TransferError::RemoteOpen {
                    path: remote.to_string(),
                    message: e.message().to_string(),
                }
            }
        })?;
        download_into(file, remote, local)
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.sftp.take();
        let _ = self.session.disconnect(None, "sizesync finished", None);
    }
}
