use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::crypto::AuthContext;
use crate::error::OtaError;
use crate::network::{self, Connection, ControlChannel, Read};
use crate::progress::UploadProgress;
use crate::protocol::{
    self, Invitation, InvitationReply, AUTH_REPLY_SIZE, CHUNK_ACK_SIZE, DEFAULT_HOST_PORT,
    INVITATION_REPLY_SIZE, OK, RESULT_SIZE,
};
use crate::transfer::{Payload, TransferRequest};

/// Where to listen and how long to wait at each step
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub listen_addr: SocketAddr,
    /// Wait for each reply on the datagram channel
    pub reply_timeout: Duration,
    /// Wait for the device to connect back
    pub accept_timeout: Duration,
    /// Write plus acknowledgement of one chunk
    pub chunk_timeout: Duration,
    /// Wait for the final status after the last chunk
    pub result_timeout: Duration,
    pub show_progress: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HOST_PORT)),
            reply_timeout: Duration::from_secs(10),
            accept_timeout: Duration::from_secs(10),
            chunk_timeout: Duration::from_secs(10),
            result_timeout: Duration::from_secs(60),
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Bound,
    InvitationSent,
    Authenticating,
    AwaitingConnection,
    Streaming,
    AwaitingResult,
    Succeeded,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Bound => "bound",
            SessionState::InvitationSent => "invitation-sent",
            SessionState::Authenticating => "authenticating",
            SessionState::AwaitingConnection => "awaiting-connection",
            SessionState::Streaming => "streaming",
            SessionState::AwaitingResult => "awaiting-result",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a successful upload did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub device: SocketAddr,
    pub bytes_sent: u64,
    pub chunks_sent: u64,
}

/// One upload, driven from invitation to final status.
///
/// Every phase waits on exactly one thing with a deadline. Sockets are owned by
/// the phase that opened them and are dropped as soon as `run` returns, on
/// success and failure alike.
pub struct Session {
    request: TransferRequest,
    config: SessionConfig,
    state: SessionState,
}

impl Session {
    pub fn new(request: TransferRequest, config: SessionConfig) -> Self {
        Self {
            request,
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the whole upload once. There are no retries.
    pub async fn run(&mut self) -> Result<Summary, OtaError> {
        let outcome = self.drive().await;
        match &outcome {
            Ok(summary) => {
                info!(bytes = summary.bytes_sent, device = %summary.device, "upload finished");
                self.transition(SessionState::Succeeded);
            }
            Err(e) => {
                error!(error = %e, state = %self.state, "upload failed");
                self.transition(SessionState::Failed);
            }
        }
        outcome
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = %self.state, to = %next, "session state");
        self.state = next;
    }

    async fn drive(&mut self) -> Result<Summary, OtaError> {
        let payload = Payload::load(&self.request.image).await?;
        info!(
            size = payload.size(),
            chunks = payload.chunk_count(),
            md5 = payload.digest(),
            "upload size"
        );

        let target = network::resolve(&self.request.target_host, self.request.target_port).await?;

        let listener = network::listen(self.config.listen_addr).await?;
        let listen_addr = listener.local_addr();
        info!(addr = %listen_addr, "starting");
        self.transition(SessionState::Bound);

        self.invite(target, &payload, listen_addr.port()).await?;

        self.transition(SessionState::AwaitingConnection);
        info!("waiting for device");
        let accepted = listener
            .accept(self.config.accept_timeout)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "accept failed");
                None
            });
        let mut conn = accepted.ok_or(OtaError::DeviceUnresponsive)?;
        drop(listener);
        info!(device = %conn.peer_addr(), "device connected");

        self.transition(SessionState::Streaming);
        let chunks_sent = self.stream(&mut conn, &payload).await?;

        self.transition(SessionState::AwaitingResult);
        self.await_result(&mut conn).await?;

        Ok(Summary {
            device: conn.peer_addr(),
            bytes_sent: payload.size(),
            chunks_sent,
        })
    }

    async fn invite(
        &mut self,
        target: SocketAddr,
        payload: &Payload,
        listen_port: u16,
    ) -> Result<(), OtaError> {
        let channel = ControlChannel::open(target).await?;
        let invitation = Invitation {
            mode: self.request.mode,
            listen_port,
            size: payload.size(),
            digest: payload.digest().to_string(),
        };
        let line = invitation.to_line();

        info!(target = %target, "sending invitation");
        debug!(line = line.trim_end(), "invitation");
        channel.send(&line).await?;
        self.transition(SessionState::InvitationSent);

        let reply = channel
            .receive(INVITATION_REPLY_SIZE, self.config.reply_timeout)
            .await?
            .ok_or(OtaError::NoResponse)?;

        match InvitationReply::parse(&reply) {
            InvitationReply::Accepted => Ok(()),
            InvitationReply::Challenge { nonce } => {
                self.authenticate(&channel, payload, &nonce).await
            }
            InvitationReply::Rejected(text) => Err(OtaError::InvitationRejected(text)),
        }
    }

    async fn authenticate(
        &mut self,
        channel: &ControlChannel,
        payload: &Payload,
        nonce: &str,
    ) -> Result<(), OtaError> {
        self.transition(SessionState::Authenticating);

        let password = match &self.request.password {
            Some(password) => password.as_str(),
            None => {
                warn!("device asked for a password but none was given");
                ""
            }
        };
        let image_path = self.request.image.to_string_lossy();
        let context = AuthContext {
            image_path: &image_path,
            size: payload.size(),
            digest: payload.digest(),
            target_host: &self.request.target_host,
        };
        let response = context.respond(password, nonce);

        info!("authenticating");
        channel.send(&response.to_line()).await?;

        match channel
            .receive(AUTH_REPLY_SIZE, self.config.reply_timeout)
            .await?
        {
            Some(reply) if reply == OK => {
                info!("authenticated");
                Ok(())
            }
            Some(reply) => Err(OtaError::AuthFailed(protocol::reply_text(&reply))),
            None => Err(OtaError::AuthFailed(
                "no answer to authentication".to_string(),
            )),
        }
    }

    /// Send every chunk, one in flight at a time. Returns the chunk count.
    async fn stream(&self, conn: &mut Connection, payload: &Payload) -> Result<u64, OtaError> {
        let progress = UploadProgress::new(payload.size(), self.config.show_progress);
        let wait = self.config.chunk_timeout;
        let mut sent = 0u64;
        let mut index = 0u64;

        for chunk in payload.chunks() {
            let failure = match conn.send_chunk(chunk, CHUNK_ACK_SIZE, wait).await {
                Ok(Read::Data(ack)) => {
                    debug!(index, ack = %protocol::reply_text(&ack), "chunk acknowledged");
                    None
                }
                Ok(Read::Closed) => Some("connection closed by device".to_string()),
                Ok(Read::TimedOut) => Some(format!(
                    "no acknowledgement within {}",
                    humantime::format_duration(wait)
                )),
                Err(e) => Some(e.to_string()),
            };

            if let Some(reason) = failure {
                progress.abandon();
                return Err(OtaError::ChunkTransferFailed { index, reason });
            }

            index += 1;
            sent += chunk.len() as u64;
            progress.update(sent);
        }

        progress.finish();
        Ok(index)
    }

    async fn await_result(&self, conn: &mut Connection) -> Result<(), OtaError> {
        info!("waiting for result");
        match conn.receive(RESULT_SIZE, self.config.result_timeout).await {
            Ok(Read::Data(data)) => {
                let text = protocol::reply_text(&data);
                info!(result = %text, "result");
                if data == OK {
                    Ok(())
                } else {
                    Err(OtaError::TransferRejected(text))
                }
            }
            Ok(Read::Closed) | Ok(Read::TimedOut) => Err(OtaError::NoResult),
            Err(e) => {
                warn!(error = %e, "reading result failed");
                Err(OtaError::NoResult)
            }
        }
    }
}
