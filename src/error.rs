use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Why an upload session ended without success
#[derive(Debug, thiserror::Error)]
pub enum OtaError {
    #[error("cannot read image {}: {source}", .path.display())]
    ImageUnreadable { path: PathBuf, source: io::Error },

    #[error("invalid target {host}:{port}")]
    InvalidTarget { host: String, port: u16 },

    #[error("listen failed on {addr}: {source}")]
    SetupFailed { addr: SocketAddr, source: io::Error },

    #[error("datagram socket error: {0}")]
    Datagram(#[source] io::Error),

    #[error("no answer to invitation")]
    NoResponse,

    #[error("invitation rejected: {0}")]
    InvitationRejected(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("no response from device")]
    DeviceUnresponsive,

    #[error("error uploading chunk {index}: {reason}")]
    ChunkTransferFailed { index: u64, reason: String },

    #[error("no result from device")]
    NoResult,

    #[error("device rejected image: {0}")]
    TransferRejected(String),
}
