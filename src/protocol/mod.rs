use std::fmt;

/// Port the session listens on for the device to connect back
pub const DEFAULT_HOST_PORT: u16 = 48266;

/// OTA port the device listens on for invitations
pub const DEFAULT_DEVICE_PORT: u16 = 8266;

/// Payload bytes per write, sized to fit one TCP segment
pub const CHUNK_SIZE: usize = 1460;

/// Bytes read back from the device after every chunk
pub const CHUNK_ACK_SIZE: usize = 4;

/// Largest reply expected to an invitation
pub const INVITATION_REPLY_SIZE: usize = 37;

/// Largest reply expected to an auth response
pub const AUTH_REPLY_SIZE: usize = 32;

/// Largest final status message
pub const RESULT_SIZE: usize = 32;

/// Plain acknowledgement sent by the device
pub const OK: &[u8] = b"OK";

const AUTH_PREFIX: &[u8] = b"AUTH";

/// Command codes carried in the first field of every datagram we send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Write the image to the program flash
    Flash,
    /// Write the image to the filesystem partition
    Spiffs,
    /// Answer to an authentication challenge
    Auth,
}

impl Command {
    pub fn code(self) -> u16 {
        match self {
            Command::Flash => 0,
            Command::Spiffs => 100,
            Command::Auth => 200,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// What kind of image is being uploaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    FirmwareFlash,
    FilesystemImage,
}

impl Mode {
    pub fn command(self) -> Command {
        match self {
            Mode::FirmwareFlash => Command::Flash,
            Mode::FilesystemImage => Command::Spiffs,
        }
    }
}

/// Datagram announcing an upcoming upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invitation {
    pub mode: Mode,
    pub listen_port: u16,
    pub size: u64,
    pub digest: String,
}

impl Invitation {
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {}\n",
            self.mode.command(),
            self.listen_port,
            self.size,
            self.digest
        )
    }
}

/// Datagram answering an `AUTH` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub client_nonce: String,
    pub digest: String,
}

impl AuthResponse {
    pub fn to_line(&self) -> String {
        format!("{} {} {}\n", Command::Auth, self.client_nonce, self.digest)
    }
}

/// Reply received for an invitation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvitationReply {
    /// Device accepted, no authentication needed
    Accepted,
    /// Device wants a password proof for this nonce
    Challenge { nonce: String },
    /// Anything else, kept verbatim for the error report
    Rejected(String),
}

impl InvitationReply {
    pub fn parse(data: &[u8]) -> Self {
        if data == OK {
            return InvitationReply::Accepted;
        }

        let text = reply_text(data);
        if data.starts_with(AUTH_PREFIX) {
            if let Some(nonce) = text.split_whitespace().nth(1) {
                return InvitationReply::Challenge {
                    nonce: nonce.to_string(),
                };
            }
        }

        InvitationReply::Rejected(text)
    }
}

/// Render device bytes for logs and error messages
pub fn reply_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}
