use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpListener, TcpStream, UdpSocket};
use tokio::time::timeout;

use crate::error::OtaError;

/// Resolve the device address, preferring whatever the resolver lists first
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr, OtaError> {
    let invalid = || OtaError::InvalidTarget {
        host: host.to_string(),
        port,
    };

    lookup_host((host, port))
        .await
        .map_err(|_| invalid())?
        .next()
        .ok_or_else(invalid)
}

/// Bind the endpoint the device connects back to
pub async fn listen(addr: SocketAddr) -> Result<Listener, OtaError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| OtaError::SetupFailed { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| OtaError::SetupFailed { addr, source })?;

    Ok(Listener {
        listener,
        local_addr,
    })
}

/// Listening socket waiting for the device
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Address actually bound, with the kernel-assigned port if 0 was asked
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for one inbound connection; `None` if the deadline passes
    pub async fn accept(&self, wait: Duration) -> io::Result<Option<Connection>> {
        match timeout(wait, self.listener.accept()).await {
            Ok(accepted) => {
                let (stream, peer_addr) = accepted?;
                stream.set_nodelay(true)?;
                Ok(Some(Connection::new(stream, peer_addr)))
            }
            Err(_) => Ok(None),
        }
    }
}

/// Outcome of a bounded read
#[derive(Debug, PartialEq, Eq)]
pub enum Read {
    Data(Vec<u8>),
    Closed,
    TimedOut,
}

/// Accepted connection from the device
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl Connection {
    pub fn new(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self { stream, peer_addr }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Write the whole chunk then read its acknowledgement, all within `wait`
    pub async fn send_chunk(
        &mut self,
        chunk: &[u8],
        ack_size: usize,
        wait: Duration,
    ) -> io::Result<Read> {
        let round_trip = async {
            self.stream.write_all(chunk).await?;
            self.stream.flush().await?;
            read_once(&mut self.stream, ack_size).await
        };

        match timeout(wait, round_trip).await {
            Ok(read) => read,
            Err(_) => Ok(Read::TimedOut),
        }
    }

    /// Single read of at most `size` bytes within `wait`
    pub async fn receive(&mut self, size: usize, wait: Duration) -> io::Result<Read> {
        match timeout(wait, read_once(&mut self.stream, size)).await {
            Ok(read) => read,
            Err(_) => Ok(Read::TimedOut),
        }
    }
}

async fn read_once(stream: &mut TcpStream, size: usize) -> io::Result<Read> {
    let mut buffer = vec![0u8; size];
    let n = stream.read(&mut buffer).await?;
    if n == 0 {
        return Ok(Read::Closed);
    }
    buffer.truncate(n);
    Ok(Read::Data(buffer))
}

/// Datagram socket used for the invitation and authentication exchange
pub struct ControlChannel {
    socket: UdpSocket,
    target: SocketAddr,
}

impl ControlChannel {
    /// Open an ephemeral socket in the target's address family
    pub async fn open(target: SocketAddr) -> Result<Self, OtaError> {
        let bind_addr: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(OtaError::Datagram)?;

        Ok(Self { socket, target })
    }

    pub async fn send(&self, line: &str) -> Result<(), OtaError> {
        self.socket
            .send_to(line.as_bytes(), self.target)
            .await
            .map_err(OtaError::Datagram)?;
        Ok(())
    }

    /// Wait for one reply of at most `size` bytes; `None` on timeout
    pub async fn receive(&self, size: usize, wait: Duration) -> Result<Option<Vec<u8>>, OtaError> {
        let mut buffer = vec![0u8; size];
        match timeout(wait, self.socket.recv_from(&mut buffer)).await {
            Ok(received) => {
                let (n, _) = received.map_err(OtaError::Datagram)?;
                buffer.truncate(n);
                Ok(Some(buffer))
            }
            Err(_) => Ok(None),
        }
    }
}
