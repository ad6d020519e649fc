//! Module `data_channel`
//!
//! Passive-mode data connections. A [`DataChannel`] is opened for exactly
//! one transfer (LIST, RETR or STOR) and is never reused; dropping it closes
//! the connection and releases the client's transfer slot.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::pin::Pin;
use std::sync::LazyLock;
use std::task::{Context, Poll};

use log::{debug, info};
use regex::Regex;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::sync::OwnedMutexGuard;

use crate::error::FtpError;

static PASV_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d+)\s*,\s*(-?\d+)\s*,\s*(-?\d+)\s*,\s*(-?\d+)\s*,\s*(-?\d+)\s*,\s*(-?\d+)")
        .expect("pasv address pattern")
});

/// Extracts the data address from a `227` reply.
///
/// Looks for the first run of six comma separated numbers anywhere in the
/// text, so both `(h1,h2,h3,h4,p1,p2)` and bare `h1,h2,h3,h4,p1,p2` framings
/// are accepted. Port bytes are masked to 8 bits.
pub fn parse_pasv_reply(text: &str) -> Option<SocketAddrV4> {
    let caps = PASV_ADDRESS.captures(text)?;
    let mut numbers = [0i64; 6];
    for (i, n) in numbers.iter_mut().enumerate() {
        *n = caps[i + 1].parse().ok()?;
    }

    let mut octets = [0u8; 4];
    for (octet, n) in octets.iter_mut().zip(&numbers[..4]) {
        *octet = u8::try_from(*n).ok()?;
    }
    let port = ((numbers[4] & 255) * 256 + (numbers[5] & 255)) as u16;
    Some(SocketAddrV4::new(Ipv4Addr::from(octets), port))
}

/// A single-use passive data connection.
pub struct DataChannel {
    stream: TcpStream,
    peer: SocketAddr,
    _slot: OwnedMutexGuard<()>,
}

impl DataChannel {
    /// Connects to the address announced by the server.
    pub(crate) async fn connect(
        addr: SocketAddrV4,
        slot: OwnedMutexGuard<()>,
    ) -> Result<Self, FtpError> {
        debug!("Opening passive data connection to {}", addr);
        let stream = TcpStream::connect(addr).await?;
        let peer = SocketAddr::V4(addr);
        info!("Passive data connection established with {}", peer);
        Ok(Self {
            stream,
            peer,
            _slot: slot,
        })
    }

    /// Address of the server's data port.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl AsyncRead for DataChannel {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for DataChannel {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}
