//! Running verifications over TCP.
//!
//! The wire format has no framing beyond fixed sizes: each round the verifier
//! writes a 16 byte nonce, and the server answers with a 64 byte point.
//! Everything else is handled by the sessions in [crate::aggregate] and
//! [crate::verify], which this module just feeds with bytes.
use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use smol::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    Timer,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::{
    aggregate::{AggregationSession, ServingContext},
    compat::CSCurve,
    constants::{NONCE_LEN, POINT_LEN},
    keys::Nonce,
    protocol::{Action, Participant, Protocol, ProtocolError},
    sign::Signature,
    verify::{Verdict, VerifySession},
};

/// The port the server listens on by default.
pub const DEFAULT_PORT: u16 = 5555;

/// How long to wait for each message, by default.
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(30);

fn server_participant() -> Participant {
    Participant::from(0u32)
}

fn client_participant() -> Participant {
    Participant::from(1u32)
}

/// An error raised while running a session over the network.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// The peer didn't send anything in time.
    #[error("timed out waiting for round {round}")]
    Timeout { round: usize },
    /// The server didn't accept the connection in time.
    #[error("timed out connecting to {addr}")]
    ConnectTimeout { addr: SocketAddr },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Configuration for an [AggregationServer].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// How long to wait for each nonce before abandoning a session.
    pub round_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            round_timeout: DEFAULT_ROUND_TIMEOUT,
        }
    }
}

/// Configuration for a verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// How long to wait for the connection, and then for each partial commitment.
    pub round_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            round_timeout: DEFAULT_ROUND_TIMEOUT,
        }
    }
}

async fn read_frame(
    stream: &mut TcpStream,
    frame: &mut [u8],
    timeout: Duration,
    round: usize,
) -> Result<(), TransportError> {
    smol::future::or(
        async { stream.read_exact(frame).await.map_err(TransportError::from) },
        async {
            Timer::after(timeout).await;
            Err(TransportError::Timeout { round })
        },
    )
    .await
}

async fn connect(addr: SocketAddr, timeout: Duration) -> Result<TcpStream, TransportError> {
    smol::future::or(
        async { TcpStream::connect(addr).await.map_err(TransportError::from) },
        async {
            Timer::after(timeout).await;
            Err(TransportError::ConnectTimeout { addr })
        },
    )
    .await
}

/// Run a protocol against a single peer, until it returns.
///
/// Whenever the protocol waits, exactly one frame of `frame_len` bytes is read.
async fn drive<P: Protocol>(
    stream: &mut TcpStream,
    protocol: &mut P,
    peer: Participant,
    frame_len: usize,
    timeout: Duration,
) -> Result<P::Output, TransportError> {
    let mut round = 0;
    loop {
        loop {
            match protocol.poke()? {
                Action::Wait => break,
                Action::SendPrivate(_, m) => {
                    stream.write_all(&m).await?;
                }
                Action::Return(out) => {
                    stream.flush().await?;
                    return Ok(out);
                }
            }
        }
        round += 1;
        let mut frame = vec![0u8; frame_len];
        read_frame(stream, &mut frame, timeout, round).await?;
        debug!(round, "received frame");
        protocol.message(peer, frame);
    }
}

/// Serve a single verification on an accepted connection.
#[instrument(skip_all, fields(peer = %addr))]
async fn serve_connection<C: CSCurve>(
    context: Arc<ServingContext<C>>,
    mut stream: TcpStream,
    addr: SocketAddr,
    round_timeout: Duration,
) -> Result<Nonce, TransportError> {
    info!("starting aggregation session");
    let mut session = AggregationSession::new(context);
    let result = drive(
        &mut stream,
        &mut session,
        client_participant(),
        NONCE_LEN,
        round_timeout,
    )
    .await;
    match &result {
        Ok(_) => info!("aggregation session finished"),
        Err(e) => warn!(error = %e, "abandoned aggregation session"),
    }
    result
}

/// A server answering verifiers with partial commitments.
///
/// This is cheap to clone, with every clone sharing the same listener and tables.
#[derive(Clone)]
pub struct AggregationServer<C: CSCurve> {
    context: Arc<ServingContext<C>>,
    listener: TcpListener,
    config: ServerConfig,
}

impl<C: CSCurve> AggregationServer<C> {
    /// Start listening, without accepting anybody yet.
    pub async fn bind(
        context: Arc<ServingContext<C>>,
        config: ServerConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!(addr = %listener.local_addr()?, "aggregation server listening");
        Ok(Self {
            context,
            listener,
            config,
        })
    }

    /// The address this server actually listens on.
    ///
    /// This is useful when binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn context(&self) -> &Arc<ServingContext<C>> {
        &self.context
    }

    /// Accept one connection, and serve it until the session ends.
    ///
    /// This returns the nonce the session was about.
    pub async fn serve_one(&self) -> Result<Nonce, TransportError> {
        let (stream, addr) = self.listener.accept().await?;
        serve_connection(
            self.context.clone(),
            stream,
            addr,
            self.config.round_timeout,
        )
        .await
    }

    /// Serve sessions one after the other, forever.
    ///
    /// A failed session only affects its own connection. This only returns
    /// if accepting a connection fails.
    pub async fn serve(&self) -> Result<(), TransportError> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            // Failures have already been logged.
            let _ = serve_connection(
                self.context.clone(),
                stream,
                addr,
                self.config.round_timeout,
            )
            .await;
        }
    }

    /// Serve every connection in its own task, forever.
    ///
    /// The tables are shared between sessions, but nothing else is.
    pub async fn serve_concurrent(&self) -> Result<(), TransportError> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            smol::spawn(serve_connection(
                self.context.clone(),
                stream,
                addr,
                self.config.round_timeout,
            ))
            .detach();
        }
    }
}

/// Verify a signature over an established connection to the server.
#[instrument(skip_all)]
pub async fn request_verification<C: CSCurve>(
    stream: &mut TcpStream,
    signature: &Signature<C>,
    message: &[u8],
    public_key: &C::AffinePoint,
    config: &ClientConfig,
) -> Result<Verdict, TransportError> {
    let server = server_participant();
    let mut session = VerifySession::new(server, *signature, message, *public_key);
    let verdict = drive(&mut *stream, &mut session, server, POINT_LEN, config.round_timeout).await?;
    debug!(?verdict, "verification finished");
    Ok(verdict)
}

/// Connect to a server, and verify a signature, blocking until done.
pub fn verify_remote<C: CSCurve>(
    addr: SocketAddr,
    signature: &Signature<C>,
    message: &[u8],
    public_key: &C::AffinePoint,
    config: &ClientConfig,
) -> Result<Verdict, TransportError> {
    smol::block_on(async {
        let mut stream = connect(addr, config.round_timeout).await?;
        request_verification(&mut stream, signature, message, public_key, config).await
    })
}
