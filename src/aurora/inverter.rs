use crate::prelude::*;
use crate::aurora::packet::{self, MAX_RESPONSE};

use {
    net2::TcpStreamExt,
    std::time::Duration,
    tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    tokio::net::TcpStream,
};

const TCP_KEEPALIVE_SECS: u64 = 60;

/// Opens the TCP connection to the WiFi bridge and wraps it in a [`Client`].
///
/// The bridge accepts connections even when the inverter behind it is powered
/// down, so a successful connect says nothing about the inverter itself.
pub async fn connect(inverter: &config::Inverter) -> Result<Client<TcpStream>> {
    info!(
        "inverter {} attempting connection to {}:{}",
        inverter.address(),
        inverter.host(),
        inverter.port()
    );

    let hp = (inverter.host().to_owned(), inverter.port());
    let stream = match inverter.connect_timeout() {
        Some(limit) => match tokio::time::timeout(limit, TcpStream::connect(hp)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => bail!("failed to connect to {}:{}: {}", inverter.host(), inverter.port(), e),
            Err(_) => {
                return Err(Error::Timeout(limit))
                    .with_context(|| format!("connecting to {}:{}", inverter.host(), inverter.port()))
            }
        },
        None => TcpStream::connect(hp)
            .await
            .with_context(|| format!("failed to connect to {}:{}", inverter.host(), inverter.port()))?,
    };

    let std_stream = stream.into_std()?;
    if let Err(e) = std_stream.set_keepalive(Some(Duration::new(TCP_KEEPALIVE_SECS, 0))) {
        warn!("failed to set TCP keepalive: {}", e);
    }
    let stream = TcpStream::from_std(std_stream)?;

    if inverter.use_tcp_nodelay() {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY: {}", e);
        }
    }

    info!("inverter {} connection established", inverter.address());

    Ok(Client::new(
        stream,
        inverter.address(),
        inverter.read_delay(),
        inverter.read_timeout(),
    ))
}

/// Request/response exchange with one inverter over an already open stream.
///
/// Requests are strictly one at a time: the protocol has no tagging, so a
/// reply can only be matched to the request that was just sent.
pub struct Client<S> {
    stream: S,
    address: u8,
    read_delay: Duration,
    timeout: Duration,
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, address: u8, read_delay: Duration, timeout: Duration) -> Self {
        Self {
            stream,
            address,
            read_delay,
            timeout,
        }
    }

    /// Sends one request and returns the reply body with the CRC removed,
    /// waiting the client's configured read delay in between.
    pub async fn execute(&mut self, opcode: u8, sub_opcode: Option<u8>) -> Result<Vec<u8>, Error> {
        self.execute_with_delay(opcode, sub_opcode, self.read_delay)
            .await
    }

    /// As [`Client::execute`], with an explicit settle delay.
    ///
    /// The bridge does not reliably have the reply buffered straight away;
    /// reading too early returns a short or stale buffer.
    pub async fn execute_with_delay(
        &mut self,
        opcode: u8,
        sub_opcode: Option<u8>,
        read_delay: Duration,
    ) -> Result<Vec<u8>, Error> {
        debug!("cmd: {} subcmd: {:?}", opcode, sub_opcode);

        let frame = packet::build_frame(self.address, opcode, sub_opcode);
        debug!("cmd buffer: {}", Utils::hex(&frame));

        self.send(&frame).await?;

        if !read_delay.is_zero() {
            tokio::time::sleep(read_delay).await;
        }

        let reply = self.receive().await?;
        debug!("response buffer: {}", Utils::hex(&reply));

        let payload = packet::strip_crc(&reply)?;
        if let Some((transmission, global)) = packet::states(payload) {
            trace!("transmission state {} global state {}", transmission, global);
        }

        Ok(payload.to_vec())
    }

    async fn send(&mut self, frame: &[u8]) -> Result<(), Error> {
        let timeout = self.timeout;
        let stream = &mut self.stream;
        let write = async move {
            stream.write_all(frame).await?;
            stream.flush().await
        };

        match tokio::time::timeout(timeout, write).await {
            Ok(r) => Ok(r?),
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }

    async fn receive(&mut self) -> Result<Vec<u8>, Error> {
        let mut buf = [0; MAX_RESPONSE];

        let len = match tokio::time::timeout(self.timeout, self.stream.read(&mut buf)).await {
            Ok(r) => r?,
            Err(_) => return Err(Error::Timeout(self.timeout)),
        };

        if len == 0 {
            return Err(Error::Disconnected);
        }

        Ok(buf[..len].to_vec())
    }
}
