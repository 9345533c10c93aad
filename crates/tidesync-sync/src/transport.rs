//! The remote sync endpoint
//!
//! A round talks to the server through [`SyncTransport`]. [`TcpTransport`]
//! sends every request over a fresh TCP connection as one length-delimited
//! JSON frame and reads the response the same way.

use crate::item::{FileSyncRequest, FileSyncResponse};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use tidesync_types::{Error, Result};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder, Framed, LengthDelimitedCodec};
use tracing::debug;

/// Largest frame either side accepts
pub const MAX_FRAME_LENGTH: usize = 1 << 30;

/// Anything that can answer a sync request
#[async_trait]
pub trait SyncTransport: Send {
    /// Send one request and wait for the server's answer
    async fn sync(&mut self, request: FileSyncRequest) -> Result<FileSyncResponse>;
}

/// JSON payloads inside length-delimited frames
///
/// Encodes `E` and decodes `D`, so one side of a connection uses
/// [`ClientCodec`] and the other [`ServerCodec`].
pub struct JsonCodec<E, D> {
    length_codec: LengthDelimitedCodec,
    _marker: PhantomData<fn(E) -> D>,
}

/// Codec for the requesting side
pub type ClientCodec = JsonCodec<FileSyncRequest, FileSyncResponse>;

/// Codec for the answering side
pub type ServerCodec = JsonCodec<FileSyncResponse, FileSyncRequest>;

impl<E, D> JsonCodec<E, D> {
    /// Create a codec
    pub fn new() -> Self {
        Self {
            length_codec: LengthDelimitedCodec::builder()
                .max_frame_length(MAX_FRAME_LENGTH)
                .new_codec(),
            _marker: PhantomData,
        }
    }
}

impl<E, D> Default for JsonCodec<E, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, D> fmt::Debug for JsonCodec<E, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonCodec")
            .field("length_codec", &self.length_codec)
            .finish()
    }
}

impl<E, D: DeserializeOwned> Decoder for JsonCodec<E, D> {
    type Item = D;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let Some(frame) = self.length_codec.decode(src)? else {
            return Ok(None);
        };

        serde_json::from_slice(&frame)
            .map(Some)
            .map_err(|e| Error::remote(format!("Failed to decode frame: {}", e)))
    }
}

impl<E: Serialize, D> Encoder<E> for JsonCodec<E, D> {
    type Error = Error;

    fn encode(&mut self, item: E, dst: &mut BytesMut) -> Result<()> {
        let json = serde_json::to_vec(&item)
            .map_err(|e| Error::remote(format!("Failed to encode frame: {}", e)))?;

        self.length_codec
            .encode(Bytes::from(json), dst)
            .map_err(|e| Error::remote(format!("Failed to frame message: {}", e)))
    }
}

/// Transport that opens one TCP connection per request
#[derive(Debug, Clone)]
pub struct TcpTransport {
    server_addr: String,
}

impl TcpTransport {
    /// Create a transport for a `host:port` address
    pub fn new<S: Into<String>>(server_addr: S) -> Self {
        Self {
            server_addr: server_addr.into(),
        }
    }

    /// The address requests are sent to
    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }
}

#[async_trait]
impl SyncTransport for TcpTransport {
    async fn sync(&mut self, request: FileSyncRequest) -> Result<FileSyncResponse> {
        let stream = TcpStream::connect(&self.server_addr).await.map_err(|e| {
            Error::remote(format!("Failed to connect to '{}': {}", self.server_addr, e))
        })?;
        debug!("Connected to {}", self.server_addr);

        let mut framed = Framed::new(stream, ClientCodec::new());
        framed.send(request).await.map_err(|e| {
            Error::remote(format!(
                "Failed to send request to '{}': {}",
                self.server_addr, e
            ))
        })?;

        match framed.next().await {
            Some(Ok(response)) => Ok(response),
            Some(Err(e)) => Err(Error::remote(format!(
                "Failed to read response from '{}': {}",
                self.server_addr, e
            ))),
            None => Err(Error::remote(format!(
                "'{}' closed the connection without responding",
                self.server_addr
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SyncFile;
    use tidesync_merge::{SyncResponse, Timed};
    use tidesync_types::{ClientId, ErrorKind, ItemId, ServerIdentity, ServerTime};
    use tokio::net::TcpListener;

    fn sample_request() -> FileSyncRequest {
        let mut request = FileSyncRequest::empty();
        request
            .new_items
            .insert(ClientId::new(0), SyncFile::new("a.txt", "alpha"));
        request
            .known_items
            .insert(ItemId::from_u128(1), ServerTime::new(4));
        request
    }

    fn sample_response() -> FileSyncResponse {
        let mut items = SyncResponse::empty();
        items.server_added.insert(
            ItemId::from_u128(2),
            Timed::new(SyncFile::new("b.txt", vec![0u8, 159, 255]), ServerTime::new(5)),
        );
        FileSyncResponse {
            server_identity: ServerIdentity::from_u128(7),
            items,
        }
    }

    #[test]
    fn test_codec_frames_are_self_contained() {
        let mut buffer = BytesMut::new();
        let mut client = ClientCodec::new();
        let mut server = ServerCodec::new();

        client.encode(sample_request(), &mut buffer).unwrap();
        client.encode(FileSyncRequest::empty(), &mut buffer).unwrap();

        assert_eq!(server.decode(&mut buffer).unwrap(), Some(sample_request()));
        assert_eq!(
            server.decode(&mut buffer).unwrap(),
            Some(FileSyncRequest::empty())
        );
        assert_eq!(server.decode(&mut buffer).unwrap(), None);
    }

    #[test]
    fn test_codec_rejects_garbage() {
        let mut buffer = BytesMut::new();
        LengthDelimitedCodec::new()
            .encode(Bytes::from_static(b"not json"), &mut buffer)
            .unwrap();

        let error = ClientCodec::new().decode(&mut buffer).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Remote);
    }

    #[tokio::test]
    async fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, ServerCodec::new());
            let request = framed.next().await.unwrap().unwrap();
            framed.send(sample_response()).await.unwrap();
            request
        });

        let mut transport = TcpTransport::new(addr.to_string());
        let response = transport.sync(sample_request()).await.unwrap();

        assert_eq!(response, sample_response());
        assert_eq!(server.await.unwrap(), sample_request());
    }

    #[tokio::test]
    async fn test_connection_refused_is_remote_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let error = TcpTransport::new(addr.to_string())
            .sync(FileSyncRequest::empty())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Remote);
    }

    #[tokio::test]
    async fn test_silent_hang_up_is_remote_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, ServerCodec::new());
            framed.next().await.unwrap().unwrap();
        });

        let error = TcpTransport::new(addr.to_string())
            .sync(FileSyncRequest::empty())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Remote);
        assert!(error.to_string().contains("without responding"));
    }
}
