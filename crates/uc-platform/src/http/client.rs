use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::trace;
use uc_core::ports::PeerChannelPort;
use uc_core::transfer::{BeginOutcome, FinalizeOutcome};
use uc_core::{
    ChannelError, ClipboardSnapshot, OfferOutcome, PeerRequest, PeerResponse, TransferRecord,
};

use super::dto::{
    BeginResponseDto, ChunkResponseDto, ErrorDto, FinalizeRequestDto, FinalizeResponseDto,
    IdentityDto, OfferResponseDto,
};

/// [`PeerChannelPort`] over the peer's HTTP server.
///
/// Every call is a single attempt bounded by the client timeout.
pub struct HttpPeerChannel {
    client: Client,
    base_url: String,
}

impl HttpPeerChannel {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .context("build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, ChannelError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorDto>(&body)
            .map(|dto| dto.error)
            .unwrap_or(body);
        Err(ChannelError::Protocol(format!("{status}: {detail}")))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ChannelError> {
        self.execute(request)
            .await?
            .json::<T>()
            .await
            .map_err(map_reqwest_error)
    }
}

#[async_trait]
impl PeerChannelPort for HttpPeerChannel {
    async fn send(&self, request: PeerRequest) -> Result<PeerResponse, ChannelError> {
        trace!(endpoint = %request.endpoint(), base_url = %self.base_url, "Sending peer request");

        match request {
            PeerRequest::Handshake { peer_id } => {
                let body = IdentityDto { peer_id };
                let dto: IdentityDto = self
                    .json(self.client.post(self.url("identity")).json(&body))
                    .await?;
                Ok(PeerResponse::Identity {
                    peer_id: dto.peer_id,
                })
            }
            PeerRequest::FetchClipboard => {
                let snapshot: ClipboardSnapshot =
                    self.json(self.client.get(self.url("clipboard"))).await?;
                Ok(PeerResponse::Clipboard(snapshot))
            }
            PeerRequest::PushClipboard(snapshot) => {
                let dto: OfferResponseDto = self
                    .json(self.client.post(self.url("clipboard")).json(&snapshot))
                    .await?;
                let outcome = OfferOutcome::try_from(dto).map_err(ChannelError::Protocol)?;
                Ok(PeerResponse::Offer(outcome))
            }
            PeerRequest::BeginTransfer(announcement) => {
                let dto: BeginResponseDto = self
                    .json(
                        self.client
                            .post(self.url("transfer/begin"))
                            .json(&announcement),
                    )
                    .await?;
                let outcome = BeginOutcome::try_from(dto).map_err(ChannelError::Protocol)?;
                Ok(PeerResponse::Begin(outcome))
            }
            PeerRequest::SendChunk(chunk) => {
                let dto: ChunkResponseDto = self
                    .json(self.client.post(self.url("transfer/chunk")).json(&chunk))
                    .await?;
                Ok(PeerResponse::Chunk(dto.outcome))
            }
            PeerRequest::FinalizeTransfer { fingerprint } => {
                let body = FinalizeRequestDto { fingerprint };
                let dto: FinalizeResponseDto = self
                    .json(self.client.post(self.url("transfer/finalize")).json(&body))
                    .await?;
                let outcome = FinalizeOutcome::try_from(dto).map_err(ChannelError::Protocol)?;
                Ok(PeerResponse::Finalize(outcome))
            }
            PeerRequest::TransferStatus { fingerprint } => {
                let path = format!("transfer/{fingerprint}/status");
                let record: TransferRecord = self.json(self.client.get(self.url(&path))).await?;
                Ok(PeerResponse::Status(record))
            }
            PeerRequest::FetchTransfer { fingerprint } => {
                let path = format!("transfer/{fingerprint}");
                let content = self
                    .execute(self.client.get(self.url(&path)))
                    .await?
                    .bytes()
                    .await
                    .map_err(map_reqwest_error)?;
                Ok(PeerResponse::Content(content))
            }
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ChannelError {
    if err.is_timeout() {
        ChannelError::Timeout
    } else if err.is_connect() {
        ChannelError::ConnectionRefused(err.to_string())
    } else {
        ChannelError::Protocol(err.to_string())
    }
}
