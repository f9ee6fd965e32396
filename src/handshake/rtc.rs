//! WebRTC negotiator and data link.

use super::{CandidateSignal, Description, Negotiator, Signals};
use crate::config::SessionConfig;
use crate::error::{ChannelError, HandshakeError, HandshakeErrorKind};
use crate::opponent::{DataLink, LinkHandle, LinkState};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{debug, info, instrument, warn};
use webrtc::api::APIBuilder;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

type ChannelSlot = Arc<RwLock<Option<Arc<RTCDataChannel>>>>;

/// Shared state the connection callbacks write into.
#[derive(Clone)]
struct Wiring {
    slot: ChannelSlot,
    state: Arc<watch::Sender<LinkState>>,
    inbound: mpsc::UnboundedSender<String>,
}

impl Wiring {
    fn close(&self) {
        self.state.send_replace(LinkState::Closed);
    }

    /// Hooks a data channel's events up to the link state and inbound queue.
    async fn attach(&self, channel: Arc<RTCDataChannel>) {
        info!(label = %channel.label(), "Data channel attached");

        let state = self.state.clone();
        channel.on_open(Box::new(move || {
            Box::pin(async move {
                info!("Data channel opened");
                state.send_if_modified(|current| {
                    if *current == LinkState::Connecting {
                        *current = LinkState::Open;
                        true
                    } else {
                        false
                    }
                });
            })
        }));

        let wiring = self.clone();
        channel.on_close(Box::new(move || {
            let wiring = wiring.clone();
            Box::pin(async move {
                info!("Data channel closed");
                wiring.close();
            })
        }));

        let inbound = self.inbound.clone();
        channel.on_message(Box::new(move |msg: DataChannelMessage| {
            let inbound = inbound.clone();
            Box::pin(async move {
                match String::from_utf8(msg.data.to_vec()) {
                    Ok(text) => {
                        let _ = inbound.send(text);
                    }
                    Err(e) => warn!(error = %e, "Dropping non-text frame"),
                }
            })
        }));

        *self.slot.write().await = Some(channel);
    }
}

/// [`Negotiator`] over a `webrtc` peer connection.
pub struct RtcNegotiator {
    connection: Arc<RTCPeerConnection>,
    wiring: Wiring,
}

impl RtcNegotiator {
    /// Creates a peer connection configured with the session's ICE servers.
    #[instrument(skip(config), fields(ice_servers = config.ice_servers().len()))]
    pub async fn new(config: &SessionConfig) -> Result<(Self, Signals), HandshakeError> {
        let api = APIBuilder::new().build();
        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers()
                .iter()
                .map(|url| RTCIceServer {
                    urls: vec![url.clone()],
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let (candidate_tx, candidates) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(LinkState::Connecting);
        let wiring = Wiring {
            slot: Arc::new(RwLock::new(None)),
            state: Arc::new(state_tx),
            inbound: inbound_tx,
        };

        connection.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let candidate_tx = candidate_tx.clone();
            Box::pin(async move {
                let signal = match candidate {
                    Some(candidate) => match candidate.to_json() {
                        Ok(init) => CandidateSignal::Candidate(init.candidate),
                        Err(e) => {
                            warn!(error = %e, "Unserializable candidate");
                            return;
                        }
                    },
                    None => CandidateSignal::Gathered,
                };
                let _ = candidate_tx.send(signal);
            })
        }));

        let on_state = wiring.clone();
        connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let wiring = on_state.clone();
                Box::pin(async move {
                    info!(%state, "Peer connection state changed");
                    if matches!(
                        state,
                        RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed
                    ) {
                        wiring.close();
                    }
                })
            },
        ));

        let on_remote = wiring.clone();
        connection.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
            let wiring = on_remote.clone();
            Box::pin(async move {
                wiring.attach(channel).await;
            })
        }));

        let link = RtcLink {
            slot: wiring.slot.clone(),
            connection: connection.clone(),
        };
        let signals = Signals {
            candidates,
            link: LinkHandle {
                link: Arc::new(link),
                state,
                inbound,
            },
        };
        debug!("Peer connection created");
        Ok((Self { connection, wiring }, signals))
    }
}

fn parse(description: &Description) -> Result<RTCSessionDescription, HandshakeError> {
    serde_json::from_str(description.as_str()).map_err(|e| {
        HandshakeError::new(
            HandshakeErrorKind::MalformedDescription,
            format!("not a session description: {}", e),
        )
    })
}

fn render(description: &RTCSessionDescription) -> Result<Description, HandshakeError> {
    serde_json::to_string(description)
        .map(Description::new)
        .map_err(|e| {
            HandshakeError::new(
                HandshakeErrorKind::MalformedDescription,
                format!("could not serialize description: {}", e),
            )
        })
}

#[async_trait]
impl Negotiator for RtcNegotiator {
    async fn open_data_channel(&self, label: &str) -> Result<(), HandshakeError> {
        let channel = self.connection.create_data_channel(label, None).await?;
        self.wiring.attach(channel).await;
        Ok(())
    }

    async fn create_offer(&self) -> Result<Description, HandshakeError> {
        render(&self.connection.create_offer(None).await?)
    }

    async fn create_answer(&self) -> Result<Description, HandshakeError> {
        render(&self.connection.create_answer(None).await?)
    }

    async fn set_local_description(&self, description: &Description) -> Result<(), HandshakeError> {
        self.connection
            .set_local_description(parse(description)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: &Description,
    ) -> Result<(), HandshakeError> {
        self.connection
            .set_remote_description(parse(description)?)
            .await?;
        Ok(())
    }

    async fn local_description(&self) -> Option<Description> {
        let description = self.connection.local_description().await?;
        render(&description).ok()
    }

    async fn close(&self) -> Result<(), HandshakeError> {
        self.wiring.close();
        self.connection.close().await?;
        Ok(())
    }
}

/// Sending half of a WebRTC data channel.
///
/// Holds the peer connection so it lives as long as the channel does.
pub struct RtcLink {
    slot: ChannelSlot,
    connection: Arc<RTCPeerConnection>,
}

impl RtcLink {
    /// Connection state of the underlying peer connection.
    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.connection.connection_state()
    }
}

#[async_trait]
impl DataLink for RtcLink {
    async fn send_text(&self, text: String) -> Result<(), ChannelError> {
        let channel = self
            .slot
            .read()
            .await
            .clone()
            .ok_or_else(|| ChannelError::not_open("No data channel attached"))?;
        channel
            .send_text(text)
            .await
            .map_err(|e| ChannelError::not_open(format!("Data channel send failed: {}", e)))?;
        Ok(())
    }
}
