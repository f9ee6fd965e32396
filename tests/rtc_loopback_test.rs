//! Loopback negotiation between two real peer connections.
//!
//! Needs working host candidates, so it is ignored by default:
//! `cargo test --test rtc_loopback_test -- --ignored`

use std::time::Duration;
use strictly_quoridor::{
    Handshake, HandshakeState, Message, Move, OpponentChannel, RtcNegotiator, SessionConfig,
};
use tokio::time::timeout;

fn config() -> SessionConfig {
    SessionConfig::default()
        .with_ice_servers(Vec::new())
        .with_gathering_timeout_secs(10)
        .with_open_timeout_secs(20)
}

#[tokio::test]
#[ignore]
async fn test_loopback_exchanges_moves() {
    let config = config();
    let (host_rtc, host_signals) = RtcNegotiator::new(&config).await.unwrap();
    let (guest_rtc, guest_signals) = RtcNegotiator::new(&config).await.unwrap();
    let mut host = Handshake::new(host_rtc, host_signals, &config);
    let mut guest = Handshake::new(guest_rtc, guest_signals, &config);

    let offer = host.serve().await.unwrap();
    assert_eq!(host.state(), HandshakeState::AwaitingAnswer);
    let answer = guest.connect(&offer).await.unwrap();
    host.accept_answer(&answer).await.unwrap();
    assert_eq!(host.state(), HandshakeState::Complete);

    let (host_channel, guest_channel) = tokio::join!(host.establish(), guest.establish());
    let mut host_channel = host_channel.unwrap();
    let mut guest_channel = guest_channel.unwrap();

    host_channel
        .send(&Message::Play(Move::MoveTo(4, 1)))
        .await
        .unwrap();
    let received = timeout(Duration::from_secs(10), guest_channel.recv())
        .await
        .unwrap();
    assert_eq!(received, Some(Message::Play(Move::MoveTo(4, 1))));

    guest_channel.send(&Message::restart(false)).await.unwrap();
    let received = timeout(Duration::from_secs(10), host_channel.recv())
        .await
        .unwrap();
    assert_eq!(received, Some(Message::restart(false)));
}
