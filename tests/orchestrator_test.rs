//! Tests for the session driver loop.

mod common;

use common::{ToyEngine, recording_channel};
use std::time::Duration;
use strictly_quoridor::{
    Command, Message, Move, Orchestrator, Rejection, Seat, Session, SessionEvent, SnapshotStore,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("event timed out")
        .expect("event stream ended")
}

#[tokio::test]
async fn test_submit_and_opponent_reply() {
    let (channel, feed) = recording_channel();
    let session = Session::new(SnapshotStore::new(ToyEngine), true, channel);
    let (command_tx, commands) = mpsc::unbounded_channel();
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let driver = tokio::spawn(Orchestrator::new(session, commands, event_tx).run());

    command_tx.send(Command::Submit(Move::MoveTo(4, 1))).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Accepted {
            candidate: Move::MoveTo(4, 1),
            index: 1
        }
    );

    command_tx.send(Command::Submit(Move::MoveTo(4, 2))).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Rejected {
            candidate: Move::MoveTo(4, 2),
            rejection: Rejection::OutOfTurn
        }
    );

    feed.send(Message::Play(Move::MoveTo(4, 7))).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::OpponentMoved(Move::MoveTo(4, 7))
    );

    command_tx.send(Command::Select(0)).unwrap();
    assert_eq!(next_event(&mut events).await, SessionEvent::Selected(0));

    command_tx.send(Command::Shutdown).unwrap();
    let session = driver.await.unwrap().unwrap();
    assert_eq!(session.timeline().len(), 3);
    assert_eq!(session.channel().sent, vec![Message::Play(Move::MoveTo(4, 1))]);
}

#[tokio::test]
async fn test_delivery_failure_disables_input_until_restart() {
    let (mut channel, _feed) = recording_channel();
    channel.failing = true;
    let session = Session::new(SnapshotStore::new(ToyEngine), true, channel);
    let (command_tx, commands) = mpsc::unbounded_channel();
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let driver = tokio::spawn(Orchestrator::new(session, commands, event_tx).run());

    command_tx.send(Command::Submit(Move::MoveTo(4, 1))).unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::DeliveryFailed(_)
    ));

    command_tx.send(Command::Submit(Move::MoveTo(4, 2))).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::InputDisabled(Move::MoveTo(4, 2))
    );

    // Still failing, so the restart cannot be delivered either.
    command_tx.send(Command::Restart).unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::DeliveryFailed(_)
    ));

    command_tx.send(Command::Shutdown).unwrap();
    let session = driver.await.unwrap().unwrap();
    assert_eq!(session.timeline().len(), 1);
}

#[tokio::test]
async fn test_remote_restart_reenables_input_and_game_over() {
    let (mut channel, feed) = recording_channel();
    channel.failing = true;
    let session = Session::new(SnapshotStore::new(ToyEngine), false, channel);
    let (command_tx, commands) = mpsc::unbounded_channel();
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let driver = tokio::spawn(Orchestrator::new(session, commands, event_tx).run());

    feed.send(Message::Play(Move::MoveTo(4, 1))).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::OpponentMoved(Move::MoveTo(4, 1))
    );
    command_tx.send(Command::Submit(Move::MoveTo(4, 7))).unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::DeliveryFailed(_)
    ));

    feed.send(Message::restart(true)).unwrap();
    assert_eq!(next_event(&mut events).await, SessionEvent::Restarted);

    // A StartAt that hands the win to the first player.
    let mut race = common::first_player_race();
    race.pop();
    feed.send(Message::start_at(race)).unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Resynced { plies: 14 }
    ));
    feed.send(Message::Play(Move::MoveTo(4, 8))).unwrap();
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::OpponentMoved(Move::MoveTo(4, 8))
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::GameOver {
            winner: Seat::First
        }
    );

    drop(command_tx);
    driver.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_channel_close_is_reported_once() {
    let (channel, feed) = recording_channel();
    let session = Session::new(SnapshotStore::new(ToyEngine), true, channel);
    let (command_tx, commands) = mpsc::unbounded_channel();
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let driver = tokio::spawn(Orchestrator::new(session, commands, event_tx).run());

    drop(feed);
    assert_eq!(next_event(&mut events).await, SessionEvent::ChannelClosed);

    command_tx.send(Command::Select(0)).unwrap();
    assert_eq!(next_event(&mut events).await, SessionEvent::Selected(0));
    command_tx.send(Command::Shutdown).unwrap();
    driver.await.unwrap().unwrap();
    assert!(events.recv().await.is_none());
}
