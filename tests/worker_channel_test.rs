//! Tests for the compute-agent worker channel.

mod common;

use common::{ToyEngine, first_player_race};
use std::sync::Arc;
use std::time::Duration;
use strictly_quoridor::{
    AgentFactory, AgentMode, ChannelKind, ComputeAgent, Message, Move, OpponentChannel,
    ScriptedAgent, Seat, Session, SnapshotStore, Submission, WorkerChannel,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Every fresh agent plays `script` and reports what it hears on `heard`.
fn factory(script: Vec<Move>, heard: mpsc::UnboundedSender<Move>) -> AgentFactory {
    Arc::new(move || {
        Box::new(ScriptedAgent::new(script.clone()).observed_by(heard.clone()))
            as Box<dyn ComputeAgent>
    })
}

async fn next_reply(channel: &mut WorkerChannel) -> Option<Message> {
    timeout(WAIT, channel.recv()).await.expect("worker reply timed out")
}

#[tokio::test]
async fn test_second_seat_agent_answers_moves() {
    let (heard_tx, mut heard) = mpsc::unbounded_channel();
    let mut channel = WorkerChannel::new(
        factory(vec![Move::MoveTo(4, 7)], heard_tx),
        Seat::Second,
        AgentMode::Greedy,
    );
    assert_eq!(channel.kind(), ChannelKind::Worker);

    channel.send(&Message::Play(Move::MoveTo(4, 1))).await.unwrap();
    assert_eq!(
        next_reply(&mut channel).await,
        Some(Message::Play(Move::MoveTo(4, 7)))
    );
    assert_eq!(heard.recv().await, Some(Move::MoveTo(4, 1)));
}

#[tokio::test]
async fn test_first_seat_agent_opens() {
    let (heard_tx, _heard) = mpsc::unbounded_channel();
    let mut channel = WorkerChannel::new(
        factory(vec![Move::MoveTo(4, 1)], heard_tx),
        Seat::First,
        AgentMode::default(),
    );
    assert_eq!(
        next_reply(&mut channel).await,
        Some(Message::Play(Move::MoveTo(4, 1)))
    );
}

#[tokio::test]
async fn test_restart_reassigns_seat_and_respawns() {
    let (heard_tx, _heard) = mpsc::unbounded_channel();
    let mut channel = WorkerChannel::new(
        factory(vec![Move::MoveTo(4, 1)], heard_tx),
        Seat::Second,
        AgentMode::Greedy,
    );

    channel.send(&Message::restart(false)).await.unwrap();
    assert_eq!(channel.agent_seat(), Seat::First);
    assert_eq!(channel.generation(), 1);
    assert_eq!(
        next_reply(&mut channel).await,
        Some(Message::Play(Move::MoveTo(4, 1)))
    );

    channel.send(&Message::restart(true)).await.unwrap();
    assert_eq!(channel.agent_seat(), Seat::Second);
    assert_eq!(channel.generation(), 2);
}

#[tokio::test]
async fn test_start_at_replays_into_fresh_agent() {
    let (heard_tx, mut heard) = mpsc::unbounded_channel();
    let mut channel = WorkerChannel::new(
        factory(vec![Move::MoveTo(3, 8)], heard_tx),
        Seat::Second,
        AgentMode::Greedy,
    );

    let replay = vec![Move::MoveTo(4, 1)];
    channel.send(&Message::start_at(replay)).await.unwrap();
    assert_eq!(heard.recv().await, Some(Move::MoveTo(4, 1)));
    // One ply replayed leaves the second seat to move, so the agent opens.
    assert_eq!(
        next_reply(&mut channel).await,
        Some(Message::Play(Move::MoveTo(3, 8)))
    );
}

#[tokio::test]
async fn test_start_at_waits_when_agent_not_to_move() {
    let (heard_tx, mut heard) = mpsc::unbounded_channel();
    let mut channel = WorkerChannel::new(
        factory(vec![Move::MoveTo(3, 8)], heard_tx),
        Seat::Second,
        AgentMode::Greedy,
    );

    let race = first_player_race();
    channel.send(&Message::start_at(race[..2].to_vec())).await.unwrap();
    assert_eq!(heard.recv().await, Some(race[0]));
    assert_eq!(heard.recv().await, Some(race[1]));
    assert!(
        timeout(Duration::from_millis(200), channel.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_mode_survives_respawn() {
    let (heard_tx, _heard) = mpsc::unbounded_channel();
    let mut channel = WorkerChannel::new(
        factory(Vec::new(), heard_tx),
        Seat::Second,
        AgentMode::Greedy,
    );
    channel.set_mode(AgentMode::SearchBudget(50)).unwrap();
    channel.send(&Message::restart(true)).await.unwrap();
    assert_eq!(channel.mode(), AgentMode::SearchBudget(50));
}

#[tokio::test]
async fn test_exhausted_agent_closes_channel() {
    let (heard_tx, _heard) = mpsc::unbounded_channel();
    let mut channel = WorkerChannel::new(
        factory(Vec::new(), heard_tx),
        Seat::Second,
        AgentMode::Greedy,
    );
    channel.send(&Message::Play(Move::MoveTo(4, 1))).await.unwrap();
    assert_eq!(next_reply(&mut channel).await, None);

    let err = channel
        .send(&Message::Play(Move::MoveTo(4, 2)))
        .await
        .unwrap_err();
    assert_eq!(err.kind, strictly_quoridor::ChannelErrorKind::WorkerGone);
}

#[tokio::test]
async fn test_session_against_scripted_agent() {
    let race = first_player_race();
    let agent_moves: Vec<Move> = race.iter().skip(1).step_by(2).copied().collect();
    let (heard_tx, _heard) = mpsc::unbounded_channel();
    let channel = WorkerChannel::new(factory(agent_moves, heard_tx), Seat::Second, AgentMode::Greedy);
    let mut session = Session::new(SnapshotStore::new(ToyEngine), true, channel);

    for candidate in race.iter().step_by(2) {
        let outcome = session.submit(*candidate).await.unwrap();
        assert!(matches!(outcome, Submission::Accepted { .. }));
        if session.turn().result().is_some() {
            break;
        }
        let reply = timeout(WAIT, session.next_incoming())
            .await
            .expect("agent reply timed out")
            .unwrap()
            .unwrap();
        assert!(matches!(reply, strictly_quoridor::Incoming::Moved { .. }));
    }
    assert_eq!(session.turn().result(), Some(Seat::First));
    assert_eq!(session.timeline().len(), race.len() + 1);
}
