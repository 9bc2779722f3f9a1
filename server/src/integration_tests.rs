//! Cross-layer tests for the relay: full command sequences through the
//! engine, checking the roster, online set and what each connection receives.

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::Receiver;

    use crate::engine::events::{ChatMessage, ClientCommand, ConnectionId, RelayEvent};
    use crate::engine::relay_engine::RelayEngine;

    // ── Helpers ──────────────────────────────────────────────────

    /// Drain all pending events from a receiver.
    fn drain(rx: &mut Receiver<RelayEvent>) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn join(engine: &RelayEngine, id: ConnectionId, channel: &str, username: &str) {
        engine.handle(
            id,
            ClientCommand::Join {
                channel: channel.into(),
                username: username.into(),
            },
        );
    }

    fn kick(engine: &RelayEngine, id: ConnectionId, channel: &str, target: &str) {
        engine.handle(
            id,
            ClientCommand::Kick {
                channel: channel.into(),
                target: target.into(),
            },
        );
    }

    fn system_texts(events: &[RelayEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                RelayEvent::Message(msg) if msg.is_system() => Some(msg.text()),
                _ => None,
            })
            .collect()
    }

    fn count_owner_events(events: &[RelayEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, RelayEvent::Owner(_)))
            .count()
    }

    fn kicked_events(events: &[RelayEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|e| match e {
                RelayEvent::Kicked(channel) => Some(channel.as_str()),
                _ => None,
            })
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════
    //  1. Walkthrough: create, join, kick, disconnect
    // ═══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_general_channel_walkthrough() {
        let engine = RelayEngine::default();
        let (a, mut rx_a) = engine.connect();
        let (b, mut rx_b) = engine.connect();

        join(&engine, a, "general", "alice");
        assert_eq!(engine.owner("general").as_deref(), Some("alice"));
        assert_eq!(engine.participants("general"), vec!["alice"]);
        drain(&mut rx_a);
        drain(&mut rx_b);

        join(&engine, b, "general", "bob");
        assert_eq!(engine.owner("general").as_deref(), Some("alice"));
        assert_eq!(engine.participants("general"), vec!["alice", "bob"]);

        for events in [drain(&mut rx_a), drain(&mut rx_b)] {
            assert!(events.contains(&RelayEvent::Participants(vec![
                "alice".into(),
                "bob".into()
            ])));
            assert_eq!(system_texts(&events), vec!["bob joined"]);
            assert_eq!(count_owner_events(&events), 0);
        }

        kick(&engine, a, "general", "bob");
        assert_eq!(engine.participants("general"), vec!["alice"]);

        let alice_events = drain(&mut rx_a);
        let bob_events = drain(&mut rx_b);
        assert_eq!(system_texts(&alice_events), vec!["bob was kicked by alice"]);
        assert_eq!(kicked_events(&bob_events), vec!["general"]);
        assert!(kicked_events(&alice_events).is_empty());

        engine.disconnect(b);
        assert_eq!(engine.online_users(), vec!["alice"]);
        assert_eq!(
            drain(&mut rx_a),
            vec![RelayEvent::AllUsers(vec!["alice".into()])]
        );
    }

    // ═══════════════════════════════════════════════════════════════
    //  2. Ownership
    // ═══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_owner_event_fires_once_per_channel() {
        let engine = RelayEngine::default();
        let (a, mut rx_a) = engine.connect();
        let (b, mut rx_b) = engine.connect();
        let (c, mut rx_c) = engine.connect();

        join(&engine, a, "general", "alice");
        join(&engine, b, "general", "bob");
        join(&engine, a, "general", "alice");
        join(&engine, c, "general", "carol");

        let total = count_owner_events(&drain(&mut rx_a))
            + count_owner_events(&drain(&mut rx_b))
            + count_owner_events(&drain(&mut rx_c));
        assert_eq!(total, 1);
        assert_eq!(engine.owner("general").as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_owner_survives_disconnect_and_empty_channel() {
        let engine = RelayEngine::default();
        let (a, _rx_a) = engine.connect();
        let (b, mut rx_b) = engine.connect();

        join(&engine, a, "general", "alice");
        engine.disconnect(a);
        assert!(engine.participants("general").is_empty());
        assert_eq!(engine.channel_count(), 1);

        join(&engine, b, "general", "bob");
        assert_eq!(engine.owner("general").as_deref(), Some("alice"));
        assert_eq!(count_owner_events(&drain(&mut rx_b)), 0);

        // Bob is not the owner, so his kick is dropped.
        kick(&engine, b, "general", "bob");
        assert_eq!(engine.participants("general"), vec!["bob"]);
    }

    #[tokio::test]
    async fn test_reconnecting_owner_name_regains_kick_rights() {
        let engine = RelayEngine::default();
        let (a, _rx_a) = engine.connect();
        let (b, mut rx_b) = engine.connect();

        join(&engine, a, "general", "alice");
        join(&engine, b, "general", "bob");
        engine.disconnect(a);

        let (a2, _rx_a2) = engine.connect();
        join(&engine, a2, "general", "alice");
        drain(&mut rx_b);

        kick(&engine, a2, "general", "bob");
        assert_eq!(engine.participants("general"), vec!["alice"]);
        assert_eq!(kicked_events(&drain(&mut rx_b)), vec!["general"]);
    }

    // ═══════════════════════════════════════════════════════════════
    //  3. Roster uniqueness and multi-channel membership
    // ═══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_repeated_joins_never_duplicate() {
        let engine = RelayEngine::default();
        let (a, _rx_a) = engine.connect();
        let (a2, _rx_a2) = engine.connect();

        for _ in 0..5 {
            join(&engine, a, "general", "alice");
        }
        join(&engine, a2, "general", "alice");

        assert_eq!(engine.participants("general"), vec!["alice"]);
        assert_eq!(engine.online_users(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_second_channel_keeps_first_subscription() {
        let engine = RelayEngine::default();
        let (a, mut rx_a) = engine.connect();
        let (b, _rx_b) = engine.connect();

        join(&engine, a, "general", "alice");
        join(&engine, a, "rust", "alice");
        join(&engine, b, "general", "bob");
        drain(&mut rx_a);

        engine.message(b, "general", "anyone?", "bob");

        match drain(&mut rx_a).as_slice() {
            [RelayEvent::Message(ChatMessage::User { text, .. })] => assert_eq!(text, "anyone?"),
            other => panic!("expected one user message, got {other:?}"),
        }
        assert_eq!(engine.participants("general"), vec!["alice", "bob"]);
        assert_eq!(engine.participants("rust"), vec!["alice"]);
    }

    // ═══════════════════════════════════════════════════════════════
    //  4. Kick authorization
    // ═══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_owner_of_other_channel_cannot_kick() {
        let engine = RelayEngine::default();
        let (a, mut rx_a) = engine.connect();
        let (b, mut rx_b) = engine.connect();

        join(&engine, a, "general", "alice");
        join(&engine, b, "random", "bob");
        join(&engine, b, "general", "bob");
        drain(&mut rx_a);
        drain(&mut rx_b);

        kick(&engine, b, "general", "alice");

        assert_eq!(engine.participants("general"), vec!["alice", "bob"]);
        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_kick_with_shared_username_hits_first_connection() {
        let engine = RelayEngine::default();
        let (owner, _rx_o) = engine.connect();
        let (first, mut rx_first) = engine.connect();
        let (second, mut rx_second) = engine.connect();

        join(&engine, owner, "general", "alice");
        join(&engine, first, "general", "bob");
        join(&engine, second, "general", "bob");
        drain(&mut rx_first);
        drain(&mut rx_second);

        kick(&engine, owner, "general", "bob");

        assert_eq!(kicked_events(&drain(&mut rx_first)), vec!["general"]);
        let second_events = drain(&mut rx_second);
        assert!(kicked_events(&second_events).is_empty());
        assert_eq!(system_texts(&second_events), vec!["bob was kicked by alice"]);
        assert_eq!(engine.current_channel(first), None);
        assert_eq!(engine.current_channel(second).as_deref(), Some("general"));
    }

    // ═══════════════════════════════════════════════════════════════
    //  5. Disconnect cleanup
    // ═══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn test_shared_username_stays_online_until_last_connection() {
        let engine = RelayEngine::default();
        let (b1, _rx1) = engine.connect();
        let (b2, _rx2) = engine.connect();
        let (_watcher, mut rx_w) = engine.connect();

        join(&engine, b1, "general", "bob");
        join(&engine, b2, "random", "bob");
        drain(&mut rx_w);

        engine.disconnect(b1);
        assert_eq!(engine.online_users(), vec!["bob"]);
        assert!(engine.participants("general").is_empty());
        assert_eq!(
            drain(&mut rx_w),
            vec![RelayEvent::AllUsers(vec!["bob".into()])]
        );

        engine.disconnect(b2);
        assert!(engine.online_users().is_empty());
        assert_eq!(drain(&mut rx_w), vec![RelayEvent::AllUsers(vec![])]);
        assert_eq!(engine.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_leave_notice_goes_to_remaining_members() {
        let engine = RelayEngine::default();
        let (a, mut rx_a) = engine.connect();
        let (b, mut rx_b) = engine.connect();

        join(&engine, a, "general", "alice");
        join(&engine, b, "general", "bob");
        drain(&mut rx_a);
        drain(&mut rx_b);

        engine.disconnect(a);

        let events = drain(&mut rx_b);
        assert_eq!(system_texts(&events), vec!["alice left"]);
        assert!(events.contains(&RelayEvent::Participants(vec!["bob".into()])));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_commands_after_disconnect_are_ignored() {
        let engine = RelayEngine::default();
        let (a, _rx_a) = engine.connect();
        engine.disconnect(a);

        join(&engine, a, "general", "alice");
        kick(&engine, a, "general", "alice");

        assert_eq!(engine.channel_count(), 0);
        assert!(engine.online_users().is_empty());
        assert_eq!(engine.connection_count(), 0);
    }
}
