//! Message router
//!
//! Flat dispatch over an inbound frame's `type`. Each handler validates
//! its fields, applies registry changes and queues its responses; any
//! validation failure comes back as a `SignalError` and is turned into an
//! error frame for the sender here, at the dispatch boundary.

use serde_json::Value;
use tracing::debug;

use crate::error::SignalError;
use crate::message::{ClientFrame, RequestKind, RoomEvent, ServerMessage};
use crate::server::SignalServer;
use crate::types::{ClientId, RoomId};

impl SignalServer {
    /// Handle one frame from `sender`
    ///
    /// Unrecognized types are ignored without a response.
    pub(crate) fn dispatch(&mut self, sender: &ClientId, frame: ClientFrame) {
        let Some(kind) = frame.kind() else {
            debug!("Ignoring '{}' message from {}", frame.type_name(), sender);
            return;
        };

        let result = match kind {
            RequestKind::Connect => self.handle_connect_request(sender, &frame),
            RequestKind::CreateRoom => self.handle_create_room(sender, &frame),
            RequestKind::JoinRoom => self.handle_join_room(sender, &frame),
            RequestKind::LeaveRoom => self.handle_leave_room(sender, &frame),
            RequestKind::EndRoom => self.handle_end_room(sender, &frame),
            RequestKind::Relay(_) => self.relay(sender, frame),
        };

        if let Err(err) = result {
            debug!("{:?} from {} rejected: {}", kind, sender, err);
            self.reply(sender.as_str(), err.into());
        }
    }

    /// Forward an offer built from `data.sdp` and `data.candidate`
    fn handle_connect_request(
        &self,
        sender: &ClientId,
        frame: &ClientFrame,
    ) -> Result<(), SignalError> {
        let target = frame.target()?;
        if !self.clients.contains(target) {
            return Err(SignalError::ClientNotFound(target.to_string()));
        }

        let data = frame.data()?;
        let sdp = data
            .get("sdp")
            .ok_or(SignalError::MissingFields("'data''sdp' field is missing in the request."))?;
        let candidate = data.get("candidate").ok_or(SignalError::MissingFields(
            "'data''candidate' field is missing in the request.",
        ))?;

        self.reply(
            target,
            ServerMessage::offer(sender, sdp.clone(), candidate.clone()),
        );
        Ok(())
    }

    fn handle_create_room(
        &mut self,
        sender: &ClientId,
        frame: &ClientFrame,
    ) -> Result<(), SignalError> {
        let data = frame.optional_data()?;
        let field = |key: &str| data.and_then(|d| d.get(key)).and_then(Value::as_str);

        let room = self.rooms.create(field("room"), field("name"), sender)?;
        let msg = ServerMessage::room_created(room);
        self.reply(sender.as_str(), msg);
        Ok(())
    }

    fn handle_join_room(
        &mut self,
        sender: &ClientId,
        frame: &ClientFrame,
    ) -> Result<(), SignalError> {
        let room_id = frame.room_id()?;
        self.rooms.add_member(room_id, sender)?;
        self.notify_room(room_id, RoomEvent::ClientAdded);
        Ok(())
    }

    fn handle_leave_room(
        &mut self,
        sender: &ClientId,
        frame: &ClientFrame,
    ) -> Result<(), SignalError> {
        let room_id = frame.room_id()?;
        let remaining = self.rooms.remove_member(room_id, sender.as_str())?;

        if remaining > 0 {
            self.notify_room(room_id, RoomEvent::ClientRemoved);
        }
        self.reply(sender.as_str(), ServerMessage::room_left(&RoomId::from(room_id)));
        Ok(())
    }

    fn handle_end_room(
        &mut self,
        sender: &ClientId,
        frame: &ClientFrame,
    ) -> Result<(), SignalError> {
        let room_id = frame.room_id()?;
        let room = self.rooms.end(room_id, sender.as_str())?;
        self.fan_out(&room, RoomEvent::RoomDeleted);
        Ok(())
    }

    /// Forward `offer`/`answer`/`candidate`/`message` frames verbatim,
    /// minus `to`, plus `from`
    fn relay(&self, sender: &ClientId, frame: ClientFrame) -> Result<(), SignalError> {
        let target = frame.target()?.to_string();
        if !self.clients.contains(&target) {
            return Err(SignalError::ClientNotFound(target));
        }

        self.reply(&target, ServerMessage::Relay(frame.into_relay(sender)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::{mpsc, oneshot};

    use super::*;
    use crate::server::ServerCommand;

    struct Peer {
        id: ClientId,
        rx: mpsc::Receiver<ServerMessage>,
    }

    impl Peer {
        /// Next queued message as JSON, if any
        fn next(&mut self) -> Option<Value> {
            self.rx
                .try_recv()
                .ok()
                .map(|msg| serde_json::to_value(msg).unwrap())
        }

        fn expect(&mut self) -> Value {
            self.next().expect("expected a queued message")
        }

        fn assert_idle(&mut self) {
            assert_eq!(self.next(), None);
        }
    }

    fn server() -> SignalServer {
        let (_tx, rx) = mpsc::channel(1);
        SignalServer::new(rx)
    }

    async fn connect(server: &mut SignalServer) -> Peer {
        let (tx, rx) = mpsc::channel(32);
        let (id_tx, id_rx) = oneshot::channel();
        server.handle_command(ServerCommand::Connect {
            sender: tx,
            respond_to: id_tx,
        });
        let mut peer = Peer {
            id: id_rx.await.unwrap(),
            rx,
        };
        assert_eq!(peer.expect()["event"], "client_details");
        peer
    }

    fn send(server: &mut SignalServer, peer: &Peer, frame: Value) {
        let frame = ClientFrame::parse(&frame.to_string()).unwrap();
        server.handle_command(ServerCommand::Frame {
            client_id: peer.id.clone(),
            frame,
        });
    }

    fn disconnect(server: &mut SignalServer, peer: &Peer) {
        server.handle_command(ServerCommand::Disconnect {
            client_id: peer.id.clone(),
        });
    }

    fn members(msg: &Value) -> Vec<String> {
        serde_json::from_value(msg["data"]["clients"].clone()).unwrap()
    }

    #[tokio::test]
    async fn test_room_lifecycle() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let mut b = connect(&mut server).await;

        send(&mut server, &a, json!({"type": "create_room", "data": {"name": "r1"}}));
        let created = a.expect();
        assert_eq!(created["type"], "info");
        assert_eq!(created["event"], "room_created");
        assert_eq!(created["data"]["name"], "r1");
        assert_eq!(members(&created), vec![a.id.to_string()]);
        let room_id = created["data"]["room"].as_str().unwrap().to_string();
        assert!(!room_id.is_empty());

        send(&mut server, &b, json!({"type": "join_room", "data": {"room": room_id}}));
        let expected = vec![a.id.to_string(), b.id.to_string()];
        for peer in [&mut a, &mut b] {
            let update = peer.expect();
            assert_eq!(update["type"], "update");
            assert_eq!(update["event"], "client_added");
            assert_eq!(update["data"]["room"], room_id.as_str());
            assert_eq!(members(&update), expected);
        }

        send(&mut server, &a, json!({"type": "end_room", "data": {"room": room_id}}));
        assert_eq!(a.expect()["event"], "room_deleted");
        assert_eq!(b.expect()["event"], "room_deleted");
        assert!(server.rooms.get(&room_id).is_none());

        let mut c = connect(&mut server).await;
        send(&mut server, &c, json!({"type": "join_room", "data": {"room": room_id}}));
        let err = c.expect();
        assert_eq!(err["type"], "error");
        assert_eq!(err["event"], "invalid room");
        a.assert_idle();
        b.assert_idle();
    }

    #[tokio::test]
    async fn test_create_with_explicit_id_and_duplicate() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let mut b = connect(&mut server).await;

        send(&mut server, &a, json!({"type": "create_room", "data": {"room": "r1"}}));
        assert_eq!(a.expect()["data"]["room"], "r1");

        send(&mut server, &b, json!({"type": "create_room", "data": {"room": "r1"}}));
        let err = b.expect();
        assert_eq!(err["event"], "duplicate room");
        assert_eq!(err["data"]["message"], "r1 already exist");
        assert_eq!(server.rooms.get("r1").unwrap().creator, a.id);
    }

    #[tokio::test]
    async fn test_create_without_data() {
        let mut server = server();
        let mut a = connect(&mut server).await;

        send(&mut server, &a, json!({"type": "create_room"}));
        assert_eq!(a.expect()["event"], "room_created");

        send(&mut server, &a, json!({"type": "create_room", "data": "r1"}));
        assert_eq!(a.expect()["event"], "missing fields");
        assert_eq!(server.rooms.len(), 1);
    }

    #[tokio::test]
    async fn test_join_twice_rejected() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let mut b = connect(&mut server).await;

        send(&mut server, &a, json!({"type": "create_room", "data": {"room": "r1"}}));
        a.expect();
        send(&mut server, &b, json!({"type": "join_room", "data": {"room": "r1"}}));
        a.expect();
        b.expect();

        send(&mut server, &b, json!({"type": "join_room", "data": {"room": "r1"}}));
        assert_eq!(b.expect()["event"], "already exists");
        a.assert_idle();

        send(&mut server, &a, json!({"type": "join_room", "data": {"room": "r1"}}));
        assert_eq!(a.expect()["event"], "already exists");
        assert_eq!(server.rooms.get("r1").unwrap().member_count(), 2);
    }

    #[tokio::test]
    async fn test_room_field_validation() {
        let mut server = server();
        let mut a = connect(&mut server).await;

        for kind in ["join_room", "leave_room", "end_room"] {
            send(&mut server, &a, json!({"type": kind}));
            let err = a.expect();
            assert_eq!(err["event"], "missing fields");
            assert_eq!(
                err["data"]["message"],
                "'data' field is missing or is not object in the request."
            );

            send(&mut server, &a, json!({"type": kind, "data": {}}));
            let err = a.expect();
            assert_eq!(err["data"]["message"], "'room' field is missing in the request.");

            send(&mut server, &a, json!({"type": kind, "data": {"room": "nope"}}));
            assert_eq!(a.expect()["event"], "invalid room");
        }
    }

    #[tokio::test]
    async fn test_leave_room() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let mut b = connect(&mut server).await;

        send(&mut server, &a, json!({"type": "create_room", "data": {"room": "r1"}}));
        a.expect();
        send(&mut server, &b, json!({"type": "join_room", "data": {"room": "r1"}}));
        a.expect();
        b.expect();

        send(&mut server, &a, json!({"type": "leave_room", "data": {"room": "r1"}}));
        let left = a.expect();
        assert_eq!(left["event"], "room_left");
        assert_eq!(left["data"]["room"], "r1");
        let update = b.expect();
        assert_eq!(update["event"], "client_removed");
        assert_eq!(members(&update), vec![b.id.to_string()]);

        send(&mut server, &a, json!({"type": "leave_room", "data": {"room": "r1"}}));
        assert_eq!(a.expect()["event"], "client not found");

        send(&mut server, &b, json!({"type": "leave_room", "data": {"room": "r1"}}));
        assert_eq!(b.expect()["event"], "room_left");
        assert!(server.rooms.get("r1").is_none());
        a.assert_idle();
    }

    #[tokio::test]
    async fn test_end_room_creator_only() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let mut b = connect(&mut server).await;

        send(&mut server, &a, json!({"type": "create_room", "data": {"room": "r1"}}));
        a.expect();
        send(&mut server, &b, json!({"type": "join_room", "data": {"room": "r1"}}));
        a.expect();
        b.expect();

        send(&mut server, &b, json!({"type": "end_room", "data": {"room": "r1"}}));
        assert_eq!(b.expect()["event"], "unauthorised");
        assert!(server.rooms.get("r1").is_some());

        // Creator no longer a member but still in charge
        send(&mut server, &a, json!({"type": "leave_room", "data": {"room": "r1"}}));
        a.expect();
        b.expect();
        send(&mut server, &a, json!({"type": "end_room", "data": {"room": "r1"}}));
        assert_eq!(b.expect()["event"], "room_deleted");
        a.assert_idle();
        assert!(server.rooms.is_empty());
    }

    #[tokio::test]
    async fn test_connect_request() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let mut b = connect(&mut server).await;

        send(
            &mut server,
            &a,
            json!({"type": "connect", "to": b.id, "data": {"sdp": "v=0", "candidate": {"port": 1}}}),
        );
        let offer = b.expect();
        assert_eq!(offer["type"], "info");
        assert_eq!(offer["event"], "offer");
        assert_eq!(offer["data"]["type"], "offer");
        assert_eq!(offer["data"]["from"], a.id.as_str());
        assert_eq!(offer["data"]["data"]["sdp"], "v=0");
        assert_eq!(offer["data"]["data"]["candidate"]["port"], 1);
        a.assert_idle();
    }

    #[tokio::test]
    async fn test_connect_to_ghost() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let mut b = connect(&mut server).await;

        send(
            &mut server,
            &a,
            json!({"type": "connect", "to": "ghost", "data": {"sdp": "x", "candidate": "y"}}),
        );
        let err = a.expect();
        assert_eq!(err["event"], "client missing");
        assert_eq!(err["data"]["message"], "Client with given ghost not found");
        b.assert_idle();
    }

    #[tokio::test]
    async fn test_connect_missing_fields() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let mut b = connect(&mut server).await;

        let frames = [
            json!({"type": "connect", "data": {"sdp": "x", "candidate": "y"}}),
            json!({"type": "connect", "to": b.id}),
            json!({"type": "connect", "to": b.id, "data": {"candidate": "y"}}),
            json!({"type": "connect", "to": b.id, "data": {"sdp": "x"}}),
        ];
        for frame in frames {
            send(&mut server, &a, frame);
            assert_eq!(a.expect()["event"], "missing fields");
        }
        b.assert_idle();
    }

    #[tokio::test]
    async fn test_relay_fidelity() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let mut b = connect(&mut server).await;

        for kind in ["offer", "answer", "candidate", "message"] {
            let payload = json!({"sdp": "v=0", "nested": {"list": [1, 2, 3]}});
            send(
                &mut server,
                &a,
                json!({"type": kind, "to": b.id, "payload": payload}),
            );
            assert_eq!(
                b.expect(),
                json!({"type": kind, "from": a.id, "payload": payload})
            );
        }
        a.assert_idle();
    }

    #[tokio::test]
    async fn test_relay_errors() {
        let mut server = server();
        let mut a = connect(&mut server).await;

        send(&mut server, &a, json!({"type": "answer", "sdp": "x"}));
        let err = a.expect();
        assert_eq!(err["event"], "missing fields");
        assert_eq!(err["data"]["message"], "'to' field not found");

        send(&mut server, &a, json!({"type": "candidate", "to": "ghost"}));
        assert_eq!(a.expect()["event"], "client missing");
    }

    #[tokio::test]
    async fn test_unknown_type_ignored() {
        let mut server = server();
        let mut a = connect(&mut server).await;

        send(&mut server, &a, json!({"type": "rename_room", "data": {"room": "r1"}}));
        send(&mut server, &a, json!({"to": "someone"}));
        a.assert_idle();
    }

    #[tokio::test]
    async fn test_disconnect_cleans_up_rooms() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let mut b = connect(&mut server).await;

        send(&mut server, &a, json!({"type": "create_room", "data": {"room": "solo"}}));
        a.expect();
        send(&mut server, &b, json!({"type": "create_room", "data": {"room": "shared"}}));
        b.expect();
        send(&mut server, &a, json!({"type": "join_room", "data": {"room": "shared"}}));
        a.expect();
        b.expect();

        disconnect(&mut server, &a);

        let update = b.expect();
        assert_eq!(update["event"], "client_removed");
        assert_eq!(update["data"]["room"], "shared");
        assert_eq!(members(&update), vec![b.id.to_string()]);
        b.assert_idle();

        assert!(server.rooms.get("solo").is_none());
        assert!(server.rooms.get("shared").is_some());
        assert!(!server.clients.contains(a.id.as_str()));

        send(&mut server, &b, json!({"type": "message", "to": a.id, "text": "hi"}));
        assert_eq!(b.expect()["event"], "client missing");
    }

    #[tokio::test]
    async fn test_fan_out_skips_departed_members() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let b = connect(&mut server).await;

        send(&mut server, &a, json!({"type": "create_room", "data": {"room": "r1"}}));
        a.expect();
        send(&mut server, &b, json!({"type": "join_room", "data": {"room": "r1"}}));
        a.expect();

        // Client gone but membership not yet cleaned up
        server.clients.remove(b.id.as_str());
        drop(b);

        send(&mut server, &a, json!({"type": "end_room", "data": {"room": "r1"}}));
        assert_eq!(a.expect()["event"], "room_deleted");
        a.assert_idle();
    }

    #[tokio::test]
    async fn test_full_queue_does_not_block() {
        let mut server = server();
        let mut a = connect(&mut server).await;
        let (tx, _stalled_rx) = mpsc::channel(1);
        let (id_tx, id_rx) = oneshot::channel();
        server.handle_command(ServerCommand::Connect {
            sender: tx,
            respond_to: id_tx,
        });
        let stalled = id_rx.await.unwrap();

        // Queue already holds client_details; these are dropped
        for _ in 0..10 {
            send(&mut server, &a, json!({"type": "message", "to": stalled, "text": "x"}));
        }
        a.assert_idle();
    }
}
