// Zenoh command topics -> Command
//
// One subscriber per command topic, all pushing into a single channel so
// deliveries keep their arrival order. The main loop takes at most one per tick.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use tracing::{debug, info, warn};
use zenoh::Session;
use zenoh::pubsub::Subscriber;

use crate::config::BUS_TOPICS;
use crate::messages::Command;

/// A raw delivery from the bus
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
}

/// Map a topic to its command; None for topics we do not know
pub fn command_for_topic(topic: &str) -> Option<Command> {
    BUS_TOPICS
        .iter()
        .find(|(t, _)| *t == topic)
        .map(|(_, cmd)| *cmd)
}

pub struct BusListener {
    inbox: Receiver<BusMessage>,
    // Dropping a callback subscriber undeclares it
    _subscribers: Vec<Subscriber<()>>,
}

impl BusListener {
    /// Subscribe to every command topic on `session`
    pub async fn subscribe(
        session: &Session,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let (tx, inbox) = mpsc::channel();
        let mut subscribers = Vec::with_capacity(BUS_TOPICS.len());

        for (topic, _) in BUS_TOPICS {
            let tx = tx.clone();
            let subscriber = session
                .declare_subscriber(topic)
                .callback(move |sample| {
                    let message = BusMessage {
                        topic: sample.key_expr().as_str().to_string(),
                        payload: String::from_utf8_lossy(&sample.payload().to_bytes())
                            .into_owned(),
                    };
                    // Receiver gone means the runtime is shutting down
                    let _ = tx.send(message);
                })
                .await?;
            info!("Subscribed to: {}", topic);
            subscribers.push(subscriber);
        }

        Ok(Self {
            inbox,
            _subscribers: subscribers,
        })
    }

    /// Listener fed by hand instead of by zenoh
    pub fn detached() -> (Sender<BusMessage>, Self) {
        let (tx, inbox) = mpsc::channel();
        (
            tx,
            Self {
                inbox,
                _subscribers: Vec::new(),
            },
        )
    }

    /// Take at most one pending delivery. Unrecognized topics are logged and
    /// dropped without producing a command.
    pub fn poll(&mut self) -> Option<Command> {
        let message = match self.inbox.try_recv() {
            Ok(message) => message,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                debug!("Bus inbox disconnected");
                return None;
            }
        };

        debug!("Received on {}: {:?}", message.topic, message.payload);
        match command_for_topic(&message.topic) {
            Some(command) => Some(command),
            None => {
                warn!("Unrecognized command topic: {}", message.topic);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(topic: &str) -> BusMessage {
        BusMessage {
            topic: topic.to_string(),
            payload: "1".to_string(),
        }
    }

    #[test]
    fn test_topic_table() {
        assert_eq!(command_for_topic("adelantepa"), Some(Command::Forward));
        assert_eq!(command_for_topic("atraspa"), Some(Command::Backward));
        assert_eq!(command_for_topic("derechapa"), Some(Command::Right));
        assert_eq!(command_for_topic("izquierdapa"), Some(Command::Left));
        assert_eq!(command_for_topic("altopapi"), Some(Command::Stop));
        assert_eq!(command_for_topic("disdanipapi"), None);
    }

    #[test]
    fn test_poll_one_per_call_in_order() {
        let (tx, mut listener) = BusListener::detached();
        assert_eq!(listener.poll(), None);

        tx.send(message("izquierdapa")).unwrap();
        tx.send(message("altopapi")).unwrap();
        assert_eq!(listener.poll(), Some(Command::Left));
        assert_eq!(listener.poll(), Some(Command::Stop));
        assert_eq!(listener.poll(), None);
    }

    #[test]
    fn test_unrecognized_topic_dropped() {
        let (tx, mut listener) = BusListener::detached();
        tx.send(message("bailapa")).unwrap();
        assert_eq!(listener.poll(), None);
    }

    #[test]
    fn test_payload_ignored() {
        let (tx, mut listener) = BusListener::detached();
        tx.send(BusMessage {
            topic: "atraspa".to_string(),
            payload: "adelante".to_string(),
        })
        .unwrap();
        assert_eq!(listener.poll(), Some(Command::Backward));
    }

    #[test]
    fn test_disconnected_inbox_is_quiet() {
        let (tx, mut listener) = BusListener::detached();
        drop(tx);
        assert_eq!(listener.poll(), None);
    }
}
