//! MQTT remote hooks
//!
//! Connects to a broker, subscribes to one topic and turns each message into
//! a `Hook` for the frame loop. Payloads are JSON (`{"type": "mood",
//! "state": "happy"}`); anything that is not a known JSON command is shown as
//! a thought bubble.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::visualizer::Hook;

pub const DEFAULT_PORT: u16 = 1883;
pub const DEFAULT_TOPIC: &str = "metablob";

/// Turn a raw payload into a hook. Empty payloads are dropped.
pub fn parse_payload(payload: &[u8]) -> Option<Hook> {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    // Try to parse as JSON, fall back to plain text
    match serde_json::from_str::<Hook>(text) {
        Ok(hook) => Some(hook),
        Err(e) => {
            debug!(error = %e, "payload is not a command, showing as text");
            Some(Hook::Thought {
                text: text.to_string(),
                priority: 0,
            })
        }
    }
}

/// Receives hooks on a background thread
pub struct RemoteControl {
    receiver: Receiver<Hook>,
    _thread: thread::JoinHandle<()>,
}

impl RemoteControl {
    /// Connect to the broker and subscribe.
    /// Fails immediately if the connection cannot be established.
    pub fn connect(host: &str, port: u16, topic: &str) -> Result<Self> {
        let topic = if topic.is_empty() { DEFAULT_TOPIC } else { topic };

        let mut options = MqttOptions::new("metablob", host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut connection) = Client::new(options, 10);

        client
            .subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| Error::Remote(format!("subscribe to '{}' failed: {}", topic, e)))?;

        // Fail fast if the broker is unreachable
        match connection.iter().next() {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                return Err(Error::Remote(format!(
                    "cannot reach broker at {}:{}: {}",
                    host, port, e
                )));
            }
            None => {
                return Err(Error::Remote(format!(
                    "cannot reach broker at {}:{}: connection closed",
                    host, port
                )));
            }
        }

        let (sender, receiver) = mpsc::channel();
        let topic_owned = topic.to_string();
        let handle = thread::spawn(move || {
            Self::message_loop(connection, sender, &topic_owned);
        });

        info!(host, port, topic, "remote control connected");

        Ok(Self {
            receiver,
            _thread: handle,
        })
    }

    fn message_loop(mut connection: rumqttc::Connection, sender: Sender<Hook>, topic: &str) {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic != topic {
                        continue;
                    }
                    if let Some(hook) = parse_payload(&publish.payload) {
                        if sender.send(hook).is_err() {
                            // Frame loop gone
                            break;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    // rumqttc reconnects on the next iteration
                    warn!(error = %e, "mqtt connection error");
                    thread::sleep(Duration::from_secs(1));
                }
            }
        }
    }

    /// Drain every hook received since the last poll (non-blocking), oldest
    /// first.
    pub fn poll(&self) -> Vec<Hook> {
        self.receiver.try_iter().collect()
    }
}
