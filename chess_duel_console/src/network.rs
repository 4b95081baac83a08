// Improvement potential. Switch from JSON to a binary format once there is a native client.

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Serialize, de};
use tungstenite::Message;


pub const PORT: u16 = 3000;


#[derive(Debug)]
pub enum CommunicationError {
    Socket(tungstenite::Error),
    Serde(serde_json::Error),
    ConnectionClosed,
    UnexpectedMessage(Message),
}

impl CommunicationError {
    // Whether the connection can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            CommunicationError::Serde(_) | CommunicationError::UnexpectedMessage(_) => true,
            CommunicationError::Socket(_) | CommunicationError::ConnectionClosed => false,
        }
    }
}

pub fn serialize_obj(obj: &impl Serialize) -> Result<String, CommunicationError> {
    serde_json::to_string(obj).map_err(CommunicationError::Serde)
}

pub fn parse_obj<T: de::DeserializeOwned>(s: &str) -> Result<T, CommunicationError> {
    serde_json::from_str(s).map_err(CommunicationError::Serde)
}

// Control frames are answered by tungstenite itself and skipped here.
pub async fn read_obj_async<T, S>(stream: &mut S) -> Result<T, CommunicationError>
where
    T: de::DeserializeOwned,
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let msg = match stream.next().await {
            None => return Err(CommunicationError::ConnectionClosed),
            Some(Err(tungstenite::Error::ConnectionClosed)) => {
                return Err(CommunicationError::ConnectionClosed);
            }
            Some(Err(err)) => return Err(CommunicationError::Socket(err)),
            Some(Ok(msg)) => msg,
        };
        match msg {
            Message::Text(text) => return parse_obj(text.as_str()),
            Message::Close(_) => return Err(CommunicationError::ConnectionClosed),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            Message::Binary(_) => return Err(CommunicationError::UnexpectedMessage(msg)),
        }
    }
}

pub async fn write_obj_async<T, S>(sink: &mut S, obj: &T) -> Result<(), CommunicationError>
where
    T: Serialize,
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let serialized = serialize_obj(obj)?;
    sink.send(Message::text(serialized)).await.map_err(CommunicationError::Socket)
}
