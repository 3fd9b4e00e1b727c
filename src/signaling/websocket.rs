use crate::error::SignalingError;
use crate::logger::{log, warn};
use crate::signaling::channel::{ChannelEvent, ChannelEventSink, Dialer, Link};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Dials the relay over WebSocket.
#[derive(Debug, Default, Clone)]
pub struct WsDialer;

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self, endpoint: &Url, events: ChannelEventSink) -> Result<Link, SignalingError> {
        let (stream, _) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| SignalingError::WebSocket(e.to_string()))?;
        let (mut sink, mut source) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        // Writer ends once every sender is gone and the queue is empty.
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = sink.send(Message::text(text)).await {
                    warn(&format!("WebSocket send failed: {e}"));
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = source.next().await {
                match frame {
                    Ok(Message::Text(text)) => events(ChannelEvent::Message(text.as_str().to_owned())),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => events(ChannelEvent::Message(text)),
                        Err(_) => warn("Ignoring non-UTF-8 binary frame"),
                    },
                    Ok(Message::Close(frame)) => {
                        log(&format!("WebSocket closed by server: {frame:?}"));
                        events(ChannelEvent::Closed);
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        events(ChannelEvent::Error(e.to_string()));
                        return;
                    }
                }
            }
            events(ChannelEvent::Closed);
        });

        Ok(Link::new(tx, Some(reader)))
    }
}
