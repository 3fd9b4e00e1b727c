//! User-facing call status: one line of text plus which intents are available.

use crate::logger::log;
use crate::session::CallId;
use tokio::sync::watch;

/// Which user intents make sense right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordances {
    pub acquire_media: bool,
    pub start_call: bool,
    pub join_call: bool,
    pub hang_up: bool,
    pub call_id_editable: bool,
}

impl Affordances {
    /// Nothing acquired, no call.
    pub fn initial() -> Self {
        Self {
            acquire_media: true,
            start_call: false,
            join_call: false,
            hang_up: false,
            call_id_editable: true,
        }
    }

    fn media_ready() -> Self {
        Self {
            acquire_media: false,
            start_call: true,
            join_call: true,
            hang_up: false,
            call_id_editable: true,
        }
    }

    fn in_call() -> Self {
        Self {
            acquire_media: false,
            start_call: false,
            join_call: false,
            hang_up: true,
            call_id_editable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallStatus {
    pub text: String,
    /// Id to show or share; set once a call starts.
    pub call_id: Option<String>,
    pub affordances: Affordances,
}

impl Default for CallStatus {
    fn default() -> Self {
        Self {
            text: "Ready".to_owned(),
            call_id: None,
            affordances: Affordances::initial(),
        }
    }
}

/// Publishes [`CallStatus`] to any number of watchers.
pub struct StatusBoard {
    tx: watch::Sender<CallStatus>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(CallStatus::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<CallStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> CallStatus {
        self.tx.borrow().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        let text = text.into();
        log(&format!("Status: {text}"));
        self.tx.send_modify(|status| status.text = text);
    }

    pub fn media_ready(&self) {
        log("Status: Webcam started");
        self.tx.send_modify(|status| {
            status.text = "Webcam started".to_owned();
            status.affordances = Affordances::media_ready();
        });
    }

    /// Media could not be acquired: start and join go away, acquiring can be
    /// retried. A running call keeps its hang-up.
    pub fn media_failed(&self, text: impl Into<String>) {
        let text = text.into();
        log(&format!("Status: {text}"));
        self.tx.send_modify(|status| {
            status.text = text;
            status.affordances.acquire_media = true;
            status.affordances.start_call = false;
            status.affordances.join_call = false;
        });
    }

    pub fn call_started(&self, id: &CallId, text: impl Into<String>) {
        let text = text.into();
        log(&format!("Status: {text}"));
        self.tx.send_modify(|status| {
            status.text = text;
            status.call_id = Some(id.as_str().to_owned());
            status.affordances = Affordances::in_call();
        });
    }

    /// Back to the pre-call affordances; start and join need media again.
    pub fn reset(&self, text: impl Into<String>) {
        let text = text.into();
        log(&format!("Status: {text}"));
        self.tx.send_modify(|status| {
            status.text = text;
            status.call_id = None;
            status.affordances = Affordances::initial();
        });
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
