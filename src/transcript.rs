use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who said it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Candidate,
    Interviewer,
}

impl Speaker {
    pub fn as_str(self) -> &'static str {
        match self {
            Speaker::Candidate => "candidate",
            Speaker::Interviewer => "interviewer",
        }
    }
}

/// One exchanged message. Immutable once created; fields are only readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: Uuid,
    content: String,
    sender: Speaker,
    timestamp: DateTime<Local>,
}

impl Message {
    pub fn new(sender: Speaker, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            sender,
            timestamp: Local::now(),
        }
    }

    pub fn interviewer(content: impl Into<String>) -> Self {
        Self::new(Speaker::Interviewer, content)
    }

    pub fn candidate(content: impl Into<String>) -> Self {
        Self::new(Speaker::Candidate, content)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn sender(&self) -> Speaker {
        self.sender
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }
}

/// Append-only ordered log of the conversation.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

/// Read-only, restartable view over a transcript. Clone it to iterate again.
pub type Messages<'a> = std::slice::Iter<'a, Message>;

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn all(&self) -> Messages<'_> {
        self.messages.iter()
    }

    /// The last `n` messages (fewer if the transcript is shorter), oldest first.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
