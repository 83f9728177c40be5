use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Author of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Model,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::System => "system",
        }
    }

    /// Role name on the provider wire. System entries never leave the client.
    pub fn to_api_role(self) -> Option<&'static str> {
        match self {
            Role::User => Some("user"),
            Role::Model => Some("model"),
            Role::System => None,
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "model" => Ok(Role::Model),
            "system" => Ok(Role::System),
            _ => Err(format!("invalid transcript role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

/// What an entry was created for. Set once, never inferred from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[default]
    Chat,
    /// A news item clipped into the transcript; offers an "analyze" action.
    PressClipping,
}

/// Binary image attached to or produced for an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub mime_type: String,
    #[serde(serialize_with = "serialize_base64", deserialize_with = "deserialize_base64")]
    pub data: Vec<u8>,
}

impl ImagePayload {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    /// File extension matching the mime type, for saving generated images.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

fn serialize_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
}

fn deserialize_base64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let encoded = String::deserialize(deserializer)?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

/// A cited source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationKind {
    Web,
    Map,
}

/// Citation as delivered inside a stream chunk, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingCitation {
    pub kind: CitationKind,
    pub citation: Citation,
}

impl GroundingCitation {
    pub fn web(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: CitationKind::Web,
            citation: Citation {
                uri: uri.into(),
                title: title.into(),
            },
        }
    }

    pub fn map(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: CitationKind::Map,
            citation: Citation {
                uri: uri.into(),
                title: title.into(),
            },
        }
    }
}

/// Grounding accumulated over a streamed answer.
///
/// Both lists are append-only and keep duplicates: a source cited in two
/// chunks appears twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingInfo {
    #[serde(default)]
    pub web_sources: Vec<Citation>,
    #[serde(default)]
    pub map_sources: Vec<Citation>,
}

impl GroundingInfo {
    pub fn is_empty(&self) -> bool {
        self.web_sources.is_empty() && self.map_sources.is_empty()
    }

    pub fn extend(&mut self, citations: impl IntoIterator<Item = GroundingCitation>) {
        for GroundingCitation { kind, citation } in citations {
            match kind {
                CitationKind::Web => self.web_sources.push(citation),
                CitationKind::Map => self.map_sources.push(citation),
            }
        }
    }
}

/// One incremental piece of a streamed model answer, already normalized by
/// the provider adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub citations: Vec<GroundingCitation>,
}

impl Chunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            citations: Vec::new(),
        }
    }

    pub fn with_citation(mut self, citation: GroundingCitation) -> Self {
        self.citations.push(citation);
        self
    }
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub images: Vec<ImagePayload>,
    #[serde(default, skip_serializing_if = "GroundingInfo::is_empty")]
    pub grounding: GroundingInfo,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub kind: EntryKind,
    pub created_at: i64,
}

impl TranscriptEntry {
    pub fn new(id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role,
            text: text.into(),
            images: Vec::new(),
            grounding: GroundingInfo::default(),
            is_streaming: false,
            hidden: false,
            kind: EntryKind::Chat,
            created_at: now_millis(),
        }
    }

    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, Role::User, text)
    }

    pub fn model(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, Role::Model, text)
    }

    /// Empty model entry that is still receiving chunks.
    pub fn streaming(id: impl Into<String>) -> Self {
        Self {
            is_streaming: true,
            ..Self::model(id, "")
        }
    }

    pub fn with_images(mut self, images: Vec<ImagePayload>) -> Self {
        self.images = images;
        self
    }

    pub fn with_kind(mut self, kind: EntryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_press_clipping(&self) -> bool {
        self.kind == EntryKind::PressClipping
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
