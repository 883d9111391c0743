use thiserror::Error;
use uuid::Uuid;

/// Random identifier of an event
pub type EventId = Uuid;

/// Random identifier of a project
pub type ProjectId = Uuid;

#[derive(Debug, Error)]
pub enum IdParseError {
    #[error("invalid uuid: {0}")]
    InvalidUuid(#[from] uuid::Error),
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Generate a random event ID
pub fn generate_event_id() -> EventId {
    Uuid::new_v4()
}

/// Generate a random project ID
pub fn generate_project_id() -> ProjectId {
    Uuid::new_v4()
}

/// Storage key for an ID (the raw 16 bytes)
pub fn id_key(id: &Uuid) -> [u8; 16] {
    *id.as_bytes()
}

/// Rebuild an ID from a storage key
pub fn id_from_key(key: &[u8]) -> Result<Uuid, IdParseError> {
    let bytes: [u8; 16] = key.try_into().map_err(|_| IdParseError::InvalidLength {
        expected: 16,
        actual: key.len(),
    })?;
    Ok(Uuid::from_bytes(bytes))
}

/// Parse an event ID from its hyphenated or simple form
pub fn parse_event_id(s: &str) -> Result<EventId, IdParseError> {
    Ok(Uuid::parse_str(s.trim())?)
}

/// Parse a project ID from its hyphenated or simple form
pub fn parse_project_id(s: &str) -> Result<ProjectId, IdParseError> {
    Ok(Uuid::parse_str(s.trim())?)
}

/// First eight characters of an ID, for messages
pub fn id_short(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
