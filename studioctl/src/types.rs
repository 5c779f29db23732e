use rand::{distributions::Uniform, Rng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// Type aliases for IDs, all assigned by the backend and treated as opaque
pub type UserId = String;
pub type ApiKeyId = String;
pub type TransactionId = String;

const TEMP_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Client-side placeholder for a job the backend has not acknowledged yet.
///
/// Renders as `temp_<ms-timestamp>_<9 base36 chars>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TempId(String);

impl TempId {
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let dist = Uniform::from(0..BASE36.len());
        let suffix: String = rand::thread_rng()
            .sample_iter(dist)
            .take(TEMP_SUFFIX_LEN)
            .map(|i| BASE36[i] as char)
            .collect();
        Self(format!("temp_{millis}_{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a job, either a local placeholder or the id the backend assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobId {
    Temporary(TempId),
    Confirmed(String),
}

impl JobId {
    pub fn is_temporary(&self) -> bool {
        matches!(self, JobId::Temporary(_))
    }

    /// The backend id, if one has been assigned.
    pub fn confirmed(&self) -> Option<&str> {
        match self {
            JobId::Confirmed(id) => Some(id),
            JobId::Temporary(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobId::Temporary(temp) => temp.as_str(),
            JobId::Confirmed(id) => id,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<TempId> for JobId {
    fn from(temp: TempId) -> Self {
        JobId::Temporary(temp)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        JobId::Confirmed(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        JobId::Confirmed(id.to_string())
    }
}

impl PartialEq<str> for JobId {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for JobId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// The backend never hands out placeholders, so anything off the wire is confirmed.
impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(JobId::Confirmed)
    }
}
