use crate::error::{LeadError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

// Constants
const SESSION_COOKIE: &str = "session";
const SESSION_DURATION_HOURS: i64 = 24;

/// Role attached to an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

/// Resolved caller of a request
///
/// `role` is carried through for callers; lead import and run status checks
/// only look at `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub role: Role,
}

/// Session data as written by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(flatten)]
    pub identity: Identity,

    /// Time when the session expires
    pub expires_at: DateTime<Utc>,
}

/// Lookup table of active sessions
///
/// Sessions are issued by the external identity provider. The registry only
/// answers "who is this session id", and forgets nothing on its own: expired
/// entries are simply reported as invalid. A registry built with
/// [`SessionRegistry::from_file`] re-reads the provider's file whenever a
/// lookup misses, so sessions issued after startup are picked up.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
    source: Option<PathBuf>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load sessions from the provider's JSON file (`{ "<id>": Session }`)
    ///
    /// A missing file yields an empty registry.
    ///
    /// # Arguments
    /// * `path` - Path to the sessions file
    ///
    /// # Returns
    /// * `Result<SessionRegistry>` - Populated registry, or `Internal` if the file is unreadable
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("sessions file {} not found, starting empty", path.display());
        }
        let sessions = read_sessions_file(path)?;
        log::info!("loaded {} sessions from {}", sessions.len(), path.display());
        Ok(SessionRegistry {
            sessions: RwLock::new(sessions),
            source: Some(path.to_path_buf()),
        })
    }

    /// Merge the current contents of the sessions file into the table
    pub fn reload(&self) -> Result<()> {
        let Some(path) = &self.source else {
            return Ok(());
        };
        let fresh = read_sessions_file(path)?;
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| LeadError::Internal("session table poisoned".into()))?;
        sessions.extend(fresh);
        Ok(())
    }

    /// Register a session under an explicit id
    pub fn insert(&self, session_id: &str, session: Session) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| LeadError::Internal("session table poisoned".into()))?;
        sessions.insert(session_id.to_string(), session);
        Ok(())
    }

    /// Register a fresh session for `identity` and return its id
    pub fn open(&self, identity: Identity) -> Result<String> {
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            identity,
            expires_at: Utc::now() + Duration::hours(SESSION_DURATION_HOURS),
        };
        self.insert(&session_id, session)?;
        Ok(session_id)
    }

    /// Identity for a session if it exists and has not expired
    pub fn validate(&self, session_id: &str) -> Option<Identity> {
        if let Some(identity) = self.lookup(session_id) {
            return Some(identity);
        }
        if self.source.is_none() {
            return None;
        }
        if let Err(e) = self.reload() {
            log::warn!("failed to reload sessions: {e}");
            return None;
        }
        self.lookup(session_id)
    }

    fn lookup(&self, session_id: &str) -> Option<Identity> {
        let sessions = self.sessions.read().ok()?;
        sessions
            .get(session_id)
            .filter(|session| session.expires_at > Utc::now())
            .map(|session| session.identity.clone())
    }
}

// A missing file reads as no sessions
fn read_sessions_file(path: &Path) -> Result<HashMap<String, Session>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

#[cfg(feature = "web")]
pub use middleware::require_auth;

#[cfg(feature = "web")]
mod middleware {
    use super::{SESSION_COOKIE, SessionRegistry};
    use crate::error::LeadError;
    use axum::{
        extract::{Request, State},
        http::header,
        middleware::Next,
        response::Response,
    };
    use axum_extra::extract::cookie::CookieJar;
    use std::sync::Arc;

    /// Authentication middleware
    ///
    /// Resolves the session from the `session` cookie or a bearer token and
    /// stores the [`Identity`](super::Identity) in the request extensions.
    /// Requests without a valid session are rejected with 401.
    pub async fn require_auth(
        State(sessions): State<Arc<SessionRegistry>>,
        jar: CookieJar,
        mut request: Request,
        next: Next,
    ) -> Result<Response, LeadError> {
        let bearer = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string);
        let session_id = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .or(bearer);

        let identity = session_id
            .and_then(|id| sessions.validate(&id))
            .ok_or(LeadError::Unauthorized)?;

        log::debug!(
            "{} {} as {} ({:?})",
            request.method(),
            request.uri().path(),
            identity.user_id,
            identity.role
        );
        request.extensions_mut().insert(identity);
        Ok(next.run(request).await)
    }
}
