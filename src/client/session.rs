//! Signed-in state kept between runs: at most one session plus the theme.
//!
//! Everything lives in one JSON file. Writers hold the lock across the file
//! write, so a reader never sees the file and memory disagree.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tokio::sync::watch;
use tracing::debug;

use crate::client::{ClientError, ClientResult};
use crate::model::{role::Role, user::UserProfile};
use crate::models::LoginResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Who is signed in. The role is fixed when the session is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Session {
    Teacher(Profile),
    Student(Profile),
    Parent {
        profile: Profile,
        #[serde(rename = "studentId")]
        student_id: u64,
    },
}

impl Session {
    pub fn from_login(login: LoginResponse) -> ClientResult<Self> {
        let LoginResponse {
            access_token,
            refresh_token,
            user,
        } = login;
        let UserProfile {
            id,
            name,
            email,
            role,
            student_id,
        } = user;
        let profile = Profile {
            id,
            name,
            email,
            access_token,
            refresh_token,
        };

        Ok(match role {
            Role::Teacher => Session::Teacher(profile),
            Role::Student => Session::Student(profile),
            Role::Parent => Session::Parent {
                profile,
                student_id: student_id.ok_or_else(|| {
                    ClientError::Decode("parent login without a linked student".into())
                })?,
            },
        })
    }

    pub fn role(&self) -> Role {
        match self {
            Session::Teacher(_) => Role::Teacher,
            Session::Student(_) => Role::Student,
            Session::Parent { .. } => Role::Parent,
        }
    }

    pub fn profile(&self) -> &Profile {
        match self {
            Session::Teacher(p) | Session::Student(p) => p,
            Session::Parent { profile, .. } => profile,
        }
    }

    fn profile_mut(&mut self) -> &mut Profile {
        match self {
            Session::Teacher(p) | Session::Student(p) => p,
            Session::Parent { profile, .. } => profile,
        }
    }

    /// The student whose records this session reads, if any.
    pub fn student_id(&self) -> Option<u64> {
        match self {
            Session::Teacher(_) => None,
            Session::Student(p) => Some(p.id),
            Session::Parent { student_id, .. } => Some(*student_id),
        }
    }
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredState {
    #[serde(default)]
    session: Option<Session>,
    #[serde(default)]
    theme: Theme,
}

pub struct SessionStore {
    /// `None` keeps state in memory only.
    path: Option<PathBuf>,
    state: RwLock<StoredState>,
    theme: watch::Sender<Theme>,
}

impl SessionStore {
    /// Loads `path` if it exists; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> ClientResult<Self> {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| state_error(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredState::default(),
            Err(e) => return Err(state_error(&path, e)),
        };
        debug!(path = %path.display(), signed_in = state.session.is_some(), "Session state loaded");
        Ok(Self::with_state(Some(path), state))
    }

    pub fn in_memory() -> Self {
        Self::with_state(None, StoredState::default())
    }

    fn with_state(path: Option<PathBuf>, state: StoredState) -> Self {
        let (theme, _) = watch::channel(state.theme);
        Self {
            path,
            state: RwLock::new(state),
            theme,
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.state.read().session.clone()
    }

    pub fn role(&self) -> Option<Role> {
        self.state.read().session.as_ref().map(Session::role)
    }

    pub fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .session
            .as_ref()
            .map(|s| s.profile().access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state
            .read()
            .session
            .as_ref()
            .map(|s| s.profile().refresh_token.clone())
    }

    pub fn sign_in(&self, session: Session) -> ClientResult<()> {
        self.update(|state| state.session = Some(session))
    }

    /// Swaps in a rotated token pair; a no-op when signed out.
    pub fn replace_tokens(&self, access_token: String, refresh_token: String) -> ClientResult<()> {
        self.update(|state| {
            if let Some(session) = state.session.as_mut() {
                let profile = session.profile_mut();
                profile.access_token = access_token;
                profile.refresh_token = refresh_token;
            }
        })
    }

    pub fn sign_out(&self) -> ClientResult<()> {
        self.update(|state| state.session = None)
    }

    pub fn theme(&self) -> Theme {
        self.state.read().theme
    }

    pub fn set_theme(&self, theme: Theme) -> ClientResult<()> {
        self.update(|state| state.theme = theme)?;
        self.theme.send_replace(theme);
        Ok(())
    }

    pub fn toggle_theme(&self) -> ClientResult<Theme> {
        let next = self.theme().toggled();
        self.set_theme(next)?;
        Ok(next)
    }

    pub fn subscribe_theme(&self) -> watch::Receiver<Theme> {
        self.theme.subscribe()
    }

    /// Applies `change` to a copy, writes it out, then publishes it.
    fn update(&self, change: impl FnOnce(&mut StoredState)) -> ClientResult<()> {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        change(&mut next);
        if let Some(path) = &self.path {
            persist(path, &next)?;
        }
        *guard = next;
        Ok(())
    }
}

fn state_error(path: &Path, e: impl std::fmt::Display) -> ClientError {
    ClientError::State {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Write-then-rename so a crash never leaves a half-written file.
fn persist(path: &Path, state: &StoredState) -> ClientResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| state_error(path, e))?;
    }
    let raw = serde_json::to_string_pretty(state).map_err(|e| state_error(path, e))?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, raw).map_err(|e| state_error(path, e))?;
    fs::rename(&tmp, path).map_err(|e| state_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: u64) -> Profile {
        Profile {
            id,
            name: "Meera".into(),
            email: "meera@example.com".into(),
            access_token: "a1".into(),
            refresh_token: "r1".into(),
        }
    }

    #[test]
    fn session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let store = SessionStore::open(&path).unwrap();
        assert!(store.session().is_none());
        store
            .sign_in(Session::Parent {
                profile: profile(3),
                student_id: 8,
            })
            .unwrap();
        store.set_theme(Theme::Dark).unwrap();

        let reopened = SessionStore::open(&path).unwrap();
        let session = reopened.session().unwrap();
        assert_eq!(session.role(), Role::Parent);
        assert_eq!(session.student_id(), Some(8));
        assert_eq!(reopened.theme(), Theme::Dark);
    }

    #[test]
    fn sign_out_clears_file_but_keeps_theme() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = SessionStore::open(&path).unwrap();
        store.sign_in(Session::Teacher(profile(1))).unwrap();
        store.set_theme(Theme::Dark).unwrap();

        store.sign_out().unwrap();
        assert!(store.access_token().is_none());

        let reopened = SessionStore::open(&path).unwrap();
        assert!(reopened.session().is_none());
        assert_eq!(reopened.theme(), Theme::Dark);
    }

    #[test]
    fn role_tag_is_on_the_wire() {
        let json = serde_json::to_value(Session::Parent {
            profile: profile(3),
            student_id: 8,
        })
        .unwrap();
        assert_eq!(json["role"], "parent");
        assert_eq!(json["studentId"], 8);
        assert_eq!(json["profile"]["accessToken"], "a1");
    }

    #[test]
    fn corrupt_state_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            SessionStore::open(&path),
            Err(ClientError::State { .. })
        ));
    }

    #[test]
    fn rotated_tokens_replace_old_ones() {
        let store = SessionStore::in_memory();
        store.replace_tokens("x".into(), "y".into()).unwrap();
        assert!(store.session().is_none());

        store.sign_in(Session::Student(profile(4))).unwrap();
        store.replace_tokens("a2".into(), "r2".into()).unwrap();
        assert_eq!(store.access_token().as_deref(), Some("a2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn theme_changes_are_broadcast() {
        let store = SessionStore::in_memory();
        let mut rx = store.subscribe_theme();
        assert_eq!(*rx.borrow(), Theme::Light);

        assert_eq!(store.toggle_theme().unwrap(), Theme::Dark);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Theme::Dark);
    }
}
