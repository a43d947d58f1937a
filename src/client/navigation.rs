//! Path to view mapping and the redirect rules in front of every view.

use std::fmt;
use std::str::FromStr;

use strum_macros::{Display, EnumString};

use crate::client::Session;
use crate::model::role::Role;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Section {
    Attendance,
    Tests,
    Fees,
    Timetable,
    Announcements,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Register,
    Dashboard(Role),
    /// Teacher's student directory.
    Students,
    Batch {
        role: Role,
        batch_id: u64,
    },
    BatchSection {
        role: Role,
        batch_id: u64,
        section: Section,
    },
    NotFound(String),
}

/// What the shell should do with a requested route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Render(Route),
    Redirect(Route),
}

impl Route {
    /// Parses a path such as `/teacher/batches/4/attendance`. Query strings and
    /// trailing slashes are ignored.
    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let parsed = match segments.as_slice() {
            [] => Some(Route::Home),
            ["login"] => Some(Route::Login),
            ["register"] => Some(Route::Register),
            [role] => Role::from_str(role).ok().map(Route::Dashboard),
            ["teacher", "students"] => Some(Route::Students),
            [role, "batches", id] => match (Role::from_str(role), id.parse()) {
                (Ok(role), Ok(batch_id)) => Some(Route::Batch { role, batch_id }),
                _ => None,
            },
            [role, "batches", id, section] => {
                match (Role::from_str(role), id.parse(), Section::from_str(section)) {
                    (Ok(role), Ok(batch_id), Ok(section)) => Some(Route::BatchSection {
                        role,
                        batch_id,
                        section,
                    }),
                    _ => None,
                }
            }
            _ => None,
        };

        parsed.unwrap_or_else(|| Route::NotFound(path.to_string()))
    }

    /// The role a session must have to see this route; `None` for public views.
    pub fn required_role(&self) -> Option<Role> {
        match self {
            Route::Home | Route::Login | Route::Register | Route::NotFound(_) => None,
            Route::Students => Some(Role::Teacher),
            Route::Dashboard(role)
            | Route::Batch { role, .. }
            | Route::BatchSection { role, .. } => Some(*role),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Home => write!(f, "/"),
            Route::Login => write!(f, "/login"),
            Route::Register => write!(f, "/register"),
            Route::Dashboard(role) => write!(f, "/{role}"),
            Route::Students => write!(f, "/teacher/students"),
            Route::Batch { role, batch_id } => write!(f, "/{role}/batches/{batch_id}"),
            Route::BatchSection {
                role,
                batch_id,
                section,
            } => write!(f, "/{role}/batches/{batch_id}/{section}"),
            Route::NotFound(path) => write!(f, "{path}"),
        }
    }
}

/// Signed-out users go to `/login`; a session of the wrong role goes to its
/// own dashboard. Signed-in users skip the login and register pages.
pub fn resolve(route: Route, session: Option<&Session>) -> Resolution {
    let role = session.map(Session::role);

    match (route.required_role(), role) {
        (Some(_), None) => Resolution::Redirect(Route::Login),
        (Some(required), Some(actual)) if required != actual => {
            Resolution::Redirect(Route::Dashboard(actual))
        }
        (None, None) if route == Route::Home => Resolution::Redirect(Route::Login),
        (None, Some(actual)) if matches!(route, Route::Home | Route::Login | Route::Register) => {
            Resolution::Redirect(Route::Dashboard(actual))
        }
        _ => Resolution::Render(route),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Profile;

    fn profile() -> Profile {
        Profile {
            id: 1,
            name: "N".into(),
            email: "n@example.com".into(),
            access_token: "a".into(),
            refresh_token: "r".into(),
        }
    }

    #[test]
    fn parses_role_scoped_paths() {
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse("/parent/"), Route::Dashboard(Role::Parent));
        assert_eq!(
            Route::parse("/teacher/batches/4/attendance?date=2024-01-10"),
            Route::BatchSection {
                role: Role::Teacher,
                batch_id: 4,
                section: Section::Attendance
            }
        );
        assert_eq!(
            Route::parse("/student/batches/9"),
            Route::Batch {
                role: Role::Student,
                batch_id: 9
            }
        );
        assert!(matches!(Route::parse("/student/batches/x"), Route::NotFound(_)));
        assert!(matches!(Route::parse("/admin"), Route::NotFound(_)));
        assert!(matches!(Route::parse("/student/students"), Route::NotFound(_)));
    }

    #[test]
    fn display_round_trips_through_parse() {
        for path in ["/login", "/teacher/students", "/parent/batches/2/fees"] {
            assert_eq!(Route::parse(path).to_string(), path);
        }
    }

    #[test]
    fn signed_out_users_are_sent_to_login() {
        assert_eq!(
            resolve(Route::Dashboard(Role::Teacher), None),
            Resolution::Redirect(Route::Login)
        );
        assert_eq!(resolve(Route::Home, None), Resolution::Redirect(Route::Login));
        assert_eq!(resolve(Route::Register, None), Resolution::Render(Route::Register));
    }

    #[test]
    fn wrong_role_goes_to_own_dashboard() {
        let student = Session::Student(profile());
        assert_eq!(
            resolve(Route::Students, Some(&student)),
            Resolution::Redirect(Route::Dashboard(Role::Student))
        );
        assert_eq!(
            resolve(Route::parse("/teacher/batches/1/fees"), Some(&student)),
            Resolution::Redirect(Route::Dashboard(Role::Student))
        );

        let parent = Session::Parent {
            profile: profile(),
            student_id: 5,
        };
        let route = Route::parse("/parent/batches/1/tests");
        assert_eq!(resolve(route.clone(), Some(&parent)), Resolution::Render(route));
        assert_eq!(
            resolve(Route::Login, Some(&parent)),
            Resolution::Redirect(Route::Dashboard(Role::Parent))
        );
    }
}
