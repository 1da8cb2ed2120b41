//! Sidebar entries and route guards derived from a snapshot.

use serde::Serialize;

use transdovic_auth::{Module, PermissionKind};

use crate::snapshot::AuthorizationSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavEntry {
    Dashboard,
    Users,
    Providers,
    Settings,
}

impl NavEntry {
    pub fn path(self) -> &'static str {
        match self {
            NavEntry::Dashboard => "/dashboard",
            NavEntry::Users => "/users",
            NavEntry::Providers => "/providers",
            NavEntry::Settings => "/settings",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NavEntry::Dashboard => "Dashboard",
            NavEntry::Users => "Users",
            NavEntry::Providers => "Providers",
            NavEntry::Settings => "Settings",
        }
    }
}

/// Sidebar entries visible for `snapshot`, in display order.
///
/// Empty while loading or signed out.
pub fn navigation(snapshot: &AuthorizationSnapshot) -> Vec<NavEntry> {
    if snapshot.loading || !snapshot.is_authenticated() {
        return Vec::new();
    }

    let mut entries = vec![NavEntry::Dashboard];
    if snapshot.can(Module::Users, PermissionKind::View) {
        entries.push(NavEntry::Users);
    }
    if snapshot.can(Module::Providers, PermissionKind::View) {
        entries.push(NavEntry::Providers);
    }
    if snapshot.is_elevated() {
        entries.push(NavEntry::Settings);
    }
    entries
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    Login,
    Dashboard,
    Users,
    UserDetail(String),
    Providers,
    DriverTasks,
    Settings,
    Unknown(String),
}

impl Route {
    /// Parse an application path. Trailing slashes are ignored.
    pub fn from_path(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed
            .trim_start_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            [] => Route::Root,
            ["login"] => Route::Login,
            ["dashboard"] => Route::Dashboard,
            ["users"] => Route::Users,
            ["users", id] => Route::UserDetail((*id).to_string()),
            ["providers"] => Route::Providers,
            ["driver", "tasks"] => Route::DriverTasks,
            ["settings"] => Route::Settings,
            _ => Route::Unknown(path.to_string()),
        }
    }

    /// Module whose `can_view` guards this route, if any.
    fn guarded_by(&self) -> Option<Module> {
        match self {
            Route::Users | Route::UserDetail(_) => Some(Module::Users),
            Route::Providers => Some(Module::Providers),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAccess {
    /// Show a spinner; nothing is decided yet.
    Loading,
    RedirectToLogin,
    Allowed,
    RedirectToDashboard,
}

pub fn route_access(snapshot: &AuthorizationSnapshot, route: &Route) -> RouteAccess {
    if snapshot.loading {
        return RouteAccess::Loading;
    }

    if !snapshot.is_authenticated() {
        return match route {
            Route::Login => RouteAccess::Allowed,
            _ => RouteAccess::RedirectToLogin,
        };
    }

    match route {
        Route::Dashboard | Route::DriverTasks => RouteAccess::Allowed,
        Route::Settings if snapshot.is_elevated() => RouteAccess::Allowed,
        r if r.guarded_by().is_some_and(|m| snapshot.can(m, PermissionKind::View)) => {
            RouteAccess::Allowed
        }
        _ => RouteAccess::RedirectToDashboard,
    }
}
