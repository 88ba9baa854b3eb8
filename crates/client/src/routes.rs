//! Route/layout control.
//!
//! Which shell renders and which routes are reachable is a pure function of
//! the session phase, evaluated on every navigation:
//!
//! | phase                 | reachable                  | everything else redirects to |
//! |-----------------------|----------------------------|------------------------------|
//! | `Unauthenticated`     | login (public shell)       | login                        |
//! | `PendingVerification` | verification (public shell)| verification                 |
//! | `Authenticated`       | application routes         | dashboard (login, verify)    |
//!
//! Phase changes also produce a navigation intent (see [`RouteController`]),
//! which is how transitions "navigate" without knowing about routes.

use serde::Serialize;

use opsconsole_auth::{Capability, Phase, registry};
use opsconsole_events::Subscription;

use crate::manager::SessionEvent;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Login,
    Verify,
    Dashboard,
    Customers,
    Contracts,
    DomainServices,
    HostingServices,
    SslServices,
    EmailServices,
    WebsiteServices,
    Plans,
    Suppliers,
    Users,
    IpWhitelist,
    ActionLog,
    NotFound(String),
}

/// Application routes in menu order.
pub const APPLICATION_ROUTES: &[Route] = &[
    Route::Dashboard,
    Route::Customers,
    Route::Contracts,
    Route::DomainServices,
    Route::HostingServices,
    Route::SslServices,
    Route::EmailServices,
    Route::WebsiteServices,
    Route::Plans,
    Route::Suppliers,
    Route::Users,
    Route::IpWhitelist,
    Route::ActionLog,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Shell {
    /// Credential entry and OTP screens.
    Public,
    /// Navigation chrome, menu, account badge.
    Application,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteDecision {
    Render { shell: Shell, route: Route },
    Redirect(Route),
}

impl Route {
    pub fn path(&self) -> &str {
        match self {
            Route::Login => "/login",
            Route::Verify => "/verify",
            Route::Dashboard => "/",
            Route::Customers => "/customers",
            Route::Contracts => "/contracts",
            Route::DomainServices => "/services/domain",
            Route::HostingServices => "/services/hosting",
            Route::SslServices => "/services/ssl",
            Route::EmailServices => "/services/email",
            Route::WebsiteServices => "/services/website",
            Route::Plans => "/plans",
            Route::Suppliers => "/suppliers",
            Route::Users => "/users",
            Route::IpWhitelist => "/ip-whitelist",
            Route::ActionLog => "/action-log",
            Route::NotFound(path) => path,
        }
    }

    /// Match a path. Sub-paths (`/customers/42/edit`) resolve to their
    /// section; unknown paths become `NotFound`.
    pub fn parse(path: &str) -> Route {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" => "/",
            p => p,
        };

        let known = [Route::Login, Route::Verify]
            .into_iter()
            .chain(APPLICATION_ROUTES.iter().cloned());

        let mut best: Option<Route> = None;
        for route in known {
            let candidate = route.path();
            let hit = normalized == candidate
                || (candidate != "/" && normalized.starts_with(&format!("{candidate}/")));
            if hit && best.as_ref().is_none_or(|b| candidate.len() > b.path().len()) {
                best = Some(route);
            }
        }

        best.unwrap_or_else(|| Route::NotFound(normalized.to_string()))
    }

    pub fn title(&self) -> &str {
        match self {
            Route::Login => "Sign in",
            Route::Verify => "Verification code",
            Route::Dashboard => "Dashboard",
            Route::Customers => "Customers",
            Route::Contracts => "Contracts",
            Route::DomainServices => "Domain services",
            Route::HostingServices => "Hosting services",
            Route::SslServices => "SSL certificates",
            Route::EmailServices => "Email services",
            Route::WebsiteServices => "Website services",
            Route::Plans => "Plans",
            Route::Suppliers => "Suppliers",
            Route::Users => "Users",
            Route::IpWhitelist => "IP whitelist",
            Route::ActionLog => "Action log",
            Route::NotFound(_) => "Not found",
        }
    }

    /// Capability that gates this screen's menu entry.
    pub fn capability(&self) -> Option<Capability> {
        match self {
            Route::Dashboard => Some(registry::DASHBOARD::VIEW),
            Route::Customers => Some(registry::CUSTOMER::VIEW),
            Route::Contracts => Some(registry::CONTRACT::VIEW),
            Route::DomainServices => Some(registry::DOMAIN_SERVICE::VIEW),
            Route::HostingServices => Some(registry::HOSTING_SERVICE::VIEW),
            Route::SslServices => Some(registry::SSL_SERVICE::VIEW),
            Route::EmailServices => Some(registry::EMAIL_SERVICE::VIEW),
            Route::WebsiteServices => Some(registry::WEBSITE_SERVICE::VIEW),
            Route::Plans => Some(registry::PLAN::VIEW),
            Route::Suppliers => Some(registry::SUPPLIER::VIEW),
            Route::Users => Some(registry::USER::VIEW),
            Route::IpWhitelist => Some(registry::IP_WHITELIST::VIEW),
            Route::ActionLog => Some(registry::ACTION_LOG::VIEW),
            Route::Login | Route::Verify | Route::NotFound(_) => None,
        }
    }
}

impl core::fmt::Display for Route {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.path())
    }
}

/// One navigation step.
pub fn resolve(phase: Phase, route: &Route) -> RouteDecision {
    match (phase, route) {
        (Phase::Unauthenticated, Route::Login) => RouteDecision::Render {
            shell: Shell::Public,
            route: Route::Login,
        },
        (Phase::Unauthenticated, _) => RouteDecision::Redirect(Route::Login),

        (Phase::PendingVerification, Route::Verify) => RouteDecision::Render {
            shell: Shell::Public,
            route: Route::Verify,
        },
        (Phase::PendingVerification, _) => RouteDecision::Redirect(Route::Verify),

        (Phase::Authenticated, Route::Login | Route::Verify) => RouteDecision::Redirect(Route::Dashboard),
        (Phase::Authenticated, other) => RouteDecision::Render {
            shell: Shell::Application,
            route: other.clone(),
        },
    }
}

/// Follow redirects to the screen that actually renders.
///
/// Every redirect target renders in the phase that produced it, so this
/// settles in at most one hop.
pub fn settle(phase: Phase, route: &Route) -> (Shell, Route) {
    let mut current = route.clone();
    loop {
        match resolve(phase, &current) {
            RouteDecision::Render { shell, route } => return (shell, route),
            RouteDecision::Redirect(next) => current = next,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub route: Route,
    pub title: String,
    pub path: String,
}

/// Menu entries the current account may see.
pub fn menu<F>(allowed: F) -> Vec<NavItem>
where
    F: Fn(&Capability) -> bool,
{
    APPLICATION_ROUTES
        .iter()
        .filter(|route| route.capability().is_none_or(|cap| allowed(&cap)))
        .map(|route| NavItem {
            route: route.clone(),
            title: route.title().to_string(),
            path: route.path().to_string(),
        })
        .collect()
}

/// Turns session phase changes into navigation intents.
#[derive(Debug)]
pub struct RouteController {
    events: Subscription<SessionEvent>,
}

impl RouteController {
    pub fn new(events: Subscription<SessionEvent>) -> Self {
        Self { events }
    }

    /// Where the UI should go after the phase changes seen since the last
    /// call; the most recent change wins.
    pub fn take_redirect(&self) -> Option<Route> {
        self.events.drain().last().map(|event| match event.to {
            Phase::PendingVerification => Route::Verify,
            Phase::Authenticated | Phase::Unauthenticated => Route::Dashboard,
        })
    }

    pub fn navigate(&self, phase: Phase, route: &Route) -> RouteDecision {
        resolve(phase, route)
    }
}
