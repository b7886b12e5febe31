//! Route guard: turns (route, session) into at most one redirect.
//!
//! DESIGN
//! ======
//! [`decide`] is a pure transition table, first match wins:
//!
//! | # | Condition                                             | Action            |
//! |---|-------------------------------------------------------|-------------------|
//! | 1 | session unchecked, or an operation in flight          | wait              |
//! | 2 | route is `(auth)/login` or `(auth)/signup`            | allow             |
//! | 3 | route is under a protected group and not authenticated| redirect to login |
//! | 4 | authenticated on the bare `(auth)` landing            | redirect home     |
//! | 5 | anything else                                         | allow             |
//!
//! [`RouteGuard`] adds the stateful parts: a debounce window of
//! [`REDIRECT_DEBOUNCE`] after each redirect, measured on an injected
//! [`Clock`], and a latch so one (route, session) input never fires twice.
//!
//! Routes outside the protected groups are reachable without logging in;
//! that is how preview mode works.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::session::{Session, UserType};

/// Quiet period after a redirect while navigation settles.
pub const REDIRECT_DEBOUNCE: Duration = Duration::from_millis(100);

pub const AUTH_GROUP: &str = "(auth)";
pub const LOGIN_SEGMENT: &str = "login";
pub const SIGNUP_SEGMENT: &str = "signup";
pub const PROTECTED_GROUPS: [&str; 2] = ["(child)", "(parent)"];

// =============================================================================
// TARGETS AND DECISIONS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    Login,
    ParentHome,
    ChildHome,
    Home,
}

impl RedirectTarget {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Login => "/(auth)/login",
            Self::ParentHome => "/(parent)/(tabs)",
            Self::ChildHome => "/(child)/(tabs)",
            Self::Home => "/(tabs)",
        }
    }

    /// Landing screen for an authenticated account kind.
    #[must_use]
    pub fn home_for(user_type: Option<UserType>) -> Self {
        match user_type {
            Some(UserType::Parent) => Self::ParentHome,
            Some(UserType::Child) => Self::ChildHome,
            None => Self::Home,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Wait,
    Allow,
    Redirect(RedirectTarget),
}

/// The part of the session the guard looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardView {
    pub is_auth_checked: bool,
    pub is_loading: bool,
    pub is_authenticated: bool,
    pub user_type: Option<UserType>,
}

impl From<&Session> for GuardView {
    fn from(s: &Session) -> Self {
        Self {
            is_auth_checked: s.is_auth_checked,
            is_loading: s.is_loading,
            is_authenticated: s.is_authenticated,
            user_type: s.user_type(),
        }
    }
}

/// Split a path like `/(parent)/(tabs)/home` into its segments.
#[must_use]
pub fn segments_of(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn is_auth_screen<S: AsRef<str>>(segments: &[S]) -> bool {
    matches!(
        segments,
        [group, screen, ..] if group.as_ref() == AUTH_GROUP
            && matches!(screen.as_ref(), LOGIN_SEGMENT | SIGNUP_SEGMENT)
    )
}

fn is_auth_landing<S: AsRef<str>>(segments: &[S]) -> bool {
    match segments {
        [group] => group.as_ref() == AUTH_GROUP,
        [group, screen] => group.as_ref() == AUTH_GROUP && screen.as_ref() == "index",
        _ => false,
    }
}

fn is_protected<S: AsRef<str>>(segments: &[S]) -> bool {
    segments
        .first()
        .is_some_and(|first| PROTECTED_GROUPS.contains(&first.as_ref()))
}

/// Apply the transition table to one input.
#[must_use]
pub fn decide<S: AsRef<str>>(segments: &[S], view: &GuardView) -> Decision {
    if !view.is_auth_checked || view.is_loading {
        return Decision::Wait;
    }
    if is_auth_screen(segments) {
        return Decision::Allow;
    }
    if is_protected(segments) && !view.is_authenticated {
        return Decision::Redirect(RedirectTarget::Login);
    }
    if view.is_authenticated && is_auth_landing(segments) {
        return Decision::Redirect(RedirectTarget::home_for(view.user_type));
    }
    Decision::Allow
}

// =============================================================================
// CLOCK
// =============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self { now: Arc::new(Mutex::new(Instant::now())) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// ROUTE GUARD
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct GuardKey {
    segments: Vec<String>,
    view: GuardView,
}

pub struct RouteGuard<C = SystemClock> {
    clock: C,
    redirecting_until: Option<Instant>,
    /// An evaluation was swallowed by the debounce window.
    deferred: bool,
    last_key: Option<GuardKey>,
    fired_for_last_key: bool,
}

impl RouteGuard<SystemClock> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for RouteGuard<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RouteGuard<C> {
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self { clock, redirecting_until: None, deferred: false, last_key: None, fired_for_last_key: false }
    }

    /// Evaluate one (route, session) input. Returns the redirect to issue,
    /// if any.
    pub fn evaluate<S: AsRef<str>>(&mut self, segments: &[S], session: &Session) -> Option<RedirectTarget> {
        let now = self.clock.now();
        if let Some(until) = self.redirecting_until {
            if now < until {
                self.deferred = true;
                return None;
            }
            self.redirecting_until = None;
            self.deferred = false;
        }

        let view = GuardView::from(session);
        let key = GuardKey { segments: segments.iter().map(|s| s.as_ref().to_owned()).collect(), view };
        if self.last_key.as_ref() != Some(&key) {
            self.last_key = Some(key);
            self.fired_for_last_key = false;
        }

        let Decision::Redirect(target) = decide(segments, &view) else {
            return None;
        };
        if self.fired_for_last_key {
            debug!(to = target.path(), "redirect already issued for this state");
            return None;
        }
        self.fired_for_last_key = true;
        self.redirecting_until = Some(now + REDIRECT_DEBOUNCE);
        info!(from = %segments_path(segments), to = target.path(), "route guard redirect");
        Some(target)
    }

    /// When an evaluation was suppressed by the debounce window, the instant
    /// at which it should be retried.
    #[must_use]
    pub fn retry_at(&self) -> Option<Instant> {
        self.redirecting_until.filter(|_| self.deferred)
    }
}

fn segments_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::new();
    for s in segments {
        path.push('/');
        path.push_str(s.as_ref());
    }
    if path.is_empty() {
        path.push('/');
    }
    path
}

// =============================================================================
// NAVIGATION
// =============================================================================

/// Imperative navigation surface the guard and screens drive.
pub trait Navigator: Send + Sync {
    fn replace(&self, path: &str);

    fn push(&self, path: &str);
}

/// Re-evaluate the guard on every session or route change until either
/// channel closes, issuing redirects through `navigator.replace`.
pub async fn drive<C, N>(
    mut guard: RouteGuard<C>,
    mut session: watch::Receiver<Session>,
    mut route: watch::Receiver<Vec<String>>,
    navigator: N,
) where
    C: Clock,
    N: Navigator,
{
    loop {
        let redirect = {
            let s = session.borrow_and_update().clone();
            let r = route.borrow_and_update().clone();
            guard.evaluate(&r, &s)
        };
        if let Some(target) = redirect {
            navigator.replace(target.path());
        }

        let retry = guard.retry_at().map(tokio::time::Instant::from_std);
        tokio::select! {
            res = session.changed() => {
                if res.is_err() {
                    break;
                }
            }
            res = route.changed() => {
                if res.is_err() {
                    break;
                }
            }
            () = sleep_until_opt(retry) => {}
        }
    }
    debug!("route guard stopped");
}

async fn sleep_until_opt(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
