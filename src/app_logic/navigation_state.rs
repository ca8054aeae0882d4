/*
 * This module defines the NavigationState struct.
 * NavigationState holds the presentation-side state of the client: the
 * history of locations, whether session hydration has resolved, the navigation
 * that is waiting on hydration, and what the host was last told to show. It is
 * kept apart from the application state container, which owns the session and
 * domain data.
 */
use super::router::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationPhase {
    // Startup hydration has been requested but not yet resolved.
    Pending,
    Resolved,
}

#[derive(Debug)]
pub struct NavigationState {
    /* Location history, oldest first. The last entry is the current location. */
    pub history: Vec<Route>,
    pub hydration_phase: HydrationPhase,
    /* The latest protected navigation requested while hydration was pending. */
    pub deferred_navigation: Option<Route>,
    /* Whether the host currently shows the authenticated chrome. */
    pub chrome_authenticated: bool,
    /* The route whose view was last rendered, if any. */
    pub rendered_route: Option<Route>,
}

impl NavigationState {
    pub fn new() -> Self {
        log::debug!("NavigationState::new called.");
        NavigationState {
            history: Vec::new(),
            hydration_phase: HydrationPhase::Pending,
            deferred_navigation: None,
            chrome_authenticated: false,
            rendered_route: None,
        }
    }

    pub fn current_route(&self) -> Option<&Route> {
        self.history.last()
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydration_phase == HydrationPhase::Resolved
    }

    pub fn push(&mut self, route: Route) {
        self.history.push(route);
    }

    /*
     * Replaces the current history entry. Used for redirects so the redirected
     * location cannot be reached again with back navigation.
     */
    pub fn replace_current(&mut self, route: Route) {
        match self.history.last_mut() {
            Some(current) => *current = route,
            None => self.history.push(route),
        }
    }

    // Drops the current entry; returns the entry that becomes current, if any.
    pub fn go_back(&mut self) -> Option<&Route> {
        if self.history.len() <= 1 {
            return None;
        }
        self.history.pop();
        self.history.last()
    }
}

impl Default for NavigationState {
    fn default() -> Self {
        Self::new()
    }
}
