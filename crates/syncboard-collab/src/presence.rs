//! Presence Tracker
//!
//! Outbound: samples the local pointer through a fixed-rate throttle and
//! converts screen coordinates to document space with the sender's view
//! transform, so the transmitted position is viewport-independent.
//! Inbound: places remote cursors and lock overlays by inverting the
//! transform with the *receiver's* current view transform; recomputed on
//! every pan/zoom.

use std::time::Instant;

use crate::config::CollabConfig;
use crate::engine::{Bounds, DocumentEngine, Point, ViewTransform};
use crate::protocol::MessagePayload;
use crate::session::SessionState;
use crate::timing::Throttle;

/// A labeled remote cursor, positioned in screen space
#[derive(Debug, Clone, PartialEq)]
pub struct CursorMarker {
    /// Cursor owner
    pub user_id: String,
    /// Label text
    pub user_name: String,
    /// Marker color
    pub user_color: String,
    /// Screen-space position under the receiver's view transform
    pub position: Point,
}

/// A lock outline with badge, positioned in screen space
#[derive(Debug, Clone, PartialEq)]
pub struct LockOverlay {
    /// Locked element id
    pub element_id: String,
    /// Lock owner
    pub user_id: String,
    /// Badge text
    pub user_name: String,
    /// Outline color
    pub user_color: String,
    /// Screen-space rectangle under the receiver's view transform
    pub rect: Bounds,
}

/// Tracks the local view transform and produces presence geometry
pub struct PresenceTracker {
    view: ViewTransform,
    cursor_throttle: Throttle,
}

impl PresenceTracker {
    /// Create a tracker with the given tunables
    #[must_use]
    pub fn new(config: &CollabConfig) -> Self {
        Self {
            view: ViewTransform::default(),
            cursor_throttle: Throttle::new(config.cursor_throttle()),
        }
    }

    /// The current local view transform
    #[must_use]
    pub fn view(&self) -> ViewTransform {
        self.view
    }

    /// Update the local view transform (pan/zoom); marker and overlay
    /// geometry must be recomputed by the caller afterwards
    pub fn set_view(&mut self, view: ViewTransform) {
        self.view = view;
    }

    /// Sample a local pointer move in screen coordinates.
    ///
    /// Returns a cursor payload in document space, at most once per
    /// throttle interval.
    pub fn pointer_moved(&mut self, screen: Point, now: Instant) -> Option<MessagePayload> {
        if !self.cursor_throttle.allow(now) {
            return None;
        }
        let doc = self.view.to_document(screen);
        Some(MessagePayload::Cursor { x: doc.x, y: doc.y })
    }

    /// Screen-space markers for every remote user with a live cursor
    #[must_use]
    pub fn cursor_markers(&self, session: &SessionState) -> Vec<CursorMarker> {
        let mut markers: Vec<CursorMarker> = session
            .remote_users()
            .values()
            .filter_map(|remote| {
                let cursor = remote.cursor.as_ref()?;
                Some(CursorMarker {
                    user_id: remote.user.id.clone(),
                    user_name: remote.user.name.clone(),
                    user_color: remote.user.color.clone(),
                    position: self.view.to_screen(Point {
                        x: cursor.x,
                        y: cursor.y,
                    }),
                })
            })
            .collect();
        markers.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        markers
    }

    /// Screen-space outlines for every locked element still present in the
    /// registry; elements that disappeared render nothing
    #[must_use]
    pub fn lock_overlays<E: DocumentEngine + ?Sized>(
        &self,
        session: &SessionState,
        engine: &E,
    ) -> Vec<LockOverlay> {
        let mut overlays: Vec<LockOverlay> = session
            .locked_elements()
            .values()
            .filter_map(|lock| {
                let element = engine.get_element(&lock.element_id)?;
                Some(LockOverlay {
                    element_id: lock.element_id.clone(),
                    user_id: lock.user_id.clone(),
                    user_name: lock.user_name.clone(),
                    user_color: lock.user_color.clone(),
                    rect: self.view.bounds_to_screen(element.bounds),
                })
            })
            .collect();
        overlays.sort_by(|a, b| a.element_id.cmp(&b.element_id));
        overlays
    }

    /// Let the next pointer sample through immediately (session teardown)
    pub fn reset(&mut self) {
        self.cursor_throttle.reset();
    }
}
