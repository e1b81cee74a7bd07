//! Remote cursor presence
//!
//! Remote cursors arrive as normalized page coordinates and are drawn through
//! the same page-frame mapping as highlights. A cursor that has not moved for
//! longer than the TTL is hidden until the next update.

use crate::comment::UserId;
use crate::geometry::Point;
use crate::mapping::{denormalize_point, normalize_point, PageGeometry};
use crate::selection::TextLayerLocator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cursor colors, indexed by user id
pub const PRESENCE_PALETTE: [&str; 8] = [
    "#e6194b", "#3cb44b", "#4363d8", "#f58231", "#911eb4", "#42d4f4", "#f032e6", "#469990",
];

pub const PRESENCE_TTL_MS: u64 = 200;
pub const CURSOR_THROTTLE_MS: u64 = 50;

pub fn presence_color(user_id: UserId) -> &'static str {
    PRESENCE_PALETTE[user_id.rem_euclid(PRESENCE_PALETTE.len() as i64) as usize]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCursor {
    pub user_id: UserId,
    pub username: String,
    pub x: f64,
    pub y: f64,
    pub page: u32,
    pub visible: bool,

    /// Local receive time (ms)
    pub last_update: u64,
}

/// Inbound cursor position from the presence channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdate {
    pub user_id: UserId,
    pub username: String,
    pub x: f64,
    pub y: f64,
    pub page: u32,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUser {
    pub user_id: UserId,
    pub username: String,
}

/// A remote cursor ready to draw
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorMarker {
    pub user_id: UserId,
    pub username: String,
    pub color: &'static str,
    pub position: Point,
}

#[derive(Debug, Clone)]
pub struct PresenceOverlay {
    cursors: BTreeMap<UserId, UserCursor>,
    active_users: Vec<ActiveUser>,
    ttl_ms: u64,
}

impl Default for PresenceOverlay {
    fn default() -> Self {
        Self::new(PRESENCE_TTL_MS)
    }
}

impl PresenceOverlay {
    pub fn new(ttl_ms: u64) -> Self {
        Self {
            cursors: BTreeMap::new(),
            active_users: Vec::new(),
            ttl_ms,
        }
    }

    pub fn upsert(&mut self, update: CursorUpdate, now: u64) {
        let cursor = UserCursor {
            user_id: update.user_id,
            username: update.username,
            x: update.x.clamp(0.0, 1.0),
            y: update.y.clamp(0.0, 1.0),
            page: update.page,
            visible: update.visible,
            last_update: now,
        };
        self.cursors.insert(cursor.user_id, cursor);
    }

    /// Forget a user who left the document
    pub fn remove_user(&mut self, user_id: UserId) -> Option<UserCursor> {
        self.active_users.retain(|user| user.user_id != user_id);
        self.cursors.remove(&user_id)
    }

    /// Replace the active-user list; cursors of users who left are evicted
    pub fn set_active_users(&mut self, users: Vec<ActiveUser>) {
        self.cursors
            .retain(|user_id, _| users.iter().any(|user| user.user_id == *user_id));
        self.active_users = users;
    }

    pub fn active_users(&self) -> &[ActiveUser] {
        &self.active_users
    }

    pub fn cursor(&self, user_id: UserId) -> Option<&UserCursor> {
        self.cursors.get(&user_id)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Hide cursors older than the TTL; returns the users that were hidden
    pub fn sweep(&mut self, now: u64) -> Vec<UserId> {
        let mut hidden = Vec::new();
        for cursor in self.cursors.values_mut() {
            if cursor.visible && now.saturating_sub(cursor.last_update) > self.ttl_ms {
                cursor.visible = false;
                hidden.push(cursor.user_id);
            }
        }
        if !hidden.is_empty() {
            tracing::trace!(?hidden, "presence cursors expired");
        }
        hidden
    }

    /// Visible remote cursors mapped to client pixels
    pub fn markers(&self, geometry: &dyn PageGeometry, self_id: Option<UserId>) -> Vec<CursorMarker> {
        self.cursors
            .values()
            .filter(|cursor| cursor.visible && Some(cursor.user_id) != self_id)
            .filter_map(|cursor| {
                let position = denormalize_point(cursor.page, cursor.x, cursor.y, geometry)?;
                Some(CursorMarker {
                    user_id: cursor.user_id,
                    username: cursor.username.clone(),
                    color: presence_color(cursor.user_id),
                    position,
                })
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
        self.active_users.clear();
    }
}

/// Outbound cursor position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorMessage {
    pub x: f64,
    pub y: f64,
    pub page: u32,
    pub visible: bool,
}

/// Outbound side of the presence collaborator
pub trait PresenceChannel {
    fn send_mouse_position(&mut self, message: CursorMessage);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Shared,
    /// Viewing a document others may not see; the cursor is never shared
    Restricted,
}

/// Throttled conversion of local pointer moves into cursor messages
#[derive(Debug, Clone)]
pub struct CursorBroadcaster {
    throttle_ms: u64,
    sharing: bool,
    view_mode: ViewMode,
    last_sent_at: Option<u64>,
    last_message: Option<CursorMessage>,
}

impl Default for CursorBroadcaster {
    fn default() -> Self {
        Self::new(CURSOR_THROTTLE_MS)
    }
}

impl CursorBroadcaster {
    pub fn new(throttle_ms: u64) -> Self {
        Self {
            throttle_ms,
            sharing: true,
            view_mode: ViewMode::Shared,
            last_sent_at: None,
            last_message: None,
        }
    }

    pub fn set_sharing(&mut self, sharing: bool) {
        self.sharing = sharing;
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.view_mode = view_mode;
    }

    fn enabled(&self) -> bool {
        self.sharing && self.view_mode != ViewMode::Restricted
    }

    /// Convert a local pointer position into a message, if one is due
    pub fn on_local_pointer(
        &mut self,
        point: Point,
        locator: &dyn TextLayerLocator,
        now: u64,
    ) -> Option<CursorMessage> {
        if !self.enabled() {
            return None;
        }

        let normalized = locator.text_layer_at(point).and_then(|page| {
            let layer = locator.text_layer_rect(page)?;
            let (x, y) = normalize_point(point, &layer)?;
            Some(CursorMessage {
                x,
                y,
                page,
                visible: true,
            })
        });

        let message = match normalized {
            Some(message) => {
                if let Some(sent_at) = self.last_sent_at {
                    if now.saturating_sub(sent_at) < self.throttle_ms {
                        return None;
                    }
                }
                message
            }
            // Off the pages: one hide message, then silence.
            None => {
                let last = self.last_message.filter(|m| m.visible)?;
                CursorMessage {
                    visible: false,
                    ..last
                }
            }
        };

        self.last_sent_at = Some(now);
        self.last_message = Some(message);
        Some(message)
    }

    /// Forward a pointer move to the channel
    pub fn broadcast(
        &mut self,
        point: Point,
        locator: &dyn TextLayerLocator,
        now: u64,
        channel: &mut dyn PresenceChannel,
    ) -> bool {
        match self.on_local_pointer(point, locator, now) {
            Some(message) => {
                channel.send_mouse_position(message);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::PageFrames;

    fn frames() -> PageFrames {
        PageFrames::stacked(2, 0.0, 0.0, 500.0, 1000.0, 10.0)
    }

    fn update(user_id: UserId, x: f64, y: f64) -> CursorUpdate {
        CursorUpdate {
            user_id,
            username: format!("user{user_id}"),
            x,
            y,
            page: 1,
            visible: true,
        }
    }

    #[derive(Default)]
    struct RecordingChannel {
        sent: Vec<CursorMessage>,
    }

    impl PresenceChannel for RecordingChannel {
        fn send_mouse_position(&mut self, message: CursorMessage) {
            self.sent.push(message);
        }
    }

    #[test]
    fn test_ttl_hides_stale_cursor() {
        let mut overlay = PresenceOverlay::default();
        overlay.upsert(update(1, 0.5, 0.5), 1_000);

        assert!(overlay.sweep(1_050).is_empty());
        assert!(overlay.cursor(1).unwrap().visible);

        assert_eq!(overlay.sweep(1_201), vec![1]);
        assert!(!overlay.cursor(1).unwrap().visible);
    }

    #[test]
    fn test_exact_ttl_stays_visible() {
        let mut overlay = PresenceOverlay::default();
        overlay.upsert(update(1, 0.5, 0.5), 1_000);
        assert!(overlay.sweep(1_200).is_empty());
    }

    #[test]
    fn test_update_revives_cursor() {
        let mut overlay = PresenceOverlay::default();
        overlay.upsert(update(1, 0.5, 0.5), 0);
        overlay.sweep(500);
        overlay.upsert(update(1, 0.6, 0.5), 600);
        assert!(overlay.cursor(1).unwrap().visible);
    }

    #[test]
    fn test_markers_map_and_skip_self() {
        let mut overlay = PresenceOverlay::default();
        overlay.upsert(update(1, 0.5, 0.25), 0);
        overlay.upsert(update(2, 0.1, 0.1), 0);

        let markers = overlay.markers(&frames(), Some(2));
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].position, Point::new(250.0, 250.0));
        assert_eq!(markers[0].color, presence_color(1));
    }

    #[test]
    fn test_markers_skip_unrendered_pages() {
        let mut overlay = PresenceOverlay::default();
        let mut cursor = update(1, 0.5, 0.5);
        cursor.page = 9;
        overlay.upsert(cursor, 0);
        assert!(overlay.markers(&frames(), None).is_empty());
    }

    #[test]
    fn test_remove_user_drops_cursor_and_listing() {
        let mut overlay = PresenceOverlay::default();
        overlay.set_active_users(vec![ActiveUser {
            user_id: 3,
            username: "user3".to_string(),
        }]);
        overlay.upsert(update(3, 0.5, 0.5), 0);

        assert_eq!(overlay.remove_user(3).map(|cursor| cursor.user_id), Some(3));
        assert!(overlay.cursor(3).is_none());
        assert!(overlay.active_users().is_empty());
        assert!(overlay.remove_user(3).is_none());
    }

    #[test]
    fn test_active_users_evict_departed() {
        let mut overlay = PresenceOverlay::default();
        overlay.upsert(update(1, 0.5, 0.5), 0);
        overlay.upsert(update(2, 0.5, 0.5), 0);
        overlay.set_active_users(vec![ActiveUser {
            user_id: 2,
            username: "user2".to_string(),
        }]);
        assert!(overlay.cursor(1).is_none());
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(presence_color(3), presence_color(11));
        assert_eq!(presence_color(-1), PRESENCE_PALETTE[7]);
    }

    #[test]
    fn test_broadcast_throttled() {
        let locator = frames();
        let mut broadcaster = CursorBroadcaster::default();
        let mut channel = RecordingChannel::default();

        assert!(broadcaster.broadcast(Point::new(100.0, 100.0), &locator, 0, &mut channel));
        assert!(!broadcaster.broadcast(Point::new(110.0, 100.0), &locator, 20, &mut channel));
        assert!(broadcaster.broadcast(Point::new(120.0, 100.0), &locator, 50, &mut channel));

        assert_eq!(channel.sent.len(), 2);
        assert_eq!(channel.sent[0].page, 1);
        assert!((channel.sent[1].x - 0.24).abs() < 1e-9);
    }

    #[test]
    fn test_leaving_pages_sends_one_hide() {
        let locator = frames();
        let mut broadcaster = CursorBroadcaster::default();

        broadcaster.on_local_pointer(Point::new(100.0, 100.0), &locator, 0).unwrap();
        let hide = broadcaster.on_local_pointer(Point::new(900.0, 100.0), &locator, 10).unwrap();
        assert!(!hide.visible);
        assert_eq!(hide.page, 1);
        assert!(broadcaster.on_local_pointer(Point::new(900.0, 120.0), &locator, 100).is_none());
    }

    #[test]
    fn test_restricted_view_never_shares() {
        let locator = frames();
        let mut broadcaster = CursorBroadcaster::default();
        broadcaster.set_view_mode(ViewMode::Restricted);
        assert!(broadcaster.on_local_pointer(Point::new(100.0, 100.0), &locator, 0).is_none());

        broadcaster.set_view_mode(ViewMode::Shared);
        broadcaster.set_sharing(false);
        assert!(broadcaster.on_local_pointer(Point::new(100.0, 100.0), &locator, 0).is_none());
    }
}
