//! Viewer session
//!
//! The session is the single coordinator between a rendering host and the
//! engine. It owns every observer, timer and overlay element it creates, runs
//! one frame pipeline per animation frame, and tears all of it down on unmount.
//!
//! All timing is explicit: the host calls [`ViewerSession::tick`] with the
//! current time and [`ViewerSession::animation_frame`] when a frame is due.

use crate::connectors::ConnectorLayer;
use crate::cursors::CursorLayer;
use crate::highlights::HighlightLayer;
use crate::host::{ContainerId, ObserverHandle, ObserverKind, ViewerEvent, ViewerHost};
use crate::pipeline::{FrameInput, FrameOutput, FramePipeline};
use crate::registry::{OverlayError, OwnedElementRegistry};
use pdf_annotator_core::{
    draft_annotation, ActiveUser, ClusterHeights, Comment, CommentId, CommentPatch,
    CommentState, CommentStateStore, CommentStore, CommentUser, ConnectorPath, CursorBroadcaster,
    CursorUpdate, EngineConfig, HoverTarget, MappingInputs, NewComment, PageGeometry, Point,
    PresenceChannel, PresenceOverlay, SelectionRange, StoreError, UserId, ViewMode,
    DEFAULT_HIGHLIGHT_COLOR,
};
use pdf_annotator_scheduler::{
    AnimationFrameGate, Debouncer, FrameStats, IntervalTimer, PollOutcome, ReadinessPoller,
    TeardownRegistry,
};

pub struct ViewerSession<H: ViewerHost> {
    host: H,
    config: EngineConfig,
    pipeline: FramePipeline,
    container: Option<ContainerId>,

    teardown: TeardownRegistry<ObserverHandle>,
    frames: AnimationFrameGate,
    mutations: Debouncer,
    presence_sweep: IntervalTimer,
    readiness: ReadinessPoller,

    dom_generation: u64,
    last_inputs: Option<MappingInputs>,
    /// Set by anything other than a scroll since the last frame
    full_pass_pending: bool,

    comments: Vec<Comment>,
    states: CommentStateStore,
    heights: ClusterHeights,

    registry: OwnedElementRegistry,
    connectors: ConnectorLayer,
    highlights: HighlightLayer,
    cursors: CursorLayer,

    presence: PresenceOverlay,
    broadcaster: CursorBroadcaster,
    self_id: Option<UserId>,

    last_output: FrameOutput,
}

impl<H: ViewerHost> ViewerSession<H> {
    pub fn new(host: H, config: EngineConfig) -> Self {
        Self {
            host,
            pipeline: FramePipeline::new(config.clone()),
            container: None,
            teardown: TeardownRegistry::new(),
            frames: AnimationFrameGate::new(),
            mutations: Debouncer::new(config.mutation_debounce_ms),
            presence_sweep: IntervalTimer::new(config.presence_sweep_ms),
            readiness: ReadinessPoller::new(config.readiness_attempts, config.readiness_delay_ms),
            dom_generation: 0,
            last_inputs: None,
            full_pass_pending: true,
            comments: Vec::new(),
            states: CommentStateStore::new(),
            heights: ClusterHeights::new(config.badge_height_px),
            registry: OwnedElementRegistry::new(),
            connectors: ConnectorLayer::new(),
            highlights: HighlightLayer::new(),
            cursors: CursorLayer::new(),
            presence: PresenceOverlay::new(config.presence_ttl_ms),
            broadcaster: CursorBroadcaster::new(config.cursor_throttle_ms),
            self_id: None,
            last_output: FrameOutput::default(),
            config,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Attach to a scroll container
    ///
    /// Mounting the container already mounted is a no-op; mounting a different
    /// one tears the current mount down first.
    pub fn mount(&mut self, container: ContainerId, now: u64) -> Result<(), OverlayError> {
        match self.container {
            Some(current) if current == container => return Ok(()),
            Some(_) => self.unmount()?,
            None => {}
        }

        for kind in ObserverKind::ALL {
            let handle = self.host.attach(container, kind);
            self.teardown.register(handle);
        }

        let token = self.teardown.token();
        self.mutations.bind(token.clone());
        self.presence_sweep.start(now, token.clone());
        self.readiness.start(now, token);

        self.container = Some(container);
        self.full_pass_pending = true;
        self.frames.request();

        tracing::debug!(container = container.0, observers = self.teardown.len(), "session mounted");
        Ok(())
    }

    /// Detach every observer, stop every timer and remove every owned element
    pub fn unmount(&mut self) -> Result<(), OverlayError> {
        let Some(container) = self.container.take() else {
            return Ok(());
        };

        for handle in self.teardown.drain() {
            self.host.detach(handle);
        }
        self.mutations.cancel();
        self.readiness.cancel();
        self.presence_sweep.stop();
        self.frames.cancel();

        // Every layer is cleared even if an earlier one fails; the first error is returned
        let failure = [
            self.connectors.clear(&mut self.registry, &mut self.host).map(drop),
            self.highlights.clear(&mut self.registry, &mut self.host).map(drop),
            self.cursors.clear(&mut self.registry, &mut self.host),
        ]
        .into_iter()
        .find_map(Result::err);
        let stranded = self.registry.clear(&mut self.host);

        self.states = CommentStateStore::new();
        self.heights = ClusterHeights::new(self.config.badge_height_px);
        self.presence.clear();
        self.last_inputs = None;
        self.last_output = FrameOutput::default();

        match failure {
            Some(err) => {
                tracing::warn!(container = container.0, stranded, error = %err, "overlay cleanup failed");
                Err(err)
            }
            None => {
                tracing::debug!(container = container.0, "session unmounted");
                Ok(())
            }
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.container.is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.teardown.len()
    }

    fn request_frame(&mut self) -> bool {
        if self.container.is_none() {
            return false;
        }
        self.frames.request()
    }

    fn request_full_frame(&mut self) -> bool {
        self.full_pass_pending = true;
        self.request_frame()
    }

    /// Replace the comment collection; replies are dropped
    pub fn set_comments(&mut self, comments: Vec<Comment>) {
        self.comments = comments.into_iter().filter(Comment::is_top_level).collect();
        let live: Vec<CommentId> = self.comments.iter().map(|c| c.id).collect();
        self.states.retain_live(&live);
        self.heights.retain(&live);
        self.request_full_frame();
    }

    pub fn refresh_from_store(&mut self, store: &dyn CommentStore) {
        self.set_comments(store.top_level_comments());
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn handle_event(&mut self, event: ViewerEvent, now: u64) {
        tracing::trace!(?event, "viewer event");
        match event {
            ViewerEvent::Scrolled => {
                self.request_frame();
            }
            ViewerEvent::Zoomed | ViewerEvent::ContainerResized | ViewerEvent::WindowResized => {
                self.request_full_frame();
            }
            ViewerEvent::CanvasAdded => self.mutations.trigger(now),
            ViewerEvent::PageReady { page_number } => {
                tracing::debug!(page = page_number, "page ready");
                self.readiness.cancel();
                self.dom_generation += 1;
                self.request_full_frame();
            }
            ViewerEvent::ClusterResized { key, height } => {
                if self.heights.record(key, height) {
                    self.request_full_frame();
                }
            }
        }
    }

    /// Advance timers; returns true when a frame is pending afterwards
    pub fn tick(&mut self, now: u64) -> bool {
        if self.container.is_none() {
            return false;
        }

        if self.mutations.poll(now) {
            self.dom_generation += 1;
            self.request_full_frame();
        }

        let outcome = self.readiness.poll(now, || pages_ready(&self.host, &self.comments));
        if outcome == PollOutcome::Ready {
            self.dom_generation += 1;
            self.request_full_frame();
        }

        if self.presence_sweep.poll(now) && !self.presence.sweep(now).is_empty() {
            self.request_frame();
        }

        self.frames.is_pending()
    }

    /// Run the pending frame, if any
    pub fn animation_frame(&mut self) -> Result<Option<&FrameOutput>, OverlayError> {
        if !self.frames.take() {
            return Ok(None);
        }

        let viewer = self.host.viewer_frame();
        let inputs = MappingInputs::capture(&viewer, self.dom_generation);
        let scroll_only = !self.full_pass_pending
            && self.last_inputs.is_some_and(|last| {
                !last.differs(&MappingInputs {
                    scroll_top: last.scroll_top,
                    ..inputs
                })
            });

        let output = self.pipeline.run(
            FrameInput {
                geometry: &self.host,
                viewer: &viewer,
                comments: &self.comments,
                heights: &self.heights,
                previous_clusters: &self.last_output.clusters,
            },
            &mut self.states,
        );

        let drawn = self.connectors.comment_ids();
        let mut desired: Vec<CommentId> = output.connectors.iter().map(|c| c.comment_id).collect();
        desired.sort();
        if scroll_only && drawn == desired {
            let paths: Vec<(CommentId, ConnectorPath)> = output
                .connectors
                .iter()
                .map(|c| (c.comment_id, c.path.clone()))
                .collect();
            self.connectors.reposition(&paths, &mut self.registry, &mut self.host)?;
        } else {
            self.connectors.reconcile(&output.connectors, &mut self.registry, &mut self.host)?;
        }

        let elements =
            self.highlights.reconcile(&output.highlights, &mut self.registry, &mut self.host)?;
        for (id, ids) in elements {
            self.states.set_highlight_elements(id, ids);
        }

        let markers = self.presence.markers(&self.host, self.self_id);
        self.cursors.reconcile(&markers, &mut self.registry, &mut self.host)?;

        self.last_inputs = Some(inputs);
        self.full_pass_pending = false;
        self.last_output = output;
        Ok(Some(&self.last_output))
    }

    pub fn last_output(&self) -> &FrameOutput {
        &self.last_output
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.frames.stats()
    }

    pub fn registry(&self) -> &OwnedElementRegistry {
        &self.registry
    }

    pub fn state(&self, id: CommentId) -> Option<&CommentState> {
        self.states.get(id)
    }

    pub fn states(&self) -> &CommentStateStore {
        &self.states
    }

    pub fn set_hover(&mut self, id: CommentId, target: HoverTarget, hovered: bool) {
        self.states.set_hovered(id, target, hovered);
        self.request_full_frame();
    }

    /// Pin a comment; returns the comments that lost their pin
    pub fn pin(&mut self, id: CommentId) -> Vec<CommentId> {
        let unpinned = self.states.pin(id);
        self.request_full_frame();
        unpinned
    }

    pub fn unpin(&mut self, id: CommentId) {
        self.states.unpin(id);
        self.request_full_frame();
    }

    pub fn toggle_pin(&mut self, id: CommentId) -> bool {
        let pinned = self.states.toggle_pin(id);
        self.request_full_frame();
        pinned
    }

    pub fn start_editing(&mut self, id: CommentId) {
        self.states.set_editing(id, true);
        self.request_full_frame();
    }

    pub fn set_replying(&mut self, id: CommentId, replying: bool) {
        self.states.set_replying(id, replying);
        self.request_full_frame();
    }

    /// Save an edit; the comment stays in edit mode if the store refuses
    pub fn submit_edit(
        &mut self,
        id: CommentId,
        content: &str,
        store: &mut dyn CommentStore,
    ) -> Result<(), StoreError> {
        if let Err(err) = store.update(id, CommentPatch::content(content)) {
            tracing::warn!(%id, error = %err, "comment edit rejected");
            return Err(err);
        }
        if let Some(comment) = self.comments.iter_mut().find(|c| c.id == id) {
            comment.content = content.to_string();
        }
        self.states.set_editing(id, false);
        self.request_full_frame();
        Ok(())
    }

    /// Change a highlight color, reverting if the store refuses
    pub fn recolor(
        &mut self,
        id: CommentId,
        color: &str,
        store: &mut dyn CommentStore,
    ) -> Result<(), StoreError> {
        let previous = self.set_local_color(id, color.to_string());
        self.request_full_frame();

        if let Err(err) = store.update(id, CommentPatch::color(color)) {
            tracing::warn!(%id, error = %err, "color change rejected, reverting");
            if let Some(previous) = previous {
                self.set_local_color(id, previous);
            }
            return Err(err);
        }
        Ok(())
    }

    fn set_local_color(&mut self, id: CommentId, color: String) -> Option<String> {
        let annotation = self
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .and_then(|c| c.annotation.as_mut())?;
        Some(std::mem::replace(&mut annotation.color, color))
    }

    pub fn delete_comment(
        &mut self,
        id: CommentId,
        store: &mut dyn CommentStore,
    ) -> Result<(), StoreError> {
        store.delete(id).inspect_err(|err| {
            tracing::warn!(%id, error = %err, "comment delete rejected");
        })?;
        self.comments.retain(|c| c.id != id);
        self.states.remove(id);
        self.heights.forget(id);
        self.request_full_frame();
        Ok(())
    }

    /// Create a comment on the current selection
    ///
    /// Returns `Ok(None)` when the selection yields no boxes.
    pub fn create_from_selection(
        &mut self,
        selection: &SelectionRange,
        author: CommentUser,
        content: &str,
        store: &mut dyn CommentStore,
        timestamp: i64,
    ) -> Result<Option<CommentId>, StoreError> {
        let Some(annotation) = draft_annotation(
            selection,
            &self.host,
            &self.config.selection_options(),
            DEFAULT_HIGHLIGHT_COLOR,
            timestamp,
        ) else {
            return Ok(None);
        };

        let id = store.create(NewComment::on_annotation(author, content, annotation))?;
        self.refresh_from_store(store);
        Ok(Some(id))
    }

    /// Fetch and attach replies; returns how many were loaded
    pub fn load_replies(
        &mut self,
        id: CommentId,
        store: &dyn CommentStore,
    ) -> Result<usize, StoreError> {
        let replies = store.load_replies(id)?;
        let count = replies.len();
        if let Some(comment) = self.comments.iter_mut().find(|c| c.id == id) {
            comment.num_replies = count as u32;
            comment.replies = Some(replies);
        }
        Ok(count)
    }

    pub fn set_self_id(&mut self, user_id: Option<UserId>) {
        self.self_id = user_id;
    }

    pub fn receive_cursor(&mut self, update: CursorUpdate, now: u64) {
        self.presence.upsert(update, now);
        self.request_frame();
    }

    pub fn set_active_users(&mut self, users: Vec<ActiveUser>) {
        self.presence.set_active_users(users);
        self.request_frame();
    }

    /// A remote user left the document
    pub fn user_left(&mut self, user_id: UserId) {
        if self.presence.remove_user(user_id).is_some() {
            tracing::debug!(user = user_id, "presence user left");
        }
        self.request_frame();
    }

    pub fn presence(&self) -> &PresenceOverlay {
        &self.presence
    }

    /// Forward a local pointer move to the presence channel
    pub fn pointer_moved(
        &mut self,
        position: Point,
        now: u64,
        channel: &mut dyn PresenceChannel,
    ) -> bool {
        self.broadcaster.broadcast(position, &self.host, now, channel)
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.broadcaster.set_view_mode(view_mode);
    }

    pub fn set_cursor_sharing(&mut self, sharing: bool) {
        self.broadcaster.set_sharing(sharing);
    }
}

fn pages_ready(geometry: &dyn PageGeometry, comments: &[Comment]) -> bool {
    comments
        .iter()
        .filter_map(|c| c.annotation.as_ref()?.first_box())
        .all(|first| {
            geometry
                .page_frame(first.page_number)
                .is_some_and(|frame| frame.is_rendered())
        })
}
