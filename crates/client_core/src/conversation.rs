use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use shared::{domain::UserId, protocol::ChatMessage};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{info, warn};

use crate::{best_effort::spawn_best_effort, ApiClient};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Lifecycle of one open conversation screen. There is no error state: a
/// failed cycle still lands in `Synced` with whatever data survived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Loading,
    Synced,
}

/// The client's reconciled view of a two-party thread. Replaced wholesale
/// on every poll tick; the remote response is authoritative except that a
/// locally-seen message is never demoted back to unseen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationView {
    pub other_party_id: Option<UserId>,
    pub messages: Vec<ChatMessage>,
    pub blocked_by_me: bool,
    pub blocked_by_other: bool,
    pub is_online: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl ConversationView {
    pub fn unread_count(&self, self_id: UserId) -> usize {
        self.messages
            .iter()
            .filter(|m| m.receiver_id == self_id && !m.seen)
            .count()
    }
}

/// Background sync never surfaces errors; the only signal the UI receives
/// is a fresh view snapshot.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    ViewUpdated(ConversationView),
}

#[derive(Debug, Error)]
pub enum SendMessageError {
    #[error("message text is empty")]
    EmptyMessage,
    #[error("no conversation partner selected")]
    MissingRecipient,
    #[error("this member is not accepting your messages")]
    BlockedByOther,
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

struct SyncInner {
    phase: SyncPhase,
    view: ConversationView,
    draft: String,
    moderation_busy: bool,
    /// Highest cycle whose results have been committed. A slower, older
    /// cycle resolving after a newer one must not overwrite its state.
    committed_cycle: u64,
}

/// Polling synchronizer for one (self, peer) conversation. Owns the repeat
/// timer while the screen is open; closing aborts the timer and turns any
/// in-flight cycle's resolution into a no-op.
pub struct ConversationSync {
    api: Arc<ApiClient>,
    self_id: UserId,
    other_id: Option<UserId>,
    poll_interval: Duration,
    page_size: u32,
    inner: Mutex<SyncInner>,
    cycle_counter: AtomicU64,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SyncEvent>,
}

impl ConversationSync {
    pub fn new(api: Arc<ApiClient>, self_id: UserId, other_id: Option<UserId>) -> Arc<Self> {
        Self::with_options(api, self_id, other_id, DEFAULT_POLL_INTERVAL, DEFAULT_PAGE_SIZE)
    }

    pub fn with_options(
        api: Arc<ApiClient>,
        self_id: UserId,
        other_id: Option<UserId>,
        poll_interval: Duration,
        page_size: u32,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            api,
            self_id,
            other_id,
            poll_interval,
            page_size,
            inner: Mutex::new(SyncInner {
                phase: SyncPhase::Idle,
                view: ConversationView::default(),
                draft: String::new(),
                moderation_busy: false,
                committed_cycle: 0,
            }),
            cycle_counter: AtomicU64::new(0),
            poll_task: Mutex::new(None),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ConversationView {
        self.inner.lock().await.view.clone()
    }

    pub async fn phase(&self) -> SyncPhase {
        self.inner.lock().await.phase
    }

    pub async fn set_draft(&self, text: impl Into<String>) {
        self.inner.lock().await.draft = text.into();
    }

    pub async fn draft(&self) -> String {
        self.inner.lock().await.draft.clone()
    }

    /// Opens the conversation: runs the initial load, then keeps re-syncing
    /// on the poll interval until `close` is called.
    pub async fn open(self: &Arc<Self>) {
        {
            let mut inner = self.inner.lock().await;
            if inner.phase != SyncPhase::Idle {
                return;
            }
            inner.phase = SyncPhase::Loading;
        }

        self.run_cycle().await;

        let sync = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(sync.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial load above
            // already covered it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sync.run_cycle().await;
            }
        });
        *self.poll_task.lock().await = Some(handle);
    }

    /// Tears the screen down. In-flight requests are left to resolve but
    /// their results are discarded.
    pub async fn close(&self) {
        if let Some(handle) = self.poll_task.lock().await.take() {
            handle.abort();
        }
        self.inner.lock().await.phase = SyncPhase::Idle;
    }

    /// One full sync cycle: fetch the thread, the block relation and the
    /// presence snapshot concurrently, then commit whatever succeeded.
    /// Individual failures degrade their facet; the cycle always ends in
    /// `Synced`.
    async fn run_cycle(&self) {
        let Some(other_id) = self.other_id else {
            return;
        };
        let cycle = self.cycle_counter.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut inner = self.inner.lock().await;
            if inner.phase == SyncPhase::Idle {
                return;
            }
            inner.phase = SyncPhase::Loading;
        }

        let (messages, block_status, online) = tokio::join!(
            self.api
                .conversation_page(self.self_id, other_id, 0, self.page_size),
            self.api.block_status(self.self_id, other_id),
            self.api.online_users(),
        );

        let mut inner = self.inner.lock().await;
        if inner.phase == SyncPhase::Idle {
            return;
        }
        if cycle <= inner.committed_cycle {
            info!(
                cycle,
                committed = inner.committed_cycle,
                "conversation sync: dropping stale cycle result"
            );
            return;
        }
        inner.committed_cycle = cycle;

        match messages {
            Ok(fetched) => {
                let merged = reconcile_seen(&inner.view.messages, fetched);
                inner.view.messages = merged;
            }
            Err(err) => warn!("conversation sync: message fetch failed: {err}"),
        }
        match block_status {
            Ok(status) => {
                inner.view.blocked_by_me = status.blocked_by_me;
                inner.view.blocked_by_other = status.blocked_by_other;
            }
            Err(err) => warn!("conversation sync: block status fetch failed: {err}"),
        }
        inner.view.is_online = match online {
            Ok(ids) => ids.contains(&other_id),
            Err(err) => {
                warn!("conversation sync: presence fetch failed: {err}");
                false
            }
        };
        inner.view.other_party_id = Some(other_id);
        inner.view.last_synced_at = Some(Utc::now());
        inner.phase = SyncPhase::Synced;

        let has_inbound_unseen = inner
            .view
            .messages
            .iter()
            .any(|m| m.sender_id == other_id && m.receiver_id == self.self_id && !m.seen);
        let view = inner.view.clone();
        drop(inner);

        if has_inbound_unseen {
            let api = Arc::clone(&self.api);
            let (other, me) = (other_id, self.self_id);
            spawn_best_effort("mark conversation seen", async move {
                api.mark_conversation_seen(other, me).await
            });
        }

        let _ = self.events.send(SyncEvent::ViewUpdated(view));
    }

    /// Sends the current draft. Rejected locally, with the draft kept, when
    /// the text is blank, no peer is selected, or the peer has blocked us.
    /// On success the draft clears and the thread is re-fetched; there is
    /// no optimistic append.
    pub async fn send_draft(&self) -> Result<(), SendMessageError> {
        let Some(other_id) = self.other_id else {
            return Err(SendMessageError::MissingRecipient);
        };
        let text = {
            let inner = self.inner.lock().await;
            if inner.view.blocked_by_other {
                return Err(SendMessageError::BlockedByOther);
            }
            inner.draft.clone()
        };
        if text.trim().is_empty() {
            return Err(SendMessageError::EmptyMessage);
        }

        if let Err(err) = self
            .api
            .send_chat_message(self.self_id, other_id, &text)
            .await
        {
            warn!("conversation sync: send failed, draft preserved: {err}");
            return Err(SendMessageError::Transport(err));
        }

        self.inner.lock().await.draft.clear();
        self.run_cycle().await;
        Ok(())
    }

    /// Blocks the peer. Guarded against duplicate taps; the local flag
    /// flips only after the server confirms.
    pub async fn block_other(&self) {
        let Some(other_id) = self.other_id else {
            return;
        };
        if !self.begin_moderation().await {
            return;
        }
        match self.api.block_user(self.self_id, other_id).await {
            Ok(()) => self.inner.lock().await.view.blocked_by_me = true,
            Err(err) => warn!("conversation sync: block failed: {err}"),
        }
        self.end_moderation().await;
    }

    pub async fn unblock_other(&self) {
        let Some(other_id) = self.other_id else {
            return;
        };
        if !self.begin_moderation().await {
            return;
        }
        match self.api.unblock_user(self.self_id, other_id).await {
            Ok(()) => self.inner.lock().await.view.blocked_by_me = false,
            Err(err) => warn!("conversation sync: unblock failed: {err}"),
        }
        self.end_moderation().await;
    }

    pub async fn report_other(&self) {
        let Some(other_id) = self.other_id else {
            return;
        };
        if !self.begin_moderation().await {
            return;
        }
        match self.api.report_user(self.self_id, other_id).await {
            Ok(()) => info!(
                reported = other_id.0,
                "conversation sync: report submitted"
            ),
            Err(err) => warn!("conversation sync: report failed: {err}"),
        }
        self.end_moderation().await;
    }

    pub async fn clear_chat(&self) {
        let Some(other_id) = self.other_id else {
            return;
        };
        if !self.begin_moderation().await {
            return;
        }
        match self.api.clear_chat(self.self_id, other_id).await {
            Ok(()) => self.inner.lock().await.view.messages.clear(),
            Err(err) => warn!("conversation sync: clear chat failed: {err}"),
        }
        self.end_moderation().await;
    }

    async fn begin_moderation(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.moderation_busy {
            info!("conversation sync: moderation request ignored while another is in flight");
            return false;
        }
        inner.moderation_busy = true;
        true
    }

    async fn end_moderation(&self) {
        self.inner.lock().await.moderation_busy = false;
    }
}

/// Carries local seen-state forward into a freshly fetched thread: a
/// message previously marked seen stays seen even when the remote copy
/// still says otherwise. Messages have no server id, so rows are matched
/// by sender, timestamp and text.
fn reconcile_seen(previous: &[ChatMessage], mut incoming: Vec<ChatMessage>) -> Vec<ChatMessage> {
    for message in &mut incoming {
        if message.seen {
            continue;
        }
        let was_seen = previous.iter().any(|earlier| {
            earlier.seen
                && earlier.sender_id == message.sender_id
                && earlier.timestamp == message.timestamp
                && earlier.message == message.message
        });
        if was_seen {
            message.seen = true;
        }
    }
    incoming
}

#[cfg(test)]
#[path = "tests/conversation_tests.rs"]
mod tests;
