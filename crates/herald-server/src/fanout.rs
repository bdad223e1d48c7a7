//! Fan-out engine: distribute, retract, repost and mutate posts across a
//! list of already-authorized destinations.
//!
//! Destinations are processed one after another in the order given, each
//! attempt admitted by [`Admission`]. A failed destination never aborts the
//! pass. Content problems are caught before the first destination is
//! touched.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use herald_platform::{Platform, PlatformError};
use herald_shared::constants::{EMPTY_EDIT_PLACEHOLDER, MAX_CAPTION_LEN, MAX_TEXT_LEN};
use herald_shared::{ChatId, Content, ContentError, ContentKind, MessageId, MessageRef, PostId, UserId, UserSettings};
use herald_store::{Placement, Post, StoreError};

use crate::rate_limit::{Admission, AdmissionPolicy};
use crate::store::Store;

#[derive(Debug, Error)]
pub enum FanOutError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("Post not found: {0}")]
    PostNotFound(PostId),

    #[error("Post {0} belongs to another user")]
    NotAuthor(PostId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What happened at one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Delivered {
        chat: ChatId,
        message_id: MessageId,
        link: Option<String>,
    },
    Failed {
        chat: ChatId,
        reason: String,
    },
}

impl Outcome {
    pub fn chat(&self) -> ChatId {
        match self {
            Self::Delivered { chat, .. } | Self::Failed { chat, .. } => *chat,
        }
    }

    fn failed(chat: ChatId, error: &PlatformError) -> Self {
        Self::Failed {
            chat,
            reason: error.to_string(),
        }
    }
}

/// Result of a distribute or mutate pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanOutReport {
    /// Identity of the post record written for this pass.
    pub post_id: PostId,
    /// One entry per destination, in input order.
    pub outcomes: Vec<Outcome>,
    pub cooldowns: u32,
}

impl FanOutReport {
    pub fn delivered(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Delivered { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Failed { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetractReport {
    pub post_id: PostId,
    pub deleted: usize,
    /// Chats where the copy had already been removed by someone else.
    pub already_gone: Vec<ChatId>,
    pub failed: Vec<ChatId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepostReport {
    pub retracted: RetractReport,
    pub distributed: FanOutReport,
}

// ---------------------------------------------------------------------------
// Edit planning
// ---------------------------------------------------------------------------

/// Platform edit used on every placement of a post, chosen from the kind
/// the post was originally sent as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPath {
    Text,
    Caption,
    Media,
    ReplyMarkup,
}

/// Pick the edit path for replacing a post of `original` kind with
/// `replacement`, and reject combinations no destination could accept.
pub fn plan_edit(original: ContentKind, replacement: &Content) -> Result<EditPath, ContentError> {
    let new_payload = replacement.payload().is_some();
    let path = match original {
        ContentKind::VideoNote => return Err(ContentError::UneditableKind(original)),
        ContentKind::Sticker => EditPath::ReplyMarkup,
        ContentKind::Text if new_payload => EditPath::Media,
        ContentKind::Text => EditPath::Text,
        ContentKind::Photo
        | ContentKind::Video
        | ContentKind::Animation
        | ContentKind::Audio
        | ContentKind::Document
        | ContentKind::Voice => {
            if new_payload {
                EditPath::Media
            } else {
                EditPath::Caption
            }
        }
    };

    let len = replacement.text.chars().count();
    match path {
        EditPath::Media => {
            if replacement.kind.input_media_type().is_none() {
                return Err(ContentError::UnsupportedReplacement(replacement.kind));
            }
            if len > MAX_CAPTION_LEN {
                return Err(ContentError::CaptionTooLong { len, max: MAX_CAPTION_LEN });
            }
        }
        EditPath::Caption if len > MAX_CAPTION_LEN => {
            return Err(ContentError::CaptionTooLong { len, max: MAX_CAPTION_LEN });
        }
        EditPath::Text if len > MAX_TEXT_LEN => {
            return Err(ContentError::TextTooLong { len, max: MAX_TEXT_LEN });
        }
        _ => {}
    }
    Ok(path)
}

/// Content recorded for a post after an edit along `path`.
fn edited_content(old: &Content, new: &Content, path: EditPath) -> Content {
    match path {
        EditPath::Media => Content {
            source: None,
            ..new.clone()
        },
        EditPath::Text | EditPath::Caption => Content {
            kind: old.kind,
            file_id: old.file_id.clone(),
            text: new.text.clone(),
            buttons: new.buttons.clone(),
            source: None,
        },
        EditPath::ReplyMarkup => Content {
            buttons: new.buttons.clone(),
            source: None,
            ..old.clone()
        },
    }
}

fn non_empty(text: &str) -> &str {
    if text.is_empty() {
        EMPTY_EDIT_PLACEHOLDER
    } else {
        text
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct FanOut {
    platform: Arc<dyn Platform>,
    store: Store,
    send_policy: AdmissionPolicy,
    delete_policy: AdmissionPolicy,
}

impl FanOut {
    pub fn new(
        platform: Arc<dyn Platform>,
        store: Store,
        send_policy: AdmissionPolicy,
        delete_policy: AdmissionPolicy,
    ) -> Self {
        Self {
            platform,
            store,
            send_policy,
            delete_policy,
        }
    }

    /// Deliver `content` to every destination and record the result as a
    /// new post, even when nothing was delivered.
    pub async fn distribute(
        &self,
        author: UserId,
        destinations: &[ChatId],
        content: &Content,
        settings: &UserSettings,
    ) -> Result<FanOutReport, FanOutError> {
        content.validate()?;

        let post_id = PostId::generate();
        let forward_from = content.source.filter(|_| settings.forward_tag);
        let mut admission = self.send_policy.start();
        let mut outcomes = Vec::with_capacity(destinations.len());
        let mut placements = Vec::new();

        for &chat in destinations {
            admission.acquire().await;
            let sent = match forward_from {
                Some(source) => self.platform.forward(chat, source, settings).await,
                None => self.platform.send(chat, content, settings).await,
            };
            match sent {
                Ok(sent) => {
                    outcomes.push(Outcome::Delivered {
                        chat,
                        message_id: sent.message_id,
                        link: sent.link(),
                    });
                    placements.push(Placement {
                        chat_id: chat,
                        message_id: sent.message_id,
                        chat_handle: sent.chat_handle,
                    });
                }
                Err(e) => {
                    debug!(chat = %chat, error = %e, "Delivery failed");
                    outcomes.push(Outcome::failed(chat, &e));
                }
            }
        }

        let mut post = Post::new(post_id.clone(), author, Content { source: None, ..content.clone() });
        post.placements = placements;
        self.store.upsert_post(post).await?;

        let report = FanOutReport {
            post_id,
            outcomes,
            cooldowns: admission.cooldowns(),
        };
        info!(
            post = %report.post_id,
            author = %author,
            delivered = report.delivered().count(),
            failed = report.failed().count(),
            "Distributed post"
        );
        Ok(report)
    }

    /// Delete every placement of `post_id` and drop its record.
    pub async fn retract(&self, author: UserId, post_id: &PostId) -> Result<RetractReport, FanOutError> {
        let post = self.load(author, post_id).await?;
        Ok(self.retract_post(&post).await)
    }

    /// Store `content` as a post with no placements, to be sent later with
    /// [`FanOut::send`].
    pub async fn draft(&self, author: UserId, content: &Content) -> Result<Post, FanOutError> {
        content.validate()?;
        let post = Post::new(PostId::generate(), author, Content { source: None, ..content.clone() });
        self.store.upsert_post(post.clone()).await?;
        info!(post = %post.id, author = %author, kind = ?post.content.kind, "Drafted post");
        Ok(post)
    }

    /// Distribute the stored content of `post_id` as a new post.
    ///
    /// A draft record is superseded and dropped. A post that already has
    /// placements keeps its record so those copies stay retractable.
    pub async fn send(
        &self,
        author: UserId,
        post_id: &PostId,
        destinations: &[ChatId],
        settings: &UserSettings,
    ) -> Result<FanOutReport, FanOutError> {
        let stored = self.load(author, post_id).await?;
        let report = self
            .distribute(author, destinations, &stored.content, settings)
            .await?;
        if stored.placements.is_empty() {
            self.forget(&stored.id).await;
        }
        Ok(report)
    }

    /// Retract `old_id` and distribute `content` as a new post. Without
    /// `content` the old post's stored content is sent again.
    pub async fn repost(
        &self,
        author: UserId,
        old_id: &PostId,
        destinations: &[ChatId],
        content: Option<&Content>,
        settings: &UserSettings,
    ) -> Result<RepostReport, FanOutError> {
        let old = self.load(author, old_id).await?;
        let content = content.unwrap_or(&old.content).clone();
        content.validate()?;

        let retracted = self.retract_post(&old).await;
        let distributed = self.distribute(author, destinations, &content, settings).await?;
        Ok(RepostReport {
            retracted,
            distributed,
        })
    }

    /// Edit the placements of `old_id` that sit in `destinations` in place
    /// and record the edited post under a new identity.
    pub async fn mutate(
        &self,
        author: UserId,
        old_id: &PostId,
        destinations: &[ChatId],
        content: &Content,
        settings: &UserSettings,
    ) -> Result<FanOutReport, FanOutError> {
        let old = self.load(author, old_id).await?;
        let path = plan_edit(old.content.kind, content)?;

        let post_id = PostId::generate();
        let mut admission = self.send_policy.start();
        let mut outcomes = Vec::new();
        let mut placements = Vec::new();

        let targets = old
            .placements
            .iter()
            .filter(|p| destinations.contains(&p.chat_id));
        for placement in targets {
            admission.acquire().await;
            let target = MessageRef {
                chat_id: placement.chat_id,
                message_id: placement.message_id,
            };
            match self.apply_edit(path, target, content, settings).await {
                Ok(()) => {
                    outcomes.push(Outcome::Delivered {
                        chat: target.chat_id,
                        message_id: target.message_id,
                        link: placement.link(),
                    });
                    placements.push(placement.clone());
                }
                Err(e) => {
                    debug!(chat = %target.chat_id, error = %e, "Edit failed");
                    outcomes.push(Outcome::failed(target.chat_id, &e));
                }
            }
        }

        let mut post = Post::new(post_id.clone(), author, edited_content(&old.content, content, path));
        post.placements = placements;
        self.store.upsert_post(post).await?;
        self.forget(&old.id).await;

        let report = FanOutReport {
            post_id,
            outcomes,
            cooldowns: admission.cooldowns(),
        };
        info!(
            old = %old.id,
            post = %report.post_id,
            ?path,
            edited = report.delivered().count(),
            failed = report.failed().count(),
            "Edited post"
        );
        Ok(report)
    }

    async fn apply_edit(
        &self,
        path: EditPath,
        target: MessageRef,
        content: &Content,
        settings: &UserSettings,
    ) -> Result<(), PlatformError> {
        let text = non_empty(&content.text);
        match path {
            EditPath::Text => {
                self.platform
                    .edit_text(target, text, &content.buttons, settings)
                    .await
            }
            EditPath::Caption => {
                self.platform
                    .edit_caption(target, text, &content.buttons, settings)
                    .await
            }
            EditPath::Media => {
                let media = Content {
                    text: text.to_string(),
                    ..content.clone()
                };
                self.platform.edit_media(target, &media, settings).await
            }
            EditPath::ReplyMarkup => {
                self.platform
                    .edit_reply_markup(target, &content.buttons)
                    .await
            }
        }
    }

    async fn load(&self, author: UserId, post_id: &PostId) -> Result<Post, FanOutError> {
        let post = self
            .store
            .post(post_id.clone())
            .await?
            .ok_or_else(|| FanOutError::PostNotFound(post_id.clone()))?;
        if post.author != author {
            return Err(FanOutError::NotAuthor(post_id.clone()));
        }
        Ok(post)
    }

    async fn retract_post(&self, post: &Post) -> RetractReport {
        let mut admission: Admission = self.delete_policy.start();
        let mut deleted = 0;
        let mut already_gone = Vec::new();
        let mut failed = Vec::new();

        for placement in &post.placements {
            admission.acquire().await;
            let target = MessageRef {
                chat_id: placement.chat_id,
                message_id: placement.message_id,
            };
            match self.platform.delete(target).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_not_found() => already_gone.push(target.chat_id),
                Err(e) => {
                    debug!(chat = %target.chat_id, error = %e, "Delete failed");
                    failed.push(target.chat_id);
                }
            }
        }

        self.forget(&post.id).await;
        info!(
            post = %post.id,
            deleted,
            already_gone = already_gone.len(),
            failed = failed.len(),
            "Retracted post"
        );
        RetractReport {
            post_id: post.id.clone(),
            deleted,
            already_gone,
            failed,
        }
    }

    /// Drop a superseded record. Failure leaves an orphan and is only logged.
    async fn forget(&self, post_id: &PostId) {
        if let Err(e) = self.store.delete_post(post_id.clone()).await {
            warn!(post = %post_id, error = %e, "Failed to remove post record");
        }
    }
}
