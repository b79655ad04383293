//! Delivery-mode mapping and the `messageKey` fingerprint used to match
//! inbound `userMessage` echoes back to the pending delivery that caused
//! them.

use hive_core::ids::DeliveryId;
use hive_core::model::Attachment;
use sha2::{Digest, Sha256};

/// How a caller wants a message delivered, before the runtime resolves it
/// against its current status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Start a new turn. Requires the runtime to be `Idle`.
    Prompt,
    /// Enqueue into the currently active turn.
    Steer,
    /// `Prompt` if `Idle`, otherwise `Steer`.
    Auto,
    /// Treated as `Auto` here; callers with their own concurrency policy
    /// may choose to collapse this to `Steer` themselves before calling in.
    FollowUp,
}

/// The mode a delivery actually resolved to, echoed back to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedMode {
    Prompt,
    Steer,
}

/// What `sendMessage` hands back to its caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendReceipt {
    pub delivery_id: DeliveryId,
    pub mode: ResolvedMode,
}

/// Deterministic fingerprint of normalized message text plus image
/// attachments, used to correlate a queued delivery with the `userMessage`
/// item the child eventually echoes back. Non-image attachments don't
/// appear in the child's echo, so only text and image content feed the
/// hash.
#[must_use]
pub fn message_key(text: &str, attachments: &[Attachment]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    for attachment in attachments {
        if let Attachment::Image { mime, base64 } = attachment {
            hasher.update(b"|image|");
            hasher.update(mime.as_bytes());
            hasher.update(b"|");
            hasher.update(base64.len().to_le_bytes());
            hasher.update(b"|");
            hasher.update(&base64.as_bytes()[..base64.len().min(24)]);
        }
    }
    format!("{:x}", hasher.finalize())
}
