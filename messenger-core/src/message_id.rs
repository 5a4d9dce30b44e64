//! Message identifier and upload filename derivation.

use chrono::{DateTime, Utc};

use crate::message::MediaKind;

/// Separator between the parts of a message id
pub const ID_SEPARATOR: char = '_';

/// Second-granularity timestamp used inside message ids
const ID_TIMESTAMP_FORMAT: &str = "%b %-d, %Y at %-I:%M:%S %p UTC";

/// Length of the optional random suffix
const UNIQUE_SUFFIX_LEN: usize = 8;

/// Derive a message id from the peer, the sender and the send time.
///
/// Two messages from the same sender to the same peer within one second
/// collide. Use [`with_unique_suffix`] when that matters.
pub fn derive_message_id(peer: &str, safe_sender: &str, at: DateTime<Utc>) -> String {
    format!(
        "{peer}{sep}{safe_sender}{sep}{stamp}",
        sep = ID_SEPARATOR,
        stamp = at.format(ID_TIMESTAMP_FORMAT)
    )
}

/// Append a short random suffix to an id
pub fn with_unique_suffix(id: String) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}{}", id, ID_SEPARATOR, &suffix[..UNIQUE_SUFFIX_LEN])
}

/// Filename a media attachment is uploaded under
pub fn upload_filename(message_id: &str, kind: MediaKind) -> String {
    format!(
        "photo_message_{}.{}",
        message_id.replace(' ', "-"),
        kind.file_extension()
    )
}
