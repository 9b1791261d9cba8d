use thiserror::Error;

use super::ClipboardError;

/// Reasons a widget operation was refused or failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WidgetError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("a reply is still streaming")]
    Busy,

    #[error("message repeats the previous one")]
    DuplicateMessage,

    #[error("message {0} cannot be copied")]
    NotCopyable(usize),

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}
