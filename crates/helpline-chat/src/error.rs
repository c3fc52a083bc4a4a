use helpline_crypto::CodecError;
use helpline_db::StoreError;
use helpline_types::models::AdminType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Room creation requested for a type with no registered admin.
    /// Fatal to the request; the message is user-visible.
    #[error("no admin available for {0}")]
    NoAdminAvailable(AdminType),

    /// Admin-side lookup of a room that does not exist. Admins never
    /// auto-create rooms.
    #[error("no chat room exists")]
    RoomNotFound,

    /// Corrupt or tampered ciphertext. Fatal to the whole read; a partially
    /// decrypted page would misrepresent history.
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored row failed to parse back into its model type.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;
