use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Telegram bot error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("Provider error: {0}")]
    Provider(#[from] concert_client::Error),

    /// A NotificationRecord already exists for this (user, concert) pair.
    /// Callers treat this as a no-op, the unique index already did its job.
    #[error("Notification already recorded for user {user_id}, concert {concert_id}")]
    DuplicateNotification { user_id: i64, concert_id: i32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type AppResult<T> = std::result::Result<T, AppError>;
