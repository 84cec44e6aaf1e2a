//! In-memory SQLite setup shared by database and scheduler tests.

use super::repo::Repo;
use anyhow::Result;
use sea_orm::{ConnectionTrait, Database, DbBackend, Statement};

/// Create an in-memory database with the full schema. Tables are created
/// directly since migrations are not available in tests.
pub async fn setup_test_db() -> Result<Repo> {
    let db = Database::connect("sqlite::memory:").await?;

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"
        CREATE TABLE users (
            id INTEGER PRIMARY KEY NOT NULL,
            username TEXT,
            notifications_enabled BOOLEAN NOT NULL DEFAULT 1,
            country TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            ticketmaster_enabled BOOLEAN NOT NULL DEFAULT 1,
            spotify_enabled BOOLEAN NOT NULL DEFAULT 1,
            setlistfm_enabled BOOLEAN NOT NULL DEFAULT 1
        )
        "#,
    ))
    .await?;

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"
        CREATE TABLE artists (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            name TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            mbid TEXT,
            country TEXT,
            formed_year INTEGER,
            ended_year INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    ))
    .await?;

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"
        CREATE TABLE subscriptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            user_id INTEGER NOT NULL,
            artist_id INTEGER NOT NULL,
            notify BOOLEAN NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE ON UPDATE CASCADE,
            FOREIGN KEY (artist_id) REFERENCES artists(id) ON DELETE CASCADE ON UPDATE CASCADE,
            UNIQUE(user_id, artist_id)
        )
        "#,
    ))
    .await?;

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"
        CREATE TABLE concerts (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            artist_id INTEGER NOT NULL,
            identity_hash TEXT NOT NULL UNIQUE,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            venue TEXT NOT NULL,
            city TEXT NOT NULL,
            country TEXT NOT NULL,
            date TEXT NOT NULL,
            time TEXT NOT NULL,
            url TEXT NOT NULL,
            service TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (artist_id) REFERENCES artists(id) ON DELETE CASCADE ON UPDATE CASCADE
        )
        "#,
    ))
    .await?;

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"
        CREATE TABLE notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
            user_id INTEGER NOT NULL,
            concert_id INTEGER NOT NULL,
            sent_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE ON UPDATE CASCADE,
            FOREIGN KEY (concert_id) REFERENCES concerts(id) ON DELETE CASCADE ON UPDATE CASCADE,
            UNIQUE(user_id, concert_id)
        )
        "#,
    ))
    .await?;

    Ok(Repo::new(db))
}
