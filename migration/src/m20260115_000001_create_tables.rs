use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table (keyed by the Telegram chat id)
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Username).string())
                    .col(
                        ColumnDef::new(Users::NotificationsEnabled)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Users::Country).string())
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create artists table
        manager
            .create_table(
                Table::create()
                    .table(Artists::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Artists::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Artists::Name).string().not_null())
                    .col(ColumnDef::new(Artists::DisplayName).string().not_null())
                    .col(ColumnDef::new(Artists::Mbid).string())
                    .col(ColumnDef::new(Artists::Country).string())
                    .col(ColumnDef::new(Artists::FormedYear).integer())
                    .col(ColumnDef::new(Artists::EndedYear).integer())
                    .col(
                        ColumnDef::new(Artists::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Artists are shared across users, identity is the normalized name
        manager
            .create_index(
                Index::create()
                    .name("idx_artists_name_unique")
                    .table(Artists::Table)
                    .col(Artists::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create subscriptions table
        manager
            .create_table(
                Table::create()
                    .table(Subscriptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subscriptions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::ArtistId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::Notify)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Subscriptions::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscriptions_user")
                            .from(Subscriptions::Table, Subscriptions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subscriptions_artist")
                            .from(Subscriptions::Table, Subscriptions::ArtistId)
                            .to(Artists::Table, Artists::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Following twice must collapse to one row
        manager
            .create_index(
                Index::create()
                    .name("idx_subscriptions_user_artist_unique")
                    .table(Subscriptions::Table)
                    .col(Subscriptions::UserId)
                    .col(Subscriptions::ArtistId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create concerts table (append-only)
        manager
            .create_table(
                Table::create()
                    .table(Concerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Concerts::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Concerts::ArtistId).integer().not_null())
                    .col(ColumnDef::new(Concerts::IdentityHash).string().not_null())
                    .col(ColumnDef::new(Concerts::Artist).string().not_null())
                    .col(ColumnDef::new(Concerts::Title).string().not_null())
                    .col(ColumnDef::new(Concerts::Venue).string().not_null())
                    .col(ColumnDef::new(Concerts::City).string().not_null())
                    .col(ColumnDef::new(Concerts::Country).string().not_null())
                    .col(ColumnDef::new(Concerts::Date).string().not_null())
                    .col(ColumnDef::new(Concerts::Time).string().not_null())
                    .col(ColumnDef::new(Concerts::Url).string().not_null())
                    .col(ColumnDef::new(Concerts::Service).string().not_null())
                    .col(
                        ColumnDef::new(Concerts::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_concerts_artist")
                            .from(Concerts::Table, Concerts::ArtistId)
                            .to(Artists::Table, Artists::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // The identity hash is the dedup key, uniqueness here is the
        // correctness mechanism for store_if_new
        manager
            .create_index(
                Index::create()
                    .name("idx_concerts_identity_hash_unique")
                    .table(Concerts::Table)
                    .col(Concerts::IdentityHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create notifications table (append-only)
        manager
            .create_table(
                Table::create()
                    .table(Notifications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notifications::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Notifications::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Notifications::ConcertId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Notifications::SentAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_user")
                            .from(Notifications::Table, Notifications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_concert")
                            .from(Notifications::Table, Notifications::ConcertId)
                            .to(Concerts::Table, Concerts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one notification per (user, concert), ever
        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_user_concert_unique")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::ConcertId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Concerts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Artists::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Username,
    NotificationsEnabled,
    Country,
    CreatedAt,
}

#[derive(Iden)]
enum Artists {
    Table,
    Id,
    Name,
    DisplayName,
    Mbid,
    Country,
    FormedYear,
    EndedYear,
    CreatedAt,
}

#[derive(Iden)]
enum Subscriptions {
    Table,
    Id,
    UserId,
    ArtistId,
    Notify,
    CreatedAt,
}

#[derive(Iden)]
enum Concerts {
    Table,
    Id,
    ArtistId,
    IdentityHash,
    Artist,
    Title,
    Venue,
    City,
    Country,
    Date,
    Time,
    Url,
    Service,
    CreatedAt,
}

#[derive(Iden)]
enum Notifications {
    Table,
    Id,
    UserId,
    ConcertId,
    SentAt,
}
