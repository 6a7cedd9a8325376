use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GameSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GameSessions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GameSessions::QuizId).string().not_null())
                    .col(ColumnDef::new(GameSessions::HostId).string().not_null())
                    .col(ColumnDef::new(GameSessions::TeamId).string())
                    .col(ColumnDef::new(GameSessions::JoinCode).string().not_null())
                    .col(
                        ColumnDef::new(GameSessions::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(GameSessions::FinalStandings).text())
                    .col(
                        ColumnDef::new(GameSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(GameSessions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for looking sessions up by join code
        manager
            .create_index(
                Index::create()
                    .name("idx_game_sessions_join_code")
                    .table(GameSessions::Table)
                    .col(GameSessions::JoinCode)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoundHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RoundHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RoundHistory::SessionId).uuid().not_null())
                    .col(
                        ColumnDef::new(RoundHistory::QuestionIndex)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RoundHistory::UserId).string().not_null())
                    .col(ColumnDef::new(RoundHistory::Attempts).text().not_null())
                    .col(
                        ColumnDef::new(RoundHistory::WasCorrect)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(RoundHistory::ScoreDelta)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(RoundHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index for aggregating a session's history at finalization
        manager
            .create_index(
                Index::create()
                    .name("idx_round_history_session_id")
                    .table(RoundHistory::Table)
                    .col(RoundHistory::SessionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Quizzes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Quizzes::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Quizzes::Title).string().not_null())
                    .col(ColumnDef::new(Quizzes::Questions).text().not_null())
                    .col(
                        ColumnDef::new(Quizzes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TeamMembers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TeamMembers::TeamId).string().not_null())
                    .col(ColumnDef::new(TeamMembers::UserId).string().not_null())
                    .col(
                        ColumnDef::new(TeamMembers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(TeamMembers::TeamId)
                            .col(TeamMembers::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ActiveRooms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActiveRooms::JoinCode)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ActiveRooms::Payload).text().not_null())
                    .col(
                        ColumnDef::new(ActiveRooms::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActiveRooms::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TeamMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Quizzes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoundHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(GameSessions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum GameSessions {
    Table,
    Id,
    QuizId,
    HostId,
    TeamId,
    JoinCode,
    Status,
    FinalStandings,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RoundHistory {
    Table,
    Id,
    SessionId,
    QuestionIndex,
    UserId,
    Attempts,
    WasCorrect,
    ScoreDelta,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Quizzes {
    Table,
    Id,
    Title,
    Questions,
    CreatedAt,
}

#[derive(DeriveIden)]
enum TeamMembers {
    Table,
    TeamId,
    UserId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum ActiveRooms {
    Table,
    JoinCode,
    Payload,
    UpdatedAt,
}
