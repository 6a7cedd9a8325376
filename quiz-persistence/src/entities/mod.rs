pub mod active_rooms;
pub mod game_sessions;
pub mod quizzes;
pub mod round_history;
pub mod team_members;

pub mod prelude {
    pub use super::active_rooms::Entity as ActiveRooms;
    pub use super::game_sessions::Entity as GameSessions;
    pub use super::quizzes::Entity as Quizzes;
    pub use super::round_history::Entity as RoundHistory;
    pub use super::team_members::Entity as TeamMembers;
}
