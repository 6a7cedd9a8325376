pub mod history_repository;
pub mod mirror_repository;
pub mod quiz_repository;
pub mod session_repository;
pub mod team_repository;

pub use history_repository::{HistoryRepository, RoundRecord};
pub use mirror_repository::MirrorRepository;
pub use quiz_repository::{Quiz, QuizRepository};
pub use session_repository::SessionRepository;
pub use team_repository::TeamRepository;
