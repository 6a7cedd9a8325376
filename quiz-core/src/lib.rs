pub mod mirror;
pub mod projector;
pub mod room;
pub mod rounds;
pub mod scoring;

// Re-export main components
pub use mirror::*;
pub use projector::*;
pub use room::*;
pub use rounds::*;
pub use scoring::*;
