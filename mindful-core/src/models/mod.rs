mod diary;
mod enrollment;
mod program;
mod questionnaire;
mod session;
mod stats;
mod user;

pub use diary::*;
pub use enrollment::*;
pub use program::*;
pub use questionnaire::*;
pub use session::*;
pub use stats::*;
pub use user::*;
