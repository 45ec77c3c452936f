pub mod camp;
pub mod registration;
pub mod payment;
pub mod user;
pub mod feedback;
pub mod stats;

pub use camp::*;
pub use registration::*;
pub use payment::*;
pub use user::*;
pub use feedback::*;
pub use stats::*;
