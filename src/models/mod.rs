//! All the database models live here.

pub use game::*;
pub use otp::*;
pub use pair::*;
pub use partner::*;
pub use user::*;

mod game;
mod otp;
mod pair;
mod partner;
mod user;
