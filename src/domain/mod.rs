pub mod booking;
pub mod catalog;
pub mod checkout;
pub mod milestone;
pub mod payment;
pub mod user;

pub use booking::*;
pub use catalog::*;
pub use checkout::*;
pub use milestone::*;
pub use payment::*;
pub use user::*;
