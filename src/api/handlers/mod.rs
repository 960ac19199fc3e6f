pub mod admin;
pub mod auth;
pub mod bookings;
pub mod checkout;
pub mod payments;
pub mod root;
