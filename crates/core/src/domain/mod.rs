pub mod booking;
pub mod review;
