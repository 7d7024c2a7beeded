pub mod event;
pub mod order;
pub mod requests;
pub mod response;
