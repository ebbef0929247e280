pub mod courier;
pub mod dispatch;
pub mod message;
pub mod order;
