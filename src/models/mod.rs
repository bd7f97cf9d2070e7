pub mod assignment;
pub mod fleet;
pub mod notification;
pub mod pairing;
pub mod trip;
