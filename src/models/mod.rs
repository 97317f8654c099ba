pub mod actor;
pub mod driver;
pub mod event;
pub mod ids;
pub mod order;
