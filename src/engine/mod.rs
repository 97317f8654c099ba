pub mod audit;
pub mod availability;
pub mod lifecycle;
pub mod permissions;
pub mod policy;
pub mod pricing;
pub mod transitions;
