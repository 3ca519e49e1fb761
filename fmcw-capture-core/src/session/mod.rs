pub mod callback;
pub mod capture;
pub mod context;
pub mod shutdown;
