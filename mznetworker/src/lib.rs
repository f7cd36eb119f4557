mod driver;

pub use driver::{MZNetworker, MZNetworkerError};
