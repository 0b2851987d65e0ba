mod env;
pub mod http;
pub mod preview;
