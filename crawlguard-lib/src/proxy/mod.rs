pub mod forwarding;
pub mod http_result;
pub mod server;
mod synthetic_response;

pub use http_result::HttpError;
pub use server::{run, serve};
