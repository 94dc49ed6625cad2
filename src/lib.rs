pub mod codec;
pub mod config;
pub mod cors;
pub mod dispatcher;
pub mod exception;
pub mod logging;
pub mod param;
pub mod request;
pub mod response;
pub mod server;
pub mod storage;
pub mod store;
pub mod student;

pub use config::Config;
pub use cors::{Cors, CorsConfig};
pub use dispatcher::Dispatcher;
pub use exception::Exception;
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use response::Response;
pub use server::Server;
pub use storage::StudentsStorage;
pub use store::StudentsDb;
pub use student::Student;
