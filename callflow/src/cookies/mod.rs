//! Client cookie matching and storage.

mod cookie;
mod storage;

pub use cookie::{Cookie, CookieError, RequestUrl, UrlProtocol};
pub use storage::{AcceptAllCookiesStorage, CookiesStorage};
