mod click;
mod url;

pub use click::{ClickEvent, NewClick};
pub use url::{UrlRecord, UrlStats};
