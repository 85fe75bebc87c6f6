mod authentication;
pub use authentication::{AdminKey, AuthenticationLayer, ADMIN_KEY_HEADER};

mod payload;
pub use payload::PayloadFormatter;
