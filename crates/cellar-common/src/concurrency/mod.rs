mod shared;

pub use shared::SharedHandle;
