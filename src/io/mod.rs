pub mod bio;
pub mod bucket;
pub mod buf;
pub mod error;
