pub mod sessionize;
pub mod source;
