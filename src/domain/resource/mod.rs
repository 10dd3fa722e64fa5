pub mod compute;
pub mod host;
pub mod link;
pub mod vm;
