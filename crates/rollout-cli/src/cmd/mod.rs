pub mod cleanup;
pub mod deploy;
pub mod status;
