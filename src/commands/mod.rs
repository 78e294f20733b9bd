pub mod build;
pub mod deploy;
pub mod generate;
pub mod test_cmd;

pub use build::run_build;
pub use deploy::run_deploy;
pub use generate::run_generate;
pub use test_cmd::run_test;
