mod doctor;
mod init;
pub mod oneshot;

pub use doctor::run_doctor;
pub use init::run_init;
