pub mod reboot;
pub mod watch;
