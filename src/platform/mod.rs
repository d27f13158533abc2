#[cfg(unix)]
pub(crate) mod posix;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub mod linux;
        pub use self::linux::*;
    }
}
