pub mod debounce;
pub mod signals;
pub mod watcher;
