// Platform-specific code module

pub mod command;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod host;
pub mod nvidia;
pub mod system;

// Re-exports for cleaner imports
#[cfg(any(test, feature = "testing"))]
pub use fake::{FakeHost, NativeFixture};
pub use host::{HostSource, InterfaceCounters, MountEntry, NativeCpu, NativeProcess};
pub use system::SystemHost;
