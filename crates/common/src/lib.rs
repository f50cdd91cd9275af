pub mod domain;
pub mod postgres;
pub mod telemetry;

// Re-export mocks when the testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockLiveUpdatePublisher;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockMessageStore;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockMessageWriter;
