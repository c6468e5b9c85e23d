//! Workflow engine for the payment terminal device abstraction layer.
//!
//! This crate runs requests against discovered terminals: the transition
//! table and initial state selection, the sub-workflow controller and its
//! action registry, the cancellation broker that bounds every device call,
//! and the session that owns the target device set.
//!
//! Actions run one at a time per controller. Device failures never escape
//! as errors; they become per-device error responses on the published
//! request.

pub mod actions;
pub mod broker;
pub mod context;
pub mod controller;
pub mod error;
pub mod loader;
pub mod publisher;
pub mod session;
pub mod sftp;
pub mod state;
pub mod store;

pub use actions::{ActionSignal, LaunchRules, SubStateAction, create_action};
pub use broker::{BrokerOutcome, CancellationBroker};
pub use context::{DeviceHandle, TargetDeviceSet, WorkflowContext, WorkflowContextBuilder};
pub use controller::{DiscoveryReport, SubWorkflowController, WorkflowReport};
pub use error::{Result, StateException, WorkflowError};
pub use loader::{DeviceLoader, ManifestDeviceLoader, StaticDeviceLoader};
pub use publisher::{ChannelPublisher, MemoryPublisher, ResponsePublisher};
pub use session::DalSession;
pub use sftp::{ProcessUploadLauncher, SftpHandoff, UploadLauncher};
pub use state::{SubWorkflowState, initial_state, next_state};
pub use store::{JsonFileStateStore, MemoryStateStore, StateStore};
