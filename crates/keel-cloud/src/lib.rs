//! Rack-facing half of keel: the rack build API, build orchestration, and
//! release storage and promotion on AWS.
//!
//! Every remote collaborator sits behind a trait ([`RackApi`],
//! [`RecordStore`], [`StackService`], [`AwsExecutor`]) so the orchestration
//! logic can be driven by fakes in tests.

pub mod aws;
pub mod build;
pub mod executor;
pub mod http;
pub mod promote;
pub mod rack;
pub mod release;
pub mod stack;
pub mod store;
pub mod upload;

pub use aws::AwsError;
pub use build::{
    BuildError, BuildOrchestrator, BuildOutcome, BuildRequest, MIN_INCREMENTAL_VERSION,
    PollPolicy, SourceStrategy, is_remote_url, select_strategy,
};
pub use executor::{AwsExecutor, RealExecutor};
pub use http::HttpRack;
pub use promote::{PromoteError, Promotion, ReleasePromoter, with_release};
pub use rack::{
    AppInfo, AppStatus, BuildOptions, BuildPhase, BuildSource, LogSink, PhaseFn, Progress,
    ProgressFn, RackApi, RackError, SystemInfo, no_phases, no_progress,
};
pub use release::{CREATED_INDEX, RELEASE_PAGE_SIZE, ReleaseError, ReleaseStore};
pub use stack::{CloudFormation, StackError, StackService};
pub use store::{Attributes, DynamoTable, IndexQuery, RecordStore, StoreError};
pub use upload::{IndexUploader, UploadError, UploadReport};
