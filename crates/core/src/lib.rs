pub mod config;
pub mod console;
pub mod domain;
pub mod errors;
pub mod extraction;
pub mod runner;
pub mod session;
pub mod templates;

pub use console::{
    CaptureGuard, CaptureLog, Console, ConsoleError, DetachedInput, InputGuard, InputSource,
    MemorySink, OutputSink, StatusSender, StdinInput, StdoutSink, TracingSink,
};
pub use domain::lookup::{LookupOutcome, LookupRequest};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use extraction::{extract_reference, ReferenceMatch};
pub use runner::{LookupAutomation, LookupRunner, RunnerLimits};
pub use session::{PollOutcome, SessionHandle, SessionId, SessionStore, StoreError};
pub use templates::{CustomerData, EmailTemplate, LoanStage, RenderedEmail, TemplateCatalog};
