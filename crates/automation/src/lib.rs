//! Lookup automations - the procedures a lookup worker runs.
//!
//! The runner in `loandesk-core` treats an automation as opaque: it hands it a
//! [`Console`](loandesk_core::Console), answers its prompts and scans whatever
//! it prints for a CRM reference. This crate provides the concrete automation
//! used in production:
//!
//! - [`CustomerLookupAgent`] (`lookup`) - signs in to the bank's CRM portal,
//!   finds the customer and prints the reference sentence
//! - [`CrmPortal`] (`portal`) - pluggable portal client; [`HttpCrmPortal`]
//!   speaks the portal's form login and JSON customer API
//! - [`RetryPolicy`] (`retry`) - exponential backoff around portal calls
//!
//! Credentials only ever arrive through the console and are held as
//! `SecretString` from that point on.

pub mod lookup;
pub mod portal;
pub mod retry;

pub use lookup::CustomerLookupAgent;
pub use portal::{CrmCustomer, CrmPortal, CrmSession, HttpCrmPortal, PortalError};
pub use retry::RetryPolicy;
