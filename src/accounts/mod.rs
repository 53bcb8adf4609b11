//! Account rules: template defaults, name guarding, conflict reconciliation
//! and bulk creation.

pub mod bulk;
pub mod naming;
pub mod reconcile;
pub mod service;
pub mod template;
pub mod view;

pub use bulk::{BulkResult, BulkState, BulkTarget, bulk_create};
pub use naming::{ensure_unique_name, with_random_suffix};
pub use reconcile::{AccountCandidate, Lookup, Outcome, find_existing, reconcile};
pub use service::{
    WriteControls, bulk_create_accounts, create_account, create_template, delete_template,
    templates_for_protocols, update_account,
};
pub use template::{ResolvedTemplate, TemplateRef, resolve};
pub use view::{AccountView, TemplateView};
