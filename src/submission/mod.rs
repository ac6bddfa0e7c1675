//! Outbound delivery to workflow webhooks
//!
//! - `SubmissionPayload`: metadata fields plus binary parts, sent as multipart
//! - `WebhookClient`: posts payloads, tolerating one legacy non-2xx status
//! - `SubmissionAssembler`: dictation and case-observation flows

mod assembler;
mod client;
mod payload;

pub use assembler::{CaseObservation, DictationKind, SubmissionAssembler, SubmissionReceipt};
pub use client::{Delivery, WebhookClient, DEFAULT_SOFT_SUCCESS_STATUS};
pub use payload::{BinaryPart, ImageFile, SubmissionPayload};
