use futures::future::join_all;
use tracing::{error, info};
use uuid::Uuid;

use super::client::{Delivery, WebhookClient};
use super::payload::{BinaryPart, ImageFile, SubmissionPayload};
use crate::audio::{merge_segments, AudioSegment, MergedAudio, SegmentStore};
use crate::config::EndpointsConfig;
use crate::counters::{word_count, Activity, CountersRecord, CountersService};
use crate::error::{IntakeError, Result};
use crate::session::{Identity, SessionContext};

/// Which audio webhook a dictation goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DictationKind {
    #[default]
    Normal,
    Test,
}

/// A structured case observation: free text and/or photos
#[derive(Debug, Clone, Default)]
pub struct CaseObservation {
    pub case_id: String,
    pub text: String,
    pub images: Vec<ImageFile>,
}

/// Outcome of a successful submission
#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub id: Uuid,
    /// (endpoint, how it was received) in dispatch order
    pub deliveries: Vec<(String, Delivery)>,
    /// Updated counters, if the best-effort update went through
    pub counters: Option<CountersRecord>,
    /// Merged dictation duration, for audio submissions
    pub duration_seconds: Option<f64>,
}

/// Builds outbound payloads and dispatches them
pub struct SubmissionAssembler {
    session: SessionContext,
    webhook: WebhookClient,
    endpoints: EndpointsConfig,
    counters: CountersService,
    audio_filename: String,
}

impl SubmissionAssembler {
    pub fn new(
        session: SessionContext,
        webhook: WebhookClient,
        endpoints: EndpointsConfig,
        counters: CountersService,
    ) -> Self {
        Self {
            session,
            webhook,
            endpoints,
            counters,
            audio_filename: "dictation.wav".to_string(),
        }
    }

    pub fn with_audio_filename(mut self, filename: impl Into<String>) -> Self {
        self.audio_filename = filename.into();
        self
    }

    /// Merge the stored segments and post them as one dictation
    pub async fn submit_dictation(
        &self,
        segments: &SegmentStore,
        patient_id: &str,
        kind: DictationKind,
    ) -> Result<SubmissionReceipt> {
        let identity = self.session.require_identity()?;
        let patient_id = patient_id.trim();
        if patient_id.is_empty() {
            return Err(IntakeError::Validation("patient id is required".to_string()));
        }
        if segments.is_empty() {
            return Err(IntakeError::NoAudioToMerge);
        }

        let id = Uuid::new_v4();
        let owned: Vec<AudioSegment> = segments.populated().into_iter().cloned().collect();
        let segment_count = owned.len();
        info!(%id, segments = segment_count, ?kind, "submitting dictation");

        let merged = tokio::task::spawn_blocking(move || {
            let refs: Vec<&AudioSegment> = owned.iter().collect();
            merge_segments(&refs)
        })
        .await
        .map_err(|e| IntakeError::Decode(format!("merge task failed: {}", e)))??;

        let payload = self.dictation_payload(&identity, patient_id, &merged, segment_count);
        let endpoint = match kind {
            DictationKind::Normal => &self.endpoints.audio_normal,
            DictationKind::Test => &self.endpoints.audio_test,
        };

        let delivery = self.webhook.post(endpoint, payload.to_form()?).await?;
        info!(%id, endpoint = %endpoint, "dictation delivered");

        let counters = self
            .counters
            .record_best_effort(
                &identity.uid,
                Activity::Dictation {
                    duration_seconds: merged.duration_seconds,
                },
            )
            .await;

        Ok(SubmissionReceipt {
            id,
            deliveries: vec![(endpoint.clone(), delivery)],
            counters,
            duration_seconds: Some(merged.duration_seconds),
        })
    }

    /// Post a case observation: one request for text, one for photos,
    /// dispatched concurrently. Any rejected request fails the submission;
    /// requests already accepted are not rolled back.
    pub async fn submit_case(&self, observation: CaseObservation) -> Result<SubmissionReceipt> {
        let identity = self.session.require_identity()?;
        let case_id = observation.case_id.trim().to_string();
        if case_id.is_empty() {
            return Err(IntakeError::Validation("case id is required".to_string()));
        }

        let has_text = !observation.text.trim().is_empty();
        if !has_text && observation.images.is_empty() {
            return Err(IntakeError::Validation(
                "a case needs text or at least one image".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let words = word_count(&observation.text);
        let text = has_text.then_some(observation.text.as_str());
        let requests = self.case_payloads(&identity, &case_id, text, observation.images);

        // Every form is built before the first request goes out
        let mut endpoints = Vec::with_capacity(requests.len());
        let mut forms = Vec::with_capacity(requests.len());
        for (endpoint, payload) in requests {
            forms.push(payload.to_form()?);
            endpoints.push(endpoint);
        }
        info!(%id, case_id = %case_id, requests = forms.len(), "submitting case");

        let results = join_all(
            endpoints
                .iter()
                .zip(forms)
                .map(|(endpoint, form)| self.webhook.post(endpoint, form)),
        )
        .await;

        let mut deliveries = Vec::with_capacity(results.len());
        let mut first_error = None;
        for (endpoint, result) in endpoints.iter().zip(results) {
            match result {
                Ok(delivery) => deliveries.push((endpoint.clone(), delivery)),
                Err(e) => {
                    error!(%id, endpoint = %endpoint, "case request failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let counters = self
            .counters
            .record_best_effort(&identity.uid, Activity::Case { words })
            .await;

        Ok(SubmissionReceipt {
            id,
            deliveries,
            counters,
            duration_seconds: None,
        })
    }

    fn identity_fields(identity: &Identity) -> SubmissionPayload {
        SubmissionPayload::new()
            .field("practitioner", identity.display_name())
            .field("email", identity.email.clone())
    }

    fn dictation_payload(
        &self,
        identity: &Identity,
        patient_id: &str,
        merged: &MergedAudio,
        segment_count: usize,
    ) -> SubmissionPayload {
        Self::identity_fields(identity)
            .field("patientId", patient_id)
            .field("durationSeconds", format!("{:.2}", merged.duration_seconds))
            .field("segments", segment_count.to_string())
            .part(BinaryPart {
                field: "audio".to_string(),
                filename: self.audio_filename.clone(),
                mime: "audio/wav".to_string(),
                bytes: merged.wav.clone(),
            })
    }

    fn case_payloads(
        &self,
        identity: &Identity,
        case_id: &str,
        text: Option<&str>,
        images: Vec<ImageFile>,
    ) -> Vec<(String, SubmissionPayload)> {
        let mut requests = Vec::new();

        if let Some(text) = text {
            let payload = Self::identity_fields(identity)
                .field("caseId", case_id)
                .field("text", text);
            requests.push((self.endpoints.case_text.clone(), payload));
        }

        if !images.is_empty() {
            let mut payload = Self::identity_fields(identity)
                .field("caseId", case_id)
                .field("imageCount", images.len().to_string());
            for (i, image) in images.into_iter().enumerate() {
                payload = payload.part(image.into_part(i + 1));
            }
            requests.push((self.endpoints.case_photos.clone(), payload));
        }

        requests
    }
}
