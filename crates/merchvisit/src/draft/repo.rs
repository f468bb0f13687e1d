//! Draft persistence and the state machine around it.
//!
//! Every mutation goes through [`DraftRepository`], which re-reads the draft
//! document, applies the change, bumps `updatedAt` and writes the document
//! back in one call. Terminal drafts (`done`, `cancelled`) refuse all
//! mutations.

use chrono::Utc;
use uuid::Uuid;

use crate::draft::completion::validate_draft;
use crate::draft::{AnswerValue, Draft, DraftStatus, FurnitureObservation};
use crate::error::DraftError;
use crate::pack::{JobPack, QuestionKind, Template};
use crate::photo::{PhotoInput, PhotoManager};
use crate::store::{Store, DRAFTS};

pub struct DraftRepository {
    store: Store,
    photos: PhotoManager,
}

impl DraftRepository {
    pub fn new(store: Store) -> Self {
        let photos = PhotoManager::new(store.clone());
        Self { store, photos }
    }

    pub fn photos(&self) -> &PhotoManager {
        &self.photos
    }

    pub fn get_draft(&self, visit_id: &str) -> Result<Option<Draft>, DraftError> {
        Ok(self.store.get_doc(DRAFTS, visit_id)?)
    }

    pub fn list_drafts(&self) -> Result<Vec<Draft>, DraftError> {
        let mut drafts = Vec::new();
        for key in self.store.list_keys(DRAFTS)? {
            if let Some(draft) = self.store.get_doc::<Draft>(DRAFTS, &key)? {
                drafts.push(draft);
            }
        }
        Ok(drafts)
    }

    pub fn drafts_for_date(&self, date: &str) -> Result<Vec<Draft>, DraftError> {
        let mut drafts = self.list_drafts()?;
        drafts.retain(|d| d.date == date);
        Ok(drafts)
    }

    /// Returns the existing draft for the visit, or creates a fresh `open`
    /// one seeded from the pack. Store name, retailer and template version
    /// are denormalized into the draft so later exports do not depend on the
    /// pack still being loaded.
    pub fn ensure_draft(&self, pack: &JobPack, visit_id: &str) -> Result<Draft, DraftError> {
        if let Some(existing) = self.get_draft(visit_id)? {
            return Ok(existing);
        }

        let visit = pack
            .visit_by_id(visit_id)
            .ok_or_else(|| DraftError::UnknownVisit(visit_id.to_string()))?;
        if visit.is_cancelled() {
            return Err(DraftError::VisitCancelled(visit_id.to_string()));
        }
        let template =
            pack.template_by_id(&visit.template_id)
                .ok_or_else(|| DraftError::TemplateMissing {
                    visit_id: visit_id.to_string(),
                    template_id: visit.template_id.clone(),
                })?;
        let site = pack.store_by_sap(&visit.sap_id);

        let now = Utc::now().to_rfc3339();
        let draft = Draft {
            visit_id: visit.visit_id.clone(),
            sap_id: visit.sap_id.clone(),
            template_id: visit.template_id.clone(),
            status: DraftStatus::Open,
            answers: Default::default(),
            furniture_observations: vec![],
            started_at: now.clone(),
            updated_at: now,
            submitted_at: None,
            cancel_reason: None,
            store_name: site.map(|s| s.name.clone()).unwrap_or_default(),
            retailer_id: site.map(|s| s.retailer_id.clone()).unwrap_or_default(),
            template_version: template.version,
            date: visit.date.clone(),
        };
        self.store.set_doc(DRAFTS, visit_id, &draft)?;
        log::info!("Started draft for visit '{}'", visit_id);
        Ok(draft)
    }

    pub fn set_answer(
        &self,
        pack: &JobPack,
        visit_id: &str,
        key: &str,
        value: AnswerValue,
    ) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;
        let template = self.template_for(pack, &draft)?;
        if template.question_by_key(key).is_none() {
            return Err(DraftError::UnknownQuestion(key.to_string()));
        }

        draft.answers.insert(key.to_string(), value);
        self.persist(&mut draft)?;
        Ok(draft)
    }

    pub fn clear_answer(
        &self,
        pack: &JobPack,
        visit_id: &str,
        key: &str,
    ) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;
        let template = self.template_for(pack, &draft)?;
        if template.question_by_key(key).is_none() {
            return Err(DraftError::UnknownQuestion(key.to_string()));
        }

        draft.answers.remove(key);
        self.persist(&mut draft)?;
        Ok(draft)
    }

    /// Adds the option to a multi-select answer if absent, removes it if
    /// present. Options keep their first-selection order.
    pub fn toggle_multi_option(
        &self,
        pack: &JobPack,
        visit_id: &str,
        key: &str,
        option: &str,
    ) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;
        let template = self.template_for(pack, &draft)?;
        if template.question_by_key(key).is_none() {
            return Err(DraftError::UnknownQuestion(key.to_string()));
        }

        let mut selected = match draft.answers.get(key) {
            Some(AnswerValue::Multi(v)) => v.clone(),
            _ => Vec::new(),
        };
        if let Some(pos) = selected.iter().position(|o| o == option) {
            selected.remove(pos);
        } else {
            selected.push(option.to_string());
        }
        draft
            .answers
            .insert(key.to_string(), AnswerValue::Multi(selected));

        self.persist(&mut draft)?;
        Ok(draft)
    }

    /// Re-encodes and stores the files, then appends the new photo ids to
    /// the question's answer. Attachments beyond the question's `photosMax`
    /// are refused up front, before any blob is written.
    pub fn attach_photos(
        &self,
        pack: &JobPack,
        visit_id: &str,
        key: &str,
        files: &[PhotoInput],
    ) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;
        let template = self.template_for(pack, &draft)?;
        let question = template
            .question_by_key(key)
            .ok_or_else(|| DraftError::UnknownQuestion(key.to_string()))?;
        let max = match &question.kind {
            QuestionKind::Photo { photos_max, .. } => *photos_max,
            _ => return Err(DraftError::UnknownQuestion(key.to_string())),
        };

        let mut ids = match draft.answers.get(key) {
            Some(AnswerValue::Photos { photo_ids }) => photo_ids.clone(),
            _ => Vec::new(),
        };
        if ids.len() + files.len() > max as usize {
            return Err(DraftError::TooManyPhotos {
                key: key.to_string(),
                max,
            });
        }

        ids.extend(self.photos.add_photos(files, visit_id)?);
        draft
            .answers
            .insert(key.to_string(), AnswerValue::Photos { photo_ids: ids });

        self.persist(&mut draft)?;
        Ok(draft)
    }

    /// Drops the id from the answer and deletes the stored blob.
    pub fn detach_photo(
        &self,
        visit_id: &str,
        key: &str,
        photo_id: &str,
    ) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;

        if let Some(AnswerValue::Photos { photo_ids }) = draft.answers.get_mut(key) {
            photo_ids.retain(|id| id != photo_id);
        }
        self.photos.remove_photo(photo_id)?;

        self.persist(&mut draft)?;
        Ok(draft)
    }

    pub fn add_observation(
        &self,
        visit_id: &str,
        atyp_label: &str,
        description: &str,
        quantity: u32,
    ) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;

        draft.furniture_observations.push(FurnitureObservation {
            id: Uuid::new_v4().to_string(),
            atyp_label: atyp_label.to_string(),
            description: description.to_string(),
            quantity,
            photo_ids: vec![],
        });

        self.persist(&mut draft)?;
        Ok(draft)
    }

    pub fn update_observation(
        &self,
        visit_id: &str,
        observation_id: &str,
        atyp_label: &str,
        description: &str,
        quantity: u32,
    ) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;

        let obs = draft
            .furniture_observations
            .iter_mut()
            .find(|o| o.id == observation_id)
            .ok_or_else(|| DraftError::ObservationNotFound(observation_id.to_string()))?;
        obs.atyp_label = atyp_label.to_string();
        obs.description = description.to_string();
        obs.quantity = quantity;

        self.persist(&mut draft)?;
        Ok(draft)
    }

    /// Removes the observation and deletes every photo blob it referenced.
    pub fn remove_observation(
        &self,
        visit_id: &str,
        observation_id: &str,
    ) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;

        let pos = draft
            .furniture_observations
            .iter()
            .position(|o| o.id == observation_id)
            .ok_or_else(|| DraftError::ObservationNotFound(observation_id.to_string()))?;
        let removed = draft.furniture_observations.remove(pos);
        for photo_id in &removed.photo_ids {
            self.photos.remove_photo(photo_id)?;
        }

        self.persist(&mut draft)?;
        Ok(draft)
    }

    /// Stores the files and appends their ids to the observation. The upper
    /// bound comes from the template's furniture trigger.
    pub fn attach_observation_photos(
        &self,
        pack: &JobPack,
        visit_id: &str,
        observation_id: &str,
        files: &[PhotoInput],
    ) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;
        let template = self.template_for(pack, &draft)?;

        let (key, bounds) = template
            .questions()
            .find_map(|q| match &q.kind {
                QuestionKind::FurnitureTrigger { trigger } => {
                    Some((q.key.clone(), trigger.clone()))
                }
                _ => None,
            })
            .ok_or_else(|| DraftError::TriggerMissing(draft.template_id.clone()))?;

        let obs = draft
            .furniture_observations
            .iter_mut()
            .find(|o| o.id == observation_id)
            .ok_or_else(|| DraftError::ObservationNotFound(observation_id.to_string()))?;

        if obs.photo_ids.len() + files.len() > bounds.photos_max as usize {
            return Err(DraftError::TooManyPhotos {
                key,
                max: bounds.photos_max,
            });
        }

        let ids = self.photos.add_photos(files, visit_id)?;
        obs.photo_ids.extend(ids);

        self.persist(&mut draft)?;
        Ok(draft)
    }

    pub fn detach_observation_photo(
        &self,
        visit_id: &str,
        observation_id: &str,
        photo_id: &str,
    ) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;

        let obs = draft
            .furniture_observations
            .iter_mut()
            .find(|o| o.id == observation_id)
            .ok_or_else(|| DraftError::ObservationNotFound(observation_id.to_string()))?;
        obs.photo_ids.retain(|id| id != photo_id);
        self.photos.remove_photo(photo_id)?;

        self.persist(&mut draft)?;
        Ok(draft)
    }

    /// Runs completion validation; on success the draft transitions to
    /// `done` and is frozen. On failure it stays `open` with all answers
    /// intact.
    pub fn complete(&self, pack: &JobPack, visit_id: &str) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;

        let errors = validate_draft(pack, &draft);
        if !errors.is_empty() {
            for error in &errors {
                log::warn!("Visit '{}' incomplete: {}", visit_id, error);
            }
            return Err(DraftError::Incomplete {
                first: errors[0].clone(),
                all: errors,
            });
        }

        draft.status = DraftStatus::Done;
        draft.submitted_at = Some(Utc::now().to_rfc3339());
        self.persist(&mut draft)?;
        log::info!("Visit '{}' completed", visit_id);
        Ok(draft)
    }

    /// Cancels the visit with a reason. No validation applies; a cancelled
    /// visit is terminal and still exported.
    pub fn cancel(&self, visit_id: &str, reason: &str) -> Result<Draft, DraftError> {
        let mut draft = self.require_open(visit_id)?;

        draft.status = DraftStatus::Cancelled;
        draft.cancel_reason = Some(reason.to_string());
        draft.submitted_at = Some(Utc::now().to_rfc3339());
        self.persist(&mut draft)?;
        log::info!("Visit '{}' cancelled: {}", visit_id, reason);
        Ok(draft)
    }

    /// Deletes the draft document and every photo blob attached to the
    /// visit, regardless of status.
    pub fn delete_draft(&self, visit_id: &str) -> Result<(), DraftError> {
        if self.get_draft(visit_id)?.is_none() {
            return Err(DraftError::NotFound(visit_id.to_string()));
        }
        self.photos.remove_all_for_visit(visit_id)?;
        self.store.delete_doc(DRAFTS, visit_id)?;
        log::info!("Deleted draft for visit '{}'", visit_id);
        Ok(())
    }

    fn template_for<'p>(
        &self,
        pack: &'p JobPack,
        draft: &Draft,
    ) -> Result<&'p Template, DraftError> {
        pack.template_by_id(&draft.template_id)
            .ok_or_else(|| DraftError::TemplateMissing {
                visit_id: draft.visit_id.clone(),
                template_id: draft.template_id.clone(),
            })
    }

    fn require_open(&self, visit_id: &str) -> Result<Draft, DraftError> {
        let draft = self
            .get_draft(visit_id)?
            .ok_or_else(|| DraftError::NotFound(visit_id.to_string()))?;
        if draft.is_terminal() {
            return Err(DraftError::Terminal(visit_id.to_string()));
        }
        Ok(draft)
    }

    fn persist(&self, draft: &mut Draft) -> Result<(), DraftError> {
        draft.updated_at = Utc::now().to_rfc3339();
        self.store.set_doc(DRAFTS, &draft.visit_id, draft)?;
        Ok(())
    }
}
