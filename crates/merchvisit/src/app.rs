//! Application facade: one handle owning the store, the current pack and
//! the draft repository, with a typed command surface for the capture layer
//! to drive.

use std::path::Path;

use crate::draft::repo::DraftRepository;
use crate::draft::{AnswerValue, Draft};
use crate::error::{DraftError, ExportError, Result};
use crate::export::{ExportOutcome, ExportPackager};
use crate::pack::{loader, JobPack};
use crate::photo::PhotoInput;
use crate::store::Store;

/// A single user-level mutation against one visit's draft.
#[derive(Debug)]
pub enum Command {
    SetAnswer {
        visit_id: String,
        key: String,
        value: AnswerValue,
    },
    ClearAnswer {
        visit_id: String,
        key: String,
    },
    ToggleMultiOption {
        visit_id: String,
        key: String,
        option: String,
    },
    AddPhotos {
        visit_id: String,
        key: String,
        files: Vec<PhotoInput>,
    },
    RemovePhoto {
        visit_id: String,
        key: String,
        photo_id: String,
    },
    AddObservation {
        visit_id: String,
        atyp_label: String,
        description: String,
        quantity: u32,
    },
    UpdateObservation {
        visit_id: String,
        observation_id: String,
        atyp_label: String,
        description: String,
        quantity: u32,
    },
    RemoveObservation {
        visit_id: String,
        observation_id: String,
    },
    AddObservationPhotos {
        visit_id: String,
        observation_id: String,
        files: Vec<PhotoInput>,
    },
    RemoveObservationPhoto {
        visit_id: String,
        observation_id: String,
        photo_id: String,
    },
    CompleteVisit {
        visit_id: String,
    },
    CancelVisit {
        visit_id: String,
        reason: String,
    },
    DeleteDraft {
        visit_id: String,
    },
}

pub struct App {
    store: Store,
    drafts: DraftRepository,
    pack: Option<JobPack>,
}

impl App {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_store(Store::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_store(Store::open_in_memory()?)
    }

    fn with_store(store: Store) -> Result<Self> {
        let pack = loader::load_current_pack(&store)?;
        let drafts = DraftRepository::new(store.clone());
        Ok(Self {
            store,
            drafts,
            pack,
        })
    }

    pub fn pack(&self) -> Option<&JobPack> {
        self.pack.as_ref()
    }

    pub fn drafts(&self) -> &DraftRepository {
        &self.drafts
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Validates, persists and switches to the pack in `content`. Drafts
    /// from a previous pack are untouched.
    pub fn import_pack_from_str(&mut self, content: &str) -> Result<&JobPack> {
        let pack = loader::import_pack_from_str(&self.store, content)?;
        Ok(&*self.pack.insert(pack))
    }

    pub fn import_pack_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<&JobPack> {
        let pack = loader::import_pack_from_file(&self.store, path)?;
        Ok(&*self.pack.insert(pack))
    }

    pub fn ensure_draft(&self, visit_id: &str) -> Result<Draft> {
        let pack = self.require_pack()?;
        Ok(self.drafts.ensure_draft(pack, visit_id)?)
    }

    /// Applies one command. All commands except `DeleteDraft` return the
    /// updated draft.
    pub fn dispatch(&self, command: Command) -> Result<Option<Draft>> {
        match command {
            Command::SetAnswer {
                visit_id,
                key,
                value,
            } => {
                let pack = self.require_pack()?;
                Ok(Some(self.drafts.set_answer(pack, &visit_id, &key, value)?))
            }
            Command::ClearAnswer { visit_id, key } => {
                let pack = self.require_pack()?;
                Ok(Some(self.drafts.clear_answer(pack, &visit_id, &key)?))
            }
            Command::ToggleMultiOption {
                visit_id,
                key,
                option,
            } => {
                let pack = self.require_pack()?;
                Ok(Some(
                    self.drafts
                        .toggle_multi_option(pack, &visit_id, &key, &option)?,
                ))
            }
            Command::AddPhotos {
                visit_id,
                key,
                files,
            } => {
                let pack = self.require_pack()?;
                Ok(Some(
                    self.drafts.attach_photos(pack, &visit_id, &key, &files)?,
                ))
            }
            Command::RemovePhoto {
                visit_id,
                key,
                photo_id,
            } => Ok(Some(self.drafts.detach_photo(&visit_id, &key, &photo_id)?)),
            Command::AddObservation {
                visit_id,
                atyp_label,
                description,
                quantity,
            } => Ok(Some(self.drafts.add_observation(
                &visit_id,
                &atyp_label,
                &description,
                quantity,
            )?)),
            Command::UpdateObservation {
                visit_id,
                observation_id,
                atyp_label,
                description,
                quantity,
            } => Ok(Some(self.drafts.update_observation(
                &visit_id,
                &observation_id,
                &atyp_label,
                &description,
                quantity,
            )?)),
            Command::RemoveObservation {
                visit_id,
                observation_id,
            } => Ok(Some(
                self.drafts.remove_observation(&visit_id, &observation_id)?,
            )),
            Command::AddObservationPhotos {
                visit_id,
                observation_id,
                files,
            } => {
                let pack = self.require_pack()?;
                Ok(Some(self.drafts.attach_observation_photos(
                    pack,
                    &visit_id,
                    &observation_id,
                    &files,
                )?))
            }
            Command::RemoveObservationPhoto {
                visit_id,
                observation_id,
                photo_id,
            } => Ok(Some(self.drafts.detach_observation_photo(
                &visit_id,
                &observation_id,
                &photo_id,
            )?)),
            Command::CompleteVisit { visit_id } => {
                let pack = self.require_pack()?;
                Ok(Some(self.drafts.complete(pack, &visit_id)?))
            }
            Command::CancelVisit { visit_id, reason } => {
                Ok(Some(self.drafts.cancel(&visit_id, &reason)?))
            }
            Command::DeleteDraft { visit_id } => {
                self.drafts.delete_draft(&visit_id)?;
                Ok(None)
            }
        }
    }

    pub fn export_day(&self, date: &str, out_dir: &Path) -> Result<ExportOutcome> {
        let pack = self.pack.as_ref().ok_or(ExportError::NoPack)?;
        Ok(ExportPackager::new(self.store.clone()).export_day(pack, date, out_dir)?)
    }

    fn require_pack(&self) -> Result<&JobPack> {
        Ok(self.pack.as_ref().ok_or(DraftError::NoPack)?)
    }
}
