pub mod app;
pub mod condition;
pub mod device;
pub mod draft;
pub mod error;
pub mod export;
pub mod pack;
pub mod photo;
pub mod store;

pub use app::{App, Command};
pub use condition::{Condition, ConditionOp, DependsOn};
pub use draft::repo::DraftRepository;
pub use draft::{AnswerValue, Draft, DraftStatus, FurnitureObservation};
pub use error::{
    DraftError, ExportError, MerchError, PackError, PhotoError, Result, StoreError,
};
pub use export::{ExportOutcome, ExportPackager, Manifest};
pub use pack::{JobPack, Question, QuestionKind, Template, Visit};
pub use photo::{Downscaler, JpegDownscaler, PhotoInput, PhotoManager};
pub use store::Store;
