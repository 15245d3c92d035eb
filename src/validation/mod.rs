// Quality validation: independent scoring of OCR and translation
// batches, with alternative generation fed by user feedback.

pub mod alternatives;
pub mod patterns;
pub mod validator;

pub use alternatives::AlternativeGenerator;
pub use validator::QualityValidator;
