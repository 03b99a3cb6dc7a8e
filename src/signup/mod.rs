// ============================================================================
// Module : signup
// ============================================================================
// Inscription des clients institutionnels
// - form : brouillons typés par étape et règles de validation
// - wizard : machine à états des étapes
// - submit : séquence d'appels au CMS
// ============================================================================

pub mod form;
pub mod submit;
pub mod wizard;

pub use form::{LogoFile, ValidationError};
pub use submit::{
    submit_signup, CreatedResource, SignupBackend, SignupError, SignupOutcome, SubmitStep,
};
pub use wizard::{SignupApplication, SignupWizard, Step, WizardState};
