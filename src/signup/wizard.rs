// ============================================================================
// Assistant d'inscription : machine à états
// ============================================================================
// Étapes linéaires : Account -> Company -> Trading -> Contact -> Terms
//
// Chaque variante de WizardState contient les étapes précédentes VALIDÉES
// (Valid<T>) et uniquement le brouillon de l'étape courante. Impossible
// d'atteindre Trading avec un compte invalide : le type l'interdit.
//
// SignupWizard ajoute ce dont l'interface a besoin :
// - le champ qui a le focus et le défilement (remis à 0 à chaque étape)
// - une réserve des brouillons des étapes suivantes, pour que
//   back() puis next() retrouve ce qui avait été saisi
// ============================================================================

use std::fmt;

use tracing::{debug, info};

use super::form::{
    self, AccountDraft, CompanyDraft, ContactDraft, FieldSpec, LogoFile, StepForm, TermsDraft,
    TradingDraft, Valid, ValidationError,
};

/// Nombre de champs visibles à la fois dans le formulaire
pub const VISIBLE_FIELDS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Account,
    Company,
    Trading,
    Contact,
    Terms,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Account,
        Step::Company,
        Step::Trading,
        Step::Contact,
        Step::Terms,
    ];

    pub fn index(self) -> usize {
        match self {
            Step::Account => 0,
            Step::Company => 1,
            Step::Trading => 2,
            Step::Contact => 3,
            Step::Terms => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Account => "Compte",
            Step::Company => "Société",
            Step::Trading => "Trading",
            Step::Contact => "Contacts",
            Step::Terms => "Conditions",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Dossier complet, prêt à être soumis
#[derive(Debug, Clone, PartialEq)]
pub struct SignupApplication {
    pub account: Valid<AccountDraft>,
    pub company: Valid<CompanyDraft>,
    pub trading: Valid<TradingDraft>,
    pub contact: Valid<ContactDraft>,
    pub terms: Valid<TermsDraft>,
    pub logo: Option<LogoFile>,
}

// ============================================================================
// WizardState
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum WizardState {
    Account {
        draft: AccountDraft,
    },
    Company {
        account: Valid<AccountDraft>,
        draft: CompanyDraft,
    },
    Trading {
        account: Valid<AccountDraft>,
        company: Valid<CompanyDraft>,
        draft: TradingDraft,
    },
    Contact {
        account: Valid<AccountDraft>,
        company: Valid<CompanyDraft>,
        trading: Valid<TradingDraft>,
        draft: ContactDraft,
    },
    Terms {
        account: Valid<AccountDraft>,
        company: Valid<CompanyDraft>,
        trading: Valid<TradingDraft>,
        contact: Valid<ContactDraft>,
        draft: TermsDraft,
    },
}

impl Default for WizardState {
    fn default() -> Self {
        WizardState::Account {
            draft: AccountDraft::default(),
        }
    }
}

impl WizardState {
    pub fn step(&self) -> Step {
        match self {
            WizardState::Account { .. } => Step::Account,
            WizardState::Company { .. } => Step::Company,
            WizardState::Trading { .. } => Step::Trading,
            WizardState::Contact { .. } => Step::Contact,
            WizardState::Terms { .. } => Step::Terms,
        }
    }

    /// Valide l'étape courante et construit l'état suivant
    ///
    /// L'étape suivante démarre avec un brouillon par défaut.
    /// Terms est la dernière étape : advance() la valide et y reste.
    pub fn advance(&self) -> Result<WizardState, ValidationError> {
        Ok(match self {
            WizardState::Account { draft } => WizardState::Company {
                account: form::validate(draft)?,
                draft: CompanyDraft::default(),
            },
            WizardState::Company { account, draft } => WizardState::Trading {
                account: account.clone(),
                company: form::validate(draft)?,
                draft: TradingDraft::default(),
            },
            WizardState::Trading {
                account,
                company,
                draft,
            } => WizardState::Contact {
                account: account.clone(),
                company: company.clone(),
                trading: form::validate(draft)?,
                draft: ContactDraft::default(),
            },
            WizardState::Contact {
                account,
                company,
                trading,
                draft,
            } => WizardState::Terms {
                account: account.clone(),
                company: company.clone(),
                trading: trading.clone(),
                contact: form::validate(draft)?,
                draft: TermsDraft::default(),
            },
            WizardState::Terms { draft, .. } => {
                draft.validate()?;
                self.clone()
            }
        })
    }

    /// Revient à l'étape précédente ; retourne aussi le brouillon abandonné
    ///
    /// Les données validées redeviennent un brouillon éditable.
    fn retreat(self) -> (WizardState, Option<StashedDraft>) {
        match self {
            WizardState::Account { draft } => (WizardState::Account { draft }, None),
            WizardState::Company { account, draft } => (
                WizardState::Account {
                    draft: account.into_inner(),
                },
                Some(StashedDraft::Company(draft)),
            ),
            WizardState::Trading {
                account,
                company,
                draft,
            } => (
                WizardState::Company {
                    account,
                    draft: company.into_inner(),
                },
                Some(StashedDraft::Trading(draft)),
            ),
            WizardState::Contact {
                account,
                company,
                trading,
                draft,
            } => (
                WizardState::Trading {
                    account,
                    company,
                    draft: trading.into_inner(),
                },
                Some(StashedDraft::Contact(draft)),
            ),
            WizardState::Terms {
                account,
                company,
                trading,
                contact,
                draft,
            } => (
                WizardState::Contact {
                    account,
                    company,
                    trading,
                    draft: contact.into_inner(),
                },
                Some(StashedDraft::Terms(draft)),
            ),
        }
    }

    /// Brouillon de l'étape courante
    pub fn form(&self) -> &dyn StepForm {
        match self {
            WizardState::Account { draft } => draft,
            WizardState::Company { draft, .. } => draft,
            WizardState::Trading { draft, .. } => draft,
            WizardState::Contact { draft, .. } => draft,
            WizardState::Terms { draft, .. } => draft,
        }
    }

    pub fn form_mut(&mut self) -> &mut dyn StepForm {
        match self {
            WizardState::Account { draft } => draft,
            WizardState::Company { draft, .. } => draft,
            WizardState::Trading { draft, .. } => draft,
            WizardState::Contact { draft, .. } => draft,
            WizardState::Terms { draft, .. } => draft,
        }
    }

    /// Dossier complet (uniquement depuis Terms)
    pub fn application(&self) -> Option<Result<SignupApplication, ValidationError>> {
        let WizardState::Terms {
            account,
            company,
            trading,
            contact,
            draft,
        } = self
        else {
            return None;
        };

        Some(form::validate(draft).and_then(|terms| {
            let logo = terms.logo_path().map(LogoFile::inspect).transpose()?;
            Ok(SignupApplication {
                account: account.clone(),
                company: company.clone(),
                trading: trading.clone(),
                contact: contact.clone(),
                terms,
                logo,
            })
        }))
    }
}

// ============================================================================
// SignupWizard
// ============================================================================

/// Brouillon d'une étape suivante mis de côté par back()
#[derive(Debug, Clone, PartialEq)]
enum StashedDraft {
    Company(CompanyDraft),
    Trading(TradingDraft),
    Contact(ContactDraft),
    Terms(TermsDraft),
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Stash {
    company: Option<CompanyDraft>,
    trading: Option<TradingDraft>,
    contact: Option<ContactDraft>,
    terms: Option<TermsDraft>,
}

impl Stash {
    fn keep(&mut self, draft: StashedDraft) {
        match draft {
            StashedDraft::Company(d) => self.company = Some(d),
            StashedDraft::Trading(d) => self.trading = Some(d),
            StashedDraft::Contact(d) => self.contact = Some(d),
            StashedDraft::Terms(d) => self.terms = Some(d),
        }
    }

    /// Remet dans `state` le brouillon mis de côté pour son étape
    fn restore_into(&mut self, state: &mut WizardState) {
        match state {
            WizardState::Account { .. } => {}
            WizardState::Company { draft, .. } => {
                if let Some(saved) = self.company.take() {
                    *draft = saved;
                }
            }
            WizardState::Trading { draft, .. } => {
                if let Some(saved) = self.trading.take() {
                    *draft = saved;
                }
            }
            WizardState::Contact { draft, .. } => {
                if let Some(saved) = self.contact.take() {
                    *draft = saved;
                }
            }
            WizardState::Terms { draft, .. } => {
                if let Some(saved) = self.terms.take() {
                    *draft = saved;
                }
            }
        }
    }
}

/// Assistant d'inscription tel que manipulé par l'interface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignupWizard {
    state: WizardState,
    focus: usize,
    scroll: usize,
    stash: Stash,
}

impl SignupWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step()
    }

    pub fn form(&self) -> &dyn StepForm {
        self.state.form()
    }

    pub fn form_mut(&mut self) -> &mut dyn StepForm {
        self.state.form_mut()
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn focused_field(&self) -> Option<FieldSpec> {
        self.form().fields().get(self.focus).copied()
    }

    pub fn focus_next(&mut self) {
        let count = self.form().fields().len();
        if count > 0 {
            self.focus = (self.focus + 1) % count;
            self.follow_focus();
        }
    }

    pub fn focus_previous(&mut self) {
        let count = self.form().fields().len();
        if count > 0 {
            self.focus = if self.focus == 0 { count - 1 } else { self.focus - 1 };
            self.follow_focus();
        }
    }

    /// Place le focus sur un champ (ex: champ en erreur)
    pub fn focus_field(&mut self, key: &str) {
        if let Some(index) = self.form().fields().iter().position(|f| f.key == key) {
            self.focus = index;
            self.follow_focus();
        }
    }

    /// '+' sur l'étape Contact : ajoute une personne autorisée, focus sur son nom
    pub fn add_authorized_person(&mut self) -> Result<(), ValidationError> {
        let WizardState::Contact { draft, .. } = &mut self.state else {
            return Ok(());
        };
        let number = draft.add_authorized_person()?;
        debug!(persons = number, "Authorized person added");
        self.focus_field(&format!("person_{}_name", number));
        Ok(())
    }

    /// '-' sur l'étape Contact : retire la personne qui a le focus (la
    /// dernière si le focus est ailleurs)
    pub fn remove_authorized_person(&mut self) -> Result<(), ValidationError> {
        let focused = self
            .focused_field()
            .and_then(|spec| form::authorized_person_index(spec.key));
        let WizardState::Contact { draft, .. } = &mut self.state else {
            return Ok(());
        };
        let index = focused.unwrap_or_else(|| draft.authorized_persons().len().saturating_sub(1));
        draft.remove_authorized_person(index)?;
        debug!(index, persons = draft.authorized_persons().len(), "Authorized person removed");
        self.clamp_focus();
        Ok(())
    }

    /// Garde le focus sur un champ existant quand la liste raccourcit
    fn clamp_focus(&mut self) {
        let count = self.form().fields().len();
        self.focus = self.focus.min(count.saturating_sub(1));
        self.scroll = self.scroll.min(self.focus);
        self.follow_focus();
    }

    fn follow_focus(&mut self) {
        if self.focus < self.scroll {
            self.scroll = self.focus;
        } else if self.focus >= self.scroll + VISIBLE_FIELDS {
            self.scroll = self.focus + 1 - VISIBLE_FIELDS;
        }
    }

    fn reset_view(&mut self) {
        self.focus = 0;
        self.scroll = 0;
    }

    /// Valide l'étape courante et passe à la suivante
    ///
    /// En cas d'erreur on reste sur l'étape, le focus va sur le champ fautif.
    pub fn next(&mut self) -> Result<Step, ValidationError> {
        if self.step() == Step::Terms {
            return Ok(Step::Terms);
        }

        match self.state.advance() {
            Ok(mut next) => {
                self.stash.restore_into(&mut next);
                debug!(from = %self.step(), to = %next.step(), "Signup step validated");
                self.state = next;
                self.reset_view();
                Ok(self.step())
            }
            Err(e) => {
                debug!(step = %self.step(), error = %e, "Signup step rejected");
                self.focus_field(e.field());
                Err(e)
            }
        }
    }

    /// Étape précédente, sans validation ; false sur la première étape
    pub fn back(&mut self) -> bool {
        if self.step() == Step::Account {
            return false;
        }

        let state = std::mem::take(&mut self.state);
        let (previous, abandoned) = state.retreat();
        if let Some(draft) = abandoned {
            self.stash.keep(draft);
        }
        self.state = previous;
        self.reset_view();
        true
    }

    /// Valide Terms et retourne le dossier complet
    pub fn submit(&mut self) -> Result<SignupApplication, ValidationError> {
        match self.state.application() {
            Some(Ok(application)) => {
                info!(company = %application.company.company_name, "Signup application ready");
                Ok(application)
            }
            Some(Err(e)) => {
                self.focus_field(e.field());
                Err(e)
            }
            None => {
                // Pas encore sur Terms : erreur de l'étape courante, sinon conditions non acceptées
                let e = self
                    .form()
                    .validate()
                    .err()
                    .unwrap_or(ValidationError::TermsNotAccepted);
                self.focus_field(e.field());
                Err(e)
            }
        }
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signup::form::{set_text, toggle_flag};

    fn fill_account(wizard: &mut SignupWizard) {
        let form = wizard.form_mut();
        set_text(form, "username", "acme".into());
        set_text(form, "email", "ops@acme.io".into());
        set_text(form, "password", "correct-horse".into());
        set_text(form, "confirm_password", "correct-horse".into());
    }

    fn fill_company(wizard: &mut SignupWizard) {
        let form = wizard.form_mut();
        set_text(form, "company_name", "Acme Capital".into());
        set_text(form, "business_registration_number", "RC-42".into());
        set_text(form, "country_of_incorporation", "Singapore".into());
    }

    fn fill_contact(wizard: &mut SignupWizard) {
        let form = wizard.form_mut();
        set_text(form, "primary_name", "Jane Doe".into());
        set_text(form, "primary_email", "jane@acme.io".into());
        set_text(form, "street", "1 Raffles Place".into());
        set_text(form, "city", "Singapore".into());
        set_text(form, "country", "SG".into());
    }

    /// Assistant amené jusqu'à Terms
    fn wizard_at_terms() -> SignupWizard {
        let mut wizard = SignupWizard::new();
        fill_account(&mut wizard);
        wizard.next().unwrap();
        fill_company(&mut wizard);
        wizard.next().unwrap();
        wizard.next().unwrap();
        fill_contact(&mut wizard);
        wizard.next().unwrap();
        wizard
    }

    #[test]
    fn test_steps_are_linear() {
        let wizard = wizard_at_terms();
        assert_eq!(wizard.step(), Step::Terms);
        for (i, step) in Step::ALL.iter().enumerate() {
            assert_eq!(step.index(), i);
        }
    }

    #[test]
    fn test_invalid_step_stays_put() {
        let mut wizard = SignupWizard::new();
        set_text(wizard.form_mut(), "username", "ab".into());

        let err = wizard.next().unwrap_err();
        assert_eq!(err, ValidationError::UsernameTooShort);
        assert_eq!(wizard.step(), Step::Account);
    }

    #[test]
    fn test_trading_without_platforms_refuses_next() {
        let mut wizard = SignupWizard::new();
        fill_account(&mut wizard);
        wizard.next().unwrap();
        fill_company(&mut wizard);
        wizard.next().unwrap();
        assert_eq!(wizard.step(), Step::Trading);

        // Retire la plateforme par défaut (mt5)
        form::toggle_option(wizard.form_mut(), "trading_platforms", "mt5");

        assert_eq!(wizard.next(), Err(ValidationError::NoTradingPlatform));
        assert_eq!(wizard.step(), Step::Trading);
        assert_eq!(wizard.focused_field().unwrap().key, "trading_platforms");
    }

    #[test]
    fn test_next_resets_focus_and_scroll() {
        let mut wizard = SignupWizard::new();
        fill_account(&mut wizard);
        wizard.next().unwrap();
        fill_company(&mut wizard);
        for _ in 0..7 {
            wizard.focus_next();
        }
        assert_eq!(wizard.focus(), 7);

        wizard.next().unwrap();
        assert_eq!(wizard.focus(), 0);
        assert_eq!(wizard.scroll(), 0);
    }

    #[test]
    fn test_scroll_follows_focus_on_long_steps() {
        let mut wizard = wizard_at_terms();
        wizard.back();
        assert_eq!(wizard.step(), Step::Contact);

        for _ in 0..10 {
            wizard.focus_next();
        }
        assert_eq!(wizard.focus(), 10);
        assert_eq!(wizard.scroll(), 10 + 1 - VISIBLE_FIELDS);

        wizard.focus_field("primary_name");
        assert_eq!(wizard.scroll(), 0);
    }

    #[test]
    fn test_back_keeps_typed_data() {
        let mut wizard = wizard_at_terms();
        toggle_flag(wizard.form_mut(), "need_reporting");

        assert!(wizard.back());
        assert_eq!(wizard.step(), Step::Contact);
        // Les données validées redeviennent un brouillon rempli
        assert_eq!(
            wizard.form().field("primary_name"),
            Some(form::FieldValue::Text("Jane Doe"))
        );

        wizard.next().unwrap();
        assert_eq!(wizard.step(), Step::Terms);
        assert_eq!(
            wizard.form().field("need_reporting"),
            Some(form::FieldValue::Flag(true))
        );
    }

    #[test]
    fn test_back_on_first_step_is_noop() {
        let mut wizard = SignupWizard::new();
        assert!(!wizard.back());
        assert_eq!(wizard.step(), Step::Account);
    }

    #[test]
    fn test_submit_requires_agreements() {
        let mut wizard = wizard_at_terms();
        assert_eq!(wizard.submit(), Err(ValidationError::TermsNotAccepted));

        toggle_flag(wizard.form_mut(), "agreed_to_terms");
        toggle_flag(wizard.form_mut(), "agreed_to_data_policy");
        let application = wizard.submit().unwrap();

        assert_eq!(application.account.username, "acme");
        assert_eq!(application.company.company_name, "Acme Capital");
        assert!(application.trading.trading_platforms.contains("mt5"));
        assert!(application.logo.is_none());
    }

    #[test]
    fn test_submit_checks_logo() {
        let mut wizard = wizard_at_terms();
        toggle_flag(wizard.form_mut(), "agreed_to_terms");
        toggle_flag(wizard.form_mut(), "agreed_to_data_policy");
        set_text(wizard.form_mut(), "logo", "/nonexistent/logo.bmp".into());

        let err = wizard.submit().unwrap_err();
        assert!(matches!(err, ValidationError::LogoUnsupportedType(_)));
        assert_eq!(wizard.focused_field().unwrap().key, "logo");
    }

    #[test]
    fn test_submit_before_terms_is_refused() {
        let mut wizard = SignupWizard::new();
        assert_eq!(wizard.submit(), Err(ValidationError::UsernameTooShort));
        assert_eq!(wizard.step(), Step::Account);
    }

    #[test]
    fn test_state_advance_is_pure() {
        let state = WizardState::default();
        let before = state.clone();
        assert!(state.advance().is_err());
        assert_eq!(state, before);
    }

    /// Assistant amené jusqu'à Contact
    fn wizard_at_contact() -> SignupWizard {
        let mut wizard = SignupWizard::new();
        fill_account(&mut wizard);
        wizard.next().unwrap();
        fill_company(&mut wizard);
        wizard.next().unwrap();
        wizard.next().unwrap();
        assert_eq!(wizard.step(), Step::Contact);
        wizard
    }

    #[test]
    fn test_separate_operational_address_without_city_refuses_next() {
        let mut wizard = wizard_at_contact();
        fill_contact(&mut wizard);
        toggle_flag(wizard.form_mut(), "same_address");
        set_text(wizard.form_mut(), "operational_street", "8 Marina View".into());
        set_text(wizard.form_mut(), "operational_country", "SG".into());

        assert_eq!(
            wizard.next(),
            Err(ValidationError::OperationalAddressIncomplete("operational_city"))
        );
        assert_eq!(wizard.step(), Step::Contact);
        assert_eq!(wizard.focused_field().unwrap().key, "operational_city");

        set_text(wizard.form_mut(), "operational_city", "Singapore".into());
        assert_eq!(wizard.next(), Ok(Step::Terms));
    }

    #[test]
    fn test_last_authorized_person_cannot_be_removed() {
        let mut wizard = wizard_at_contact();

        assert_eq!(
            wizard.remove_authorized_person(),
            Err(ValidationError::LastAuthorizedPerson)
        );

        wizard.add_authorized_person().unwrap();
        assert_eq!(wizard.focused_field().unwrap().key, "person_2_name");
        set_text(wizard.form_mut(), "person_2_name", "John Roe".into());

        // Focus sur la dernière ligne : le champ retiré ne doit pas laisser un focus orphelin
        wizard.focus_field("person_2_phone");
        wizard.remove_authorized_person().unwrap();
        let fields = wizard.form().fields();
        assert_eq!(wizard.focus(), fields.len() - 1);
        assert_eq!(wizard.focused_field().unwrap().key, "person_1_phone");

        assert_eq!(
            wizard.remove_authorized_person(),
            Err(ValidationError::LastAuthorizedPerson)
        );
    }

    #[test]
    fn test_person_keys_are_ignored_outside_contact() {
        let mut wizard = SignupWizard::new();
        assert_eq!(wizard.add_authorized_person(), Ok(()));
        assert_eq!(wizard.remove_authorized_person(), Ok(()));
        assert_eq!(wizard.step(), Step::Account);
    }
}
