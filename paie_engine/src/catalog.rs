//! Contribution catalog.
//!
//! The catalog supplies the regulatory default contributions and loads
//! user-supplied definitions from configuration.  Defaults live in an
//! immutable template: callers clone it before editing rates, so one
//! payslip can never leak an edit into another.
//!
//! Loading validates every raw entry and reports malformed ones as
//! [`DefinitionCheck::Invalid`] instead of failing the whole file, which
//! keeps the calculator free to assume well-formed input.

use crate::error::PayrollError;
use crate::models::{BaseType, Category, ContributionDefinition};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// Monthly social-security ceiling (PMSS) for the reference year 2024.
pub const SOCIAL_SECURITY_MONTHLY_CEILING: f64 = 3864.0;

/// Reference year of the default rates.
pub const REFERENCE_YEAR: i32 = 2024;

/// Multiple of the ceiling where tranche B stops.
pub const TIER_B_CEILING_MULTIPLIER: f64 = 8.0;

#[allow(clippy::too_many_arguments)]
fn def(
    id: &str,
    name: &str,
    category: Category,
    employee_rate: f64,
    employer_rate: f64,
    base_type: BaseType,
    is_required: bool,
    description: Option<&str>,
) -> ContributionDefinition {
    ContributionDefinition {
        id: id.to_string(),
        name: name.to_string(),
        category,
        employee_rate,
        employer_rate,
        base_type,
        is_required,
        description: description.map(str::to_string),
    }
}

static DEFAULT_CONTRIBUTIONS: Lazy<Vec<ContributionDefinition>> = Lazy::new(|| {
    use BaseType::*;
    use Category::*;
    vec![
        def(
            "maladie",
            "Sécurité sociale - Maladie, maternité, invalidité, décès",
            SocialSecurity,
            0.0,
            7.0,
            Total,
            true,
            None,
        ),
        def(
            "vieillesse_plafonnee",
            "Sécurité sociale - Vieillesse plafonnée",
            SocialSecurity,
            6.9,
            8.55,
            Capped,
            true,
            None,
        ),
        def(
            "vieillesse_deplafonnee",
            "Sécurité sociale - Vieillesse déplafonnée",
            SocialSecurity,
            0.4,
            2.02,
            Total,
            true,
            None,
        ),
        def(
            "allocations_familiales",
            "Allocations familiales",
            SocialSecurity,
            0.0,
            3.45,
            Total,
            true,
            None,
        ),
        def(
            "accidents_travail",
            "Accidents du travail - Maladies professionnelles",
            SocialSecurity,
            0.0,
            2.22,
            Total,
            true,
            Some("Taux variable selon l'entreprise"),
        ),
        def(
            "agirc_arrco_t1",
            "Retraite complémentaire AGIRC-ARRCO Tranche 1",
            Retirement,
            3.15,
            4.72,
            TierA,
            true,
            None,
        ),
        def(
            "ceg_t1",
            "Contribution d'équilibre général Tranche 1",
            Retirement,
            0.86,
            1.29,
            TierA,
            true,
            None,
        ),
        def(
            "agirc_arrco_t2",
            "Retraite complémentaire AGIRC-ARRCO Tranche 2",
            Retirement,
            8.64,
            12.95,
            TierB,
            false,
            Some("Cadres uniquement"),
        ),
        def(
            "ceg_t2",
            "Contribution d'équilibre général Tranche 2",
            Retirement,
            1.08,
            1.62,
            TierB,
            false,
            Some("Cadres uniquement"),
        ),
        def("assurance_chomage", "Assurance chômage", Unemployment, 0.0, 4.05, Capped, true, None),
        def("ags", "AGS", Unemployment, 0.0, 0.15, Capped, true, Some("Garantie des salaires")),
        def(
            "apec",
            "APEC",
            Unemployment,
            0.024,
            0.036,
            Capped,
            false,
            Some("Association pour l'emploi des cadres"),
        ),
        def("csg_deductible", "CSG déductible", CsgCrds, 6.8, 0.0, Total, true, None),
        def("csg_non_deductible", "CSG non déductible", CsgCrds, 2.4, 0.0, Total, true, None),
        def("crds", "CRDS", CsgCrds, 0.5, 0.0, Total, true, None),
        def(
            "fnal",
            "FNAL",
            Other,
            0.0,
            0.1,
            Capped,
            true,
            Some("Fonds national d'aide au logement"),
        ),
        def("csa", "Contribution solidarité autonomie", Other, 0.0, 0.3, Total, true, None),
        def(
            "formation_professionnelle",
            "Formation professionnelle",
            Other,
            0.0,
            0.55,
            Total,
            true,
            None,
        ),
        def("taxe_apprentissage", "Taxe d'apprentissage", Other, 0.0, 0.68, Total, true, None),
    ]
});

/// The canonical default contributions, in display order.
///
/// The slice is immutable; clone it (`.to_vec()`) to get an editable
/// per-payslip copy.
pub fn default_contributions() -> &'static [ContributionDefinition] {
    &DEFAULT_CONTRIBUTIONS
}

/// Default contributions of one category, in catalog order.
pub fn by_category(category: Category) -> Vec<ContributionDefinition> {
    DEFAULT_CONTRIBUTIONS
        .iter()
        .filter(|d| d.category == category)
        .cloned()
        .collect()
}

/// Same as [`by_category`] but keyed by the wire name.  Unknown names
/// give an empty list.
pub fn by_category_name(name: &str) -> Vec<ContributionDefinition> {
    name.parse::<Category>()
        .map(by_category)
        .unwrap_or_default()
}

/// A contribution definition as written in a configuration file, before
/// validation.  Category and base type are kept as free strings so that
/// one bad entry does not prevent the rest of the file from parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContributionDefinition {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub employee_rate: f64,
    #[serde(default)]
    pub employer_rate: f64,
    pub base_type: String,
    #[serde(default = "default_required")]
    pub is_required: bool,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_required() -> bool {
    true
}

impl From<&ContributionDefinition> for RawContributionDefinition {
    fn from(d: &ContributionDefinition) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            category: d.category.as_str().to_string(),
            employee_rate: d.employee_rate,
            employer_rate: d.employer_rate,
            base_type: d.base_type.as_str().to_string(),
            is_required: d.is_required,
            description: d.description.clone(),
        }
    }
}

/// Outcome of validating one raw definition.
#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionCheck {
    Ok(ContributionDefinition),
    Invalid { id: String, reason: String },
}

impl DefinitionCheck {
    pub fn into_result(self) -> Result<ContributionDefinition, PayrollError> {
        match self {
            Self::Ok(def) => Ok(def),
            Self::Invalid { id, reason } => Err(PayrollError::InvalidDefinition { id, reason }),
        }
    }
}

/// Checks a percentage rate: finite and within 0-100.
pub(crate) fn check_rate(label: &str, rate: f64) -> Result<f64, String> {
    if !rate.is_finite() {
        return Err(format!("{label} rate is not a number"));
    }
    if !(0.0..=100.0).contains(&rate) {
        return Err(format!("{label} rate {rate} is outside 0-100"));
    }
    Ok(rate)
}

/// Validates a raw definition.
pub fn validate(raw: RawContributionDefinition) -> DefinitionCheck {
    let checked = (|| {
        if raw.id.trim().is_empty() {
            return Err("empty id".to_string());
        }
        let category = raw.category.parse::<Category>()?;
        let base_type = raw.base_type.parse::<BaseType>()?;
        let employee_rate = check_rate("employee", raw.employee_rate)?;
        let employer_rate = check_rate("employer", raw.employer_rate)?;
        Ok(ContributionDefinition {
            id: raw.id.clone(),
            name: raw.name.clone(),
            category,
            employee_rate,
            employer_rate,
            base_type,
            is_required: raw.is_required,
            description: raw.description.clone(),
        })
    })();
    match checked {
        Ok(def) => DefinitionCheck::Ok(def),
        Err(reason) => DefinitionCheck::Invalid { id: raw.id, reason },
    }
}

/// An ordered, validated set of contribution definitions.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ContributionCatalog {
    definitions: Vec<ContributionDefinition>,
}

/// A loaded catalog together with every entry that was turned away.
#[derive(Debug, Clone)]
pub struct CatalogLoad {
    pub catalog: ContributionCatalog,
    pub rejected: Vec<(String, String)>,
}

impl ContributionCatalog {
    /// A catalog holding a copy of the default contributions.
    pub fn with_defaults() -> Self {
        Self {
            definitions: default_contributions().to_vec(),
        }
    }

    /// Validates raw entries in order.  Invalid or duplicate entries are
    /// logged and skipped; they are listed in [`CatalogLoad::rejected`].
    pub fn load(raws: impl IntoIterator<Item = RawContributionDefinition>) -> CatalogLoad {
        let mut seen = HashSet::new();
        let mut definitions = Vec::new();
        let mut rejected = Vec::new();
        for raw in raws {
            let check = if seen.contains(&raw.id) {
                DefinitionCheck::Invalid {
                    reason: "duplicate id".to_string(),
                    id: raw.id,
                }
            } else {
                validate(raw)
            };
            match check {
                DefinitionCheck::Ok(def) => {
                    seen.insert(def.id.clone());
                    definitions.push(def);
                }
                DefinitionCheck::Invalid { id, reason } => {
                    warn!(contribution = %id, %reason, "rejecting contribution definition");
                    rejected.push((id, reason));
                }
            }
        }
        CatalogLoad {
            catalog: Self { definitions },
            rejected,
        }
    }

    /// Like [`load`](Self::load) but fails on the first rejected entry.
    pub fn load_strict(
        raws: impl IntoIterator<Item = RawContributionDefinition>,
    ) -> Result<Self, PayrollError> {
        let loaded = Self::load(raws);
        match loaded.rejected.into_iter().next() {
            Some((id, reason)) => Err(PayrollError::InvalidDefinition { id, reason }),
            None => Ok(loaded.catalog),
        }
    }

    pub fn definitions(&self) -> &[ContributionDefinition] {
        &self.definitions
    }

    pub fn get(&self, id: &str) -> Option<&ContributionDefinition> {
        self.definitions.iter().find(|d| d.id == id)
    }

    pub fn by_category(&self, category: Category) -> Vec<ContributionDefinition> {
        self.definitions
            .iter()
            .filter(|d| d.category == category)
            .cloned()
            .collect()
    }

    /// A fresh, editable copy of the definitions for one payslip.
    pub fn instantiate(&self) -> Vec<ContributionDefinition> {
        self.definitions.clone()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(
        id: &str,
        category: &str,
        base_type: &str,
        employee_rate: f64,
    ) -> RawContributionDefinition {
        RawContributionDefinition {
            id: id.into(),
            name: id.to_uppercase(),
            category: category.into(),
            employee_rate,
            employer_rate: 1.0,
            base_type: base_type.into(),
            is_required: true,
            description: None,
        }
    }

    #[test]
    fn defaults_have_unique_ids_and_valid_rates() {
        let defaults = default_contributions();
        let ids: HashSet<_> = defaults.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), defaults.len());
        for d in defaults {
            assert!(matches!(validate(RawContributionDefinition::from(d)), DefinitionCheck::Ok(_)));
        }
    }

    #[test]
    fn executive_items_are_off_by_default() {
        let defaults = default_contributions();
        for id in ["apec", "ceg_t2", "agirc_arrco_t2"] {
            let d = defaults.iter().find(|d| d.id == id).unwrap();
            assert!(!d.is_required, "{id} should start disabled");
        }
    }

    #[test]
    fn by_category_keeps_catalog_order() {
        let ids: Vec<_> = by_category(Category::CsgCrds).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, ["csg_deductible", "csg_non_deductible", "crds"]);
    }

    #[test]
    fn unknown_category_name_is_empty() {
        assert!(by_category_name("mutuelle").is_empty());
        assert_eq!(by_category_name("retirement").len(), 4);
    }

    #[test]
    fn cloned_defaults_do_not_touch_template() {
        let mut copy = ContributionCatalog::with_defaults().instantiate();
        copy[0].employer_rate = 99.0;
        assert_eq!(default_contributions()[0].employer_rate, 7.0);
    }

    #[test]
    fn load_reports_each_bad_entry() {
        let loaded = ContributionCatalog::load(vec![
            raw("ok", "retirement", "tier_a", 3.15),
            raw("bad_base", "retirement", "tier_c", 1.0),
            raw("bad_cat", "mutuelle", "total", 1.0),
            raw("negative", "other", "total", -0.5),
            raw("ok", "other", "total", 1.0),
        ]);
        assert_eq!(loaded.catalog.len(), 1);
        let rejected: Vec<_> = loaded.rejected.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(rejected, ["bad_base", "bad_cat", "negative", "ok"]);
        assert_eq!(loaded.rejected[3].1, "duplicate id");
    }

    #[test]
    fn check_converts_to_result() {
        let ok = validate(raw("t1", "retirement", "tier_a", 3.15)).into_result().unwrap();
        assert_eq!(ok.base_type, BaseType::TierA);
        let err = validate(raw("", "retirement", "tier_a", 3.15)).into_result().unwrap_err();
        assert_eq!(err.to_string(), "invalid contribution definition ``: empty id");
    }

    #[test]
    fn load_strict_fails_on_first_rejection() {
        let err =
            ContributionCatalog::load_strict(vec![raw("x", "other", "total", 101.0)]).unwrap_err();
        assert!(matches!(err, PayrollError::InvalidDefinition { ref id, .. } if id == "x"));
    }
}
