//! Static reference data: measures, submeasures, controls, and the
//! control-submeasure relationships carrying per-level policy.
//!
//! A [`Catalog`] is only ever built through [`CatalogDocument`] validation, so
//! every relationship is owned by exactly one submeasure and every submeasure
//! by exactly one measure.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{
    CatalogVersion, ControlId, MeasureId, RelationshipKey, Score, SecurityLevel, SubmeasureId,
};

/// Atomic security requirement, independent of any security level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub id: ControlId,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submeasure {
    pub id: SubmeasureId,
    pub code: String,
    pub name: String,
    pub measure_id: MeasureId,
    pub relationships: Vec<RelationshipKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measure {
    pub id: MeasureId,
    pub code: String,
    pub name: String,
    pub submeasures: Vec<SubmeasureId>,
}

/// Policy a relationship carries at one security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LevelRequirement {
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default)]
    pub minimum_score: Option<Score>,
}

/// The M:N join between controls and submeasures; the unit of scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRelationship {
    pub control_id: ControlId,
    pub submeasure_id: SubmeasureId,
    #[serde(default)]
    pub requirements: BTreeMap<SecurityLevel, LevelRequirement>,
}

impl ControlRelationship {
    pub fn key(&self) -> RelationshipKey {
        RelationshipKey {
            control_id: self.control_id.clone(),
            submeasure_id: self.submeasure_id.clone(),
        }
    }

    /// Requirement at `level`; a missing level is not applicable.
    pub fn requirement(&self, level: SecurityLevel) -> LevelRequirement {
        self.requirements.get(&level).copied().unwrap_or_default()
    }
}

/// A relationship resolved against one security level, ready for scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipPolicy {
    pub key: RelationshipKey,
    pub control_code: String,
    pub is_mandatory: bool,
    pub minimum_score: Option<Score>,
}

impl RelationshipPolicy {
    pub fn is_applicable(&self) -> bool {
        self.minimum_score.is_some()
    }
}

/// Serialized shape of a catalog as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub version: CatalogVersion,
    pub controls: Vec<Control>,
    pub measures: Vec<Measure>,
    pub submeasures: Vec<Submeasure>,
    pub relationships: Vec<ControlRelationship>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("duplicate control id {0}")]
    DuplicateControl(ControlId),
    #[error("duplicate submeasure id {0}")]
    DuplicateSubmeasure(SubmeasureId),
    #[error("duplicate measure id {0}")]
    DuplicateMeasure(MeasureId),
    #[error("duplicate control code {0}")]
    DuplicateControlCode(String),
    #[error("duplicate submeasure code {0}")]
    DuplicateSubmeasureCode(String),
    #[error("duplicate measure code {0}")]
    DuplicateMeasureCode(String),
    #[error("duplicate relationship {0}")]
    DuplicateRelationship(RelationshipKey),
    #[error("relationship {relationship} references unknown control")]
    UnknownControl { relationship: RelationshipKey },
    #[error("measure {measure} lists unknown submeasure {submeasure}")]
    UnknownSubmeasure {
        measure: MeasureId,
        submeasure: SubmeasureId,
    },
    #[error("submeasure {submeasure} lists undefined relationship {relationship}")]
    UnknownRelationship {
        submeasure: SubmeasureId,
        relationship: RelationshipKey,
    },
    #[error("submeasure {submeasure} lists relationship {relationship} belonging to another submeasure")]
    MisplacedRelationship {
        submeasure: SubmeasureId,
        relationship: RelationshipKey,
    },
    #[error("relationship {0} is listed more than once")]
    DuplicateListing(RelationshipKey),
    #[error("relationship {0} is not listed by its submeasure")]
    OrphanRelationship(RelationshipKey),
    #[error("submeasure {submeasure} is owned by {owners} measures (expected exactly one)")]
    SubmeasureOwnership {
        submeasure: SubmeasureId,
        owners: usize,
    },
    #[error("submeasure {submeasure} declares measure {declared} but is listed by {owner}")]
    MeasureMismatch {
        submeasure: SubmeasureId,
        declared: MeasureId,
        owner: MeasureId,
    },
    #[error("catalog version {0} is already registered")]
    VersionConflict(CatalogVersion),
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid catalog json: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Validated, immutable catalog snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "CatalogDocument")]
pub struct Catalog {
    version: CatalogVersion,
    controls: BTreeMap<ControlId, Control>,
    measures: Vec<Measure>,
    submeasures: BTreeMap<SubmeasureId, Submeasure>,
    relationships: BTreeMap<RelationshipKey, ControlRelationship>,
}

impl Catalog {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_reader(reader)?;
        Self::try_from(document)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(raw)?;
        Self::try_from(document)
    }

    pub fn version(&self) -> &CatalogVersion {
        &self.version
    }

    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }

    pub fn control(&self, id: &ControlId) -> Option<&Control> {
        self.controls.get(id)
    }

    pub fn submeasure(&self, id: &SubmeasureId) -> Option<&Submeasure> {
        self.submeasures.get(id)
    }

    pub fn relationship(&self, key: &RelationshipKey) -> Option<&ControlRelationship> {
        self.relationships.get(key)
    }

    pub fn relationships(&self) -> impl Iterator<Item = &ControlRelationship> {
        self.relationships.values()
    }

    /// Child submeasures of `measure` in catalog order.
    pub fn submeasures_of<'a>(
        &'a self,
        measure: &'a Measure,
    ) -> impl Iterator<Item = &'a Submeasure> + 'a {
        measure
            .submeasures
            .iter()
            .filter_map(move |id| self.submeasures.get(id))
    }

    /// Relationships of `submeasure` in catalog order.
    pub fn relationships_of<'a>(
        &'a self,
        submeasure: &'a Submeasure,
    ) -> impl Iterator<Item = &'a ControlRelationship> + 'a {
        submeasure
            .relationships
            .iter()
            .filter_map(move |key| self.relationships.get(key))
    }

    pub fn resolve(
        &self,
        relationship: &ControlRelationship,
        level: SecurityLevel,
    ) -> RelationshipPolicy {
        let requirement = relationship.requirement(level);
        let control_code = self
            .controls
            .get(&relationship.control_id)
            .map(|control| control.code.clone())
            .unwrap_or_else(|| relationship.control_id.0.clone());

        RelationshipPolicy {
            key: relationship.key(),
            control_code,
            is_mandatory: requirement.is_mandatory,
            minimum_score: requirement.minimum_score,
        }
    }

    pub fn policy(
        &self,
        key: &RelationshipKey,
        level: SecurityLevel,
    ) -> Option<RelationshipPolicy> {
        self.relationships
            .get(key)
            .map(|relationship| self.resolve(relationship, level))
    }

    /// Look up a relationship by the human-facing codes used in exports.
    pub fn find_by_codes(
        &self,
        control_code: &str,
        submeasure_code: &str,
    ) -> Option<RelationshipKey> {
        let submeasure = self
            .submeasures
            .values()
            .find(|submeasure| submeasure.code.eq_ignore_ascii_case(submeasure_code))?;

        submeasure
            .relationships
            .iter()
            .find(|key| {
                self.controls
                    .get(&key.control_id)
                    .map(|control| control.code.eq_ignore_ascii_case(control_code))
                    .unwrap_or(false)
            })
            .cloned()
    }
}

impl TryFrom<CatalogDocument> for Catalog {
    type Error = CatalogError;

    fn try_from(document: CatalogDocument) -> Result<Self, Self::Error> {
        let CatalogDocument {
            version,
            controls: control_list,
            measures,
            submeasures: submeasure_list,
            relationships: relationship_list,
        } = document;

        let mut controls = BTreeMap::new();
        let mut control_codes = BTreeSet::new();
        for control in control_list {
            if controls.contains_key(&control.id) {
                return Err(CatalogError::DuplicateControl(control.id));
            }
            if !control_codes.insert(control.code.to_ascii_uppercase()) {
                return Err(CatalogError::DuplicateControlCode(control.code));
            }
            controls.insert(control.id.clone(), control);
        }

        let mut relationships = BTreeMap::new();
        for relationship in relationship_list {
            let key = relationship.key();
            if !controls.contains_key(&relationship.control_id) {
                return Err(CatalogError::UnknownControl { relationship: key });
            }
            if relationships.contains_key(&key) {
                return Err(CatalogError::DuplicateRelationship(key));
            }
            relationships.insert(key, relationship);
        }

        let mut submeasures = BTreeMap::new();
        let mut listed = BTreeSet::new();
        let mut submeasure_codes = BTreeSet::new();
        for submeasure in submeasure_list {
            if submeasures.contains_key(&submeasure.id) {
                return Err(CatalogError::DuplicateSubmeasure(submeasure.id));
            }
            if !submeasure_codes.insert(submeasure.code.to_ascii_uppercase()) {
                return Err(CatalogError::DuplicateSubmeasureCode(submeasure.code));
            }
            for key in &submeasure.relationships {
                if key.submeasure_id != submeasure.id {
                    return Err(CatalogError::MisplacedRelationship {
                        submeasure: submeasure.id.clone(),
                        relationship: key.clone(),
                    });
                }
                if !relationships.contains_key(key) {
                    return Err(CatalogError::UnknownRelationship {
                        submeasure: submeasure.id.clone(),
                        relationship: key.clone(),
                    });
                }
                if !listed.insert(key.clone()) {
                    return Err(CatalogError::DuplicateListing(key.clone()));
                }
            }
            submeasures.insert(submeasure.id.clone(), submeasure);
        }

        if let Some(orphan) = relationships.keys().find(|key| !listed.contains(*key)) {
            return Err(CatalogError::OrphanRelationship(orphan.clone()));
        }

        let mut measure_ids = BTreeSet::new();
        let mut measure_codes = BTreeSet::new();
        let mut owners: BTreeMap<&SubmeasureId, Vec<&MeasureId>> = BTreeMap::new();
        for measure in &measures {
            if !measure_ids.insert(&measure.id) {
                return Err(CatalogError::DuplicateMeasure(measure.id.clone()));
            }
            if !measure_codes.insert(measure.code.to_ascii_uppercase()) {
                return Err(CatalogError::DuplicateMeasureCode(measure.code.clone()));
            }
            for submeasure_id in &measure.submeasures {
                if !submeasures.contains_key(submeasure_id) {
                    return Err(CatalogError::UnknownSubmeasure {
                        measure: measure.id.clone(),
                        submeasure: submeasure_id.clone(),
                    });
                }
                owners.entry(submeasure_id).or_default().push(&measure.id);
            }
        }

        for submeasure in submeasures.values() {
            let owned_by = owners.get(&submeasure.id).map(Vec::as_slice).unwrap_or(&[]);
            match owned_by {
                [owner] if **owner == submeasure.measure_id => {}
                [owner] => {
                    return Err(CatalogError::MeasureMismatch {
                        submeasure: submeasure.id.clone(),
                        declared: submeasure.measure_id.clone(),
                        owner: (*owner).clone(),
                    })
                }
                _ => {
                    return Err(CatalogError::SubmeasureOwnership {
                        submeasure: submeasure.id.clone(),
                        owners: owned_by.len(),
                    })
                }
            }
        }

        Ok(Self {
            version,
            controls,
            measures,
            submeasures,
            relationships,
        })
    }
}

/// Catalog versions available to assessments, with one marked current.
///
/// Assessments record the version they were created against and are always
/// recomputed against that pinned snapshot.
#[derive(Debug, Clone)]
pub struct CatalogRegistry {
    current: Arc<Catalog>,
    catalogs: BTreeMap<CatalogVersion, Arc<Catalog>>,
}

impl CatalogRegistry {
    pub fn new(current: Catalog) -> Self {
        let current = Arc::new(current);
        let mut catalogs = BTreeMap::new();
        catalogs.insert(current.version().clone(), current.clone());
        Self { current, catalogs }
    }

    /// Keep an older catalog available for assessments pinned to it.
    pub fn pin(&mut self, catalog: Catalog) -> Result<Arc<Catalog>, CatalogError> {
        let version = catalog.version().clone();
        if self.catalogs.contains_key(&version) {
            return Err(CatalogError::VersionConflict(version));
        }
        let catalog = Arc::new(catalog);
        self.catalogs.insert(version, catalog.clone());
        Ok(catalog)
    }

    /// Register a new catalog and make it the default for new assessments.
    pub fn promote(&mut self, catalog: Catalog) -> Result<(), CatalogError> {
        self.current = self.pin(catalog)?;
        Ok(())
    }

    pub fn current_version(&self) -> &CatalogVersion {
        self.current.version()
    }

    pub fn current(&self) -> Arc<Catalog> {
        self.current.clone()
    }

    pub fn get(&self, version: &CatalogVersion) -> Option<Arc<Catalog>> {
        self.catalogs.get(version).cloned()
    }

    pub fn versions(&self) -> impl Iterator<Item = &CatalogVersion> {
        self.catalogs.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> CatalogDocument {
        serde_json::from_value(serde_json::json!({
            "version": "2024.1",
            "controls": [
                { "id": "c1", "code": "POL-001", "name": "Security policy" },
                { "id": "c2", "code": "ACC-001", "name": "Access reviews" }
            ],
            "measures": [
                { "id": "m1", "code": "M1", "name": "Governance", "submeasures": ["s1", "s2"] }
            ],
            "submeasures": [
                {
                    "id": "s1", "code": "M1.1", "name": "Policies", "measure_id": "m1",
                    "relationships": [ { "control_id": "c1", "submeasure_id": "s1" } ]
                },
                {
                    "id": "s2", "code": "M1.2", "name": "Access", "measure_id": "m1",
                    "relationships": [
                        { "control_id": "c1", "submeasure_id": "s2" },
                        { "control_id": "c2", "submeasure_id": "s2" }
                    ]
                }
            ],
            "relationships": [
                { "control_id": "c1", "submeasure_id": "s1",
                  "requirements": { "basic": { "is_mandatory": true, "minimum_score": 2 } } },
                { "control_id": "c1", "submeasure_id": "s2",
                  "requirements": { "medium": { "is_mandatory": false, "minimum_score": 3 } } },
                { "control_id": "c2", "submeasure_id": "s2",
                  "requirements": { "basic": { "is_mandatory": true, "minimum_score": null } } }
            ]
        }))
        .expect("fixture deserializes")
    }

    #[test]
    fn shared_control_keeps_distinct_policy_per_submeasure() {
        let catalog = Catalog::try_from(document()).expect("valid catalog");
        let in_s1 = catalog
            .policy(&RelationshipKey::new("c1", "s1"), SecurityLevel::Basic)
            .expect("relationship exists");
        let in_s2 = catalog
            .policy(&RelationshipKey::new("c1", "s2"), SecurityLevel::Basic)
            .expect("relationship exists");

        assert!(in_s1.is_applicable());
        assert!(in_s1.is_mandatory);
        assert!(!in_s2.is_applicable());
        assert_eq!(in_s2.control_code, "POL-001");
    }

    #[test]
    fn explicit_null_minimum_is_not_applicable() {
        let catalog = Catalog::try_from(document()).expect("valid catalog");
        let policy = catalog
            .policy(&RelationshipKey::new("c2", "s2"), SecurityLevel::Basic)
            .expect("relationship exists");
        assert!(policy.is_mandatory);
        assert!(!policy.is_applicable());
    }

    #[test]
    fn rejects_relationship_listed_under_foreign_submeasure() {
        let mut doc = document();
        doc.submeasures[0]
            .relationships
            .push(RelationshipKey::new("c2", "s2"));
        match Catalog::try_from(doc) {
            Err(CatalogError::MisplacedRelationship { submeasure, .. }) => {
                assert_eq!(submeasure.as_str(), "s1")
            }
            other => panic!("expected misplaced relationship, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unlisted_relationship() {
        let mut doc = document();
        doc.submeasures[1].relationships.pop();
        assert!(matches!(
            Catalog::try_from(doc),
            Err(CatalogError::OrphanRelationship(key)) if key == RelationshipKey::new("c2", "s2")
        ));
    }

    #[test]
    fn rejects_duplicate_control_code() {
        let mut doc = document();
        doc.controls[1].code = "pol-001".to_string();
        assert!(matches!(
            Catalog::try_from(doc),
            Err(CatalogError::DuplicateControlCode(code)) if code == "pol-001"
        ));
    }

    #[test]
    fn rejects_duplicate_submeasure_code() {
        let mut doc = document();
        doc.submeasures[1].code = "M1.1".to_string();
        assert!(matches!(
            Catalog::try_from(doc),
            Err(CatalogError::DuplicateSubmeasureCode(code)) if code == "M1.1"
        ));
    }

    #[test]
    fn rejects_duplicate_measure_code() {
        let mut doc = document();
        doc.measures.push(Measure {
            id: MeasureId::new("m2"),
            code: "M1".to_string(),
            name: "Duplicate governance".to_string(),
            submeasures: Vec::new(),
        });
        assert!(matches!(
            Catalog::try_from(doc),
            Err(CatalogError::DuplicateMeasureCode(code)) if code == "M1"
        ));
    }

    #[test]
    fn rejects_submeasure_without_owner() {
        let mut doc = document();
        doc.measures[0].submeasures.pop();
        assert!(matches!(
            Catalog::try_from(doc),
            Err(CatalogError::SubmeasureOwnership { owners: 0, .. })
        ));
    }

    #[test]
    fn finds_relationships_by_codes() {
        let catalog = Catalog::try_from(document()).expect("valid catalog");
        assert_eq!(
            catalog.find_by_codes("pol-001", "M1.2"),
            Some(RelationshipKey::new("c1", "s2"))
        );
        assert_eq!(catalog.find_by_codes("ACC-001", "M1.1"), None);
    }

    #[test]
    fn registry_keeps_pinned_versions() {
        let catalog = Catalog::try_from(document()).expect("valid catalog");
        let mut registry = CatalogRegistry::new(catalog.clone());
        assert!(matches!(
            registry.pin(catalog),
            Err(CatalogError::VersionConflict(_))
        ));

        let mut next = document();
        next.version = CatalogVersion::new("2025.1");
        registry
            .promote(Catalog::try_from(next).expect("valid catalog"))
            .expect("new version registers");

        assert_eq!(registry.current_version().as_str(), "2025.1");
        assert!(registry.get(&CatalogVersion::new("2024.1")).is_some());
    }
}
