//! Practice telemetry: loop events per student and the store they are read from.

use crate::error::EtudeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A bar range a student looped while practicing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopEvent {
    pub start_bar: u32,
    pub end_bar: u32,
    pub loop_count: u32,
    #[serde(default)]
    pub last_practiced_at: String,
}

/// One student's practice data for one piece of material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeRecord {
    pub student_id: String,
    #[serde(default)]
    pub instrument: Option<String>,
    #[serde(default)]
    pub target_tempo: Option<u32>,
    #[serde(default)]
    pub weak_spots: Option<Vec<LoopEvent>>,
}

impl PracticeRecord {
    /// Loop events, treating a missing list as empty
    pub fn loop_events(&self) -> &[LoopEvent] {
        self.weak_spots.as_deref().unwrap_or(&[])
    }
}

/// Read-only access to practice telemetry
pub trait TelemetryStore {
    /// Title of the material, `None` when it does not exist
    fn material_title(&self, material_id: &str) -> Result<Option<String>, EtudeError>;

    /// Records for the material from the given students
    fn practice_records(
        &self,
        material_id: &str,
        student_ids: &[String],
    ) -> Result<Vec<PracticeRecord>, EtudeError>;
}

/// Telemetry for one material, as stored in a JSON fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialTelemetry {
    pub material_id: String,
    pub title: String,
    /// Students in the class; defaults to everyone with a record
    #[serde(default)]
    pub class_ids: Vec<String>,
    #[serde(default)]
    pub records: Vec<PracticeRecord>,
}

impl MaterialTelemetry {
    pub fn cohort(&self) -> Vec<String> {
        if !self.class_ids.is_empty() {
            return self.class_ids.clone();
        }
        let mut seen = BTreeSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.student_id.as_str()))
            .map(|r| r.student_id.clone())
            .collect()
    }
}

/// Store backed by in-memory vectors
#[derive(Debug, Clone, Default)]
pub struct InMemoryTelemetry {
    materials: Vec<MaterialTelemetry>,
}

impl InMemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_material(mut self, material: MaterialTelemetry) -> Self {
        self.materials.push(material);
        self
    }

    /// Read a single material object or a list of them
    pub fn from_json(content: &str) -> Result<Self, EtudeError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Fixture {
            Many(Vec<MaterialTelemetry>),
            One(MaterialTelemetry),
        }

        let fixture: Fixture =
            serde_json::from_str(content).map_err(|e| EtudeError::Telemetry(e.to_string()))?;
        let materials = match fixture {
            Fixture::Many(materials) => materials,
            Fixture::One(material) => vec![material],
        };
        Ok(Self { materials })
    }

    pub fn materials(&self) -> &[MaterialTelemetry] {
        &self.materials
    }

    fn find(&self, material_id: &str) -> Option<&MaterialTelemetry> {
        self.materials.iter().find(|m| m.material_id == material_id)
    }
}

impl TelemetryStore for InMemoryTelemetry {
    fn material_title(&self, material_id: &str) -> Result<Option<String>, EtudeError> {
        Ok(self.find(material_id).map(|m| m.title.clone()))
    }

    fn practice_records(
        &self,
        material_id: &str,
        student_ids: &[String],
    ) -> Result<Vec<PracticeRecord>, EtudeError> {
        Ok(self
            .find(material_id)
            .map(|m| {
                m.records
                    .iter()
                    .filter(|r| student_ids.contains(&r.student_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
