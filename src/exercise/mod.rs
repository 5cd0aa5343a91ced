use include_dir::{include_dir, Dir};
use serde::Deserialize;
use serde_json::from_str;
use thiserror::Error;

use crate::scoring::ModelFamily;

static EXERCISE_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/exercise");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("exercise file {0} is not valid utf-8")]
    Encoding(String),
    #[error("unable to deserialize exercise file {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("exercise `{0}` is defined twice")]
    Duplicate(String),
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub position: u32,
    pub required_sensors: Vec<String>,
    pub model_family: ModelFamily,
    pub steps: Vec<String>,
}

/// Static table of supported exercises, in display order
#[derive(Debug, Clone)]
pub struct ExerciseCatalog {
    exercises: Vec<Exercise>,
}

impl ExerciseCatalog {
    /// Load the exercise definitions compiled into the binary
    pub fn load() -> Result<Self, CatalogError> {
        let mut exercises = Vec::new();
        for file in EXERCISE_DIR
            .files()
            .filter(|f| f.path().extension().is_some_and(|ext| ext == "json"))
        {
            let name = file.path().display().to_string();
            let contents = file
                .contents_utf8()
                .ok_or_else(|| CatalogError::Encoding(name.clone()))?;
            let exercise: Exercise =
                from_str(contents).map_err(|source| CatalogError::Parse { file: name, source })?;
            exercises.push(exercise);
        }
        Self::from_exercises(exercises)
    }

    pub fn from_exercises(mut exercises: Vec<Exercise>) -> Result<Self, CatalogError> {
        exercises.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        if let Some(dup) = exercises
            .iter()
            .enumerate()
            .find(|(i, e)| exercises[..*i].iter().any(|other| other.id == e.id))
        {
            return Err(CatalogError::Duplicate(dup.1.id.clone()));
        }
        Ok(Self { exercises })
    }

    pub fn get(&self, id: &str) -> Option<&Exercise> {
        self.exercises.iter().find(|e| e.id == id)
    }

    pub fn all(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.exercises.iter().position(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }
}
