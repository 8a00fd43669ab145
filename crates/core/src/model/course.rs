use crate::document::{FieldValue, Fields};
use crate::filter_types::FilterClause;
use crate::model::{ModelError, Violations, BOOTCAMPS, COURSES};
use crate::storage::{Database, StoreError};
use serde::Deserialize;
use uuid::Uuid;

/// Allowed values of `minimumSkill`.
pub const SKILLS: [&str; 3] = ["beginner", "intermediate", "advanced"];

/// A JSON string or number, stored as its text form (`"weeks": 8` is `"8"`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Text {
    Str(String),
    Num(serde_json::Number),
}

impl Text {
    fn into_string(self) -> String {
        match self {
            Text::Str(s) => s,
            Text::Num(n) => n.to_string(),
        }
    }
}

/// Client-supplied course fields. The owning bootcamp comes from the route.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub weeks: Option<Text>,
    pub tuition: Option<serde_json::Number>,
    pub minimum_skill: Option<String>,
    pub scholarship_available: Option<bool>,
}

fn check_supplied(input: &CourseInput, v: &mut Violations) {
    if let Some(title) = &input.title {
        v.check(!title.trim().is_empty(), "Please add a course title");
    }
    if let Some(description) = &input.description {
        v.check(!description.trim().is_empty(), "Please add a description");
    }
    if let Some(skill) = &input.minimum_skill {
        v.check(
            SKILLS.contains(&skill.as_str()),
            "Minimum skill must be beginner, intermediate or advanced",
        );
    }
    if let Some(tuition) = &input.tuition {
        v.check(
            tuition.as_f64().is_some_and(|t| t >= 0.0),
            "Tuition can not be negative",
        );
    }
}

pub fn validate_create(input: &CourseInput) -> Result<(), ModelError> {
    let mut v = Violations::default();
    v.check(input.title.is_some(), "Please add a course title");
    v.check(input.description.is_some(), "Please add a description");
    v.check(input.weeks.is_some(), "Please add number of weeks");
    v.check(input.tuition.is_some(), "Please add a tuition cost");
    v.check(input.minimum_skill.is_some(), "Please add a minimum skill");
    check_supplied(input, &mut v);
    v.into_result()
}

pub fn validate_update(input: &CourseInput) -> Result<(), ModelError> {
    let mut v = Violations::default();
    check_supplied(input, &mut v);
    v.into_result()
}

fn supplied_fields(input: CourseInput) -> Fields {
    let mut fields = Fields::new();
    if let Some(title) = input.title {
        fields.insert("title".into(), FieldValue::String(title.trim().to_string()));
    }
    if let Some(description) = input.description {
        fields.insert("description".into(), FieldValue::String(description));
    }
    if let Some(weeks) = input.weeks {
        fields.insert("weeks".into(), FieldValue::String(weeks.into_string()));
    }
    if let Some(tuition) = input.tuition {
        fields.insert(
            "tuition".into(),
            FieldValue::from_json(serde_json::Value::Number(tuition)),
        );
    }
    if let Some(skill) = input.minimum_skill {
        fields.insert("minimumSkill".into(), FieldValue::String(skill));
    }
    if let Some(b) = input.scholarship_available {
        fields.insert("scholarshipAvailable".into(), FieldValue::Boolean(b));
    }
    fields
}

/// Fields of a new course belonging to `bootcamp`.
pub fn create_fields(input: CourseInput, bootcamp: Uuid) -> Result<Fields, ModelError> {
    validate_create(&input)?;
    let mut fields = supplied_fields(input);
    fields
        .entry("scholarshipAvailable".into())
        .or_insert(FieldValue::Boolean(false));
    fields.insert("bootcamp".into(), FieldValue::String(bootcamp.to_string()));
    Ok(fields)
}

/// Changes for an existing course. The owning bootcamp never changes.
pub fn update_fields(input: CourseInput) -> Result<Fields, ModelError> {
    validate_update(&input)?;
    Ok(supplied_fields(input))
}

/// Round an average tuition up to the next multiple of ten.
pub fn round_cost(avg: f64) -> i64 {
    ((avg / 10.0).ceil() * 10.0) as i64
}

/// Recompute `averageCost` of a bootcamp from its courses' tuition. The field
/// is removed when no courses remain. A bootcamp that no longer exists is
/// skipped. Returns the stored value.
///
/// Runs under [`Database::derived_lock`], so concurrent course writes for
/// one bootcamp cannot leave a stale average behind.
pub fn update_average_cost(db: &Database, bootcamp: &Uuid) -> Result<Option<i64>, StoreError> {
    let _serial = db.derived_lock();
    let courses = db.collection(COURSES)?;
    let bootcamps = db.collection(BOOTCAMPS)?;
    let average = courses
        .average(&FilterClause::eq("bootcamp", bootcamp.to_string()), "tuition")
        .map(round_cost);

    let mut changes = Fields::new();
    changes.insert(
        "averageCost".into(),
        average.map_or(FieldValue::Null, FieldValue::Integer),
    );
    match bootcamps.update(bootcamp, changes) {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e),
    }
    tracing::debug!(bootcamp = %bootcamp, average_cost = ?average, "average cost updated");
    Ok(average)
}
