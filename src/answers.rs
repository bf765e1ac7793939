//! Questionnaire answer tree
//!
//! The JSON shape is fixed: a root key holding `QuestionGroup[]`, each group
//! holding `Question[]`, each question holding `Answer[]`. Lookups are
//! lenient: missing members become empty strings or empty lists, a single
//! object where a list is expected counts as a one-element list, and
//! non-object list items are ignored.

use crate::error::Result;
use crate::template::{scalar_text, SubstitutionMap};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Root key used by the ID replacement handler
pub const ANSWER_TREE_ROOT: &str = "Questionnaire";

/// Root key used by the questionnaire table handler
pub const QUESTIONNAIRE_TABLE_ROOT: &str = "Q1";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Questionnaire {
    #[serde(rename = "QuestionGroup", default, deserialize_with = "lenient_list")]
    pub groups: Vec<QuestionGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QuestionGroup {
    #[serde(
        rename = "QuestionGroupID",
        alias = "GroupID",
        default,
        deserialize_with = "text"
    )]
    pub id: String,
    #[serde(rename = "Name", default, deserialize_with = "text")]
    pub name: String,
    #[serde(rename = "Question", default, deserialize_with = "lenient_list")]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Question {
    #[serde(rename = "QuestionID", default, deserialize_with = "text")]
    pub id: String,
    #[serde(rename = "Name", default, deserialize_with = "text")]
    pub name: String,
    #[serde(rename = "Answer", default, deserialize_with = "lenient_list")]
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Answer {
    #[serde(rename = "AnswerID", default, deserialize_with = "text")]
    pub id: String,
    #[serde(rename = "Name", default, deserialize_with = "text")]
    pub name: String,
}

/// One row of the populated questionnaire table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRow {
    pub group: String,
    pub question: String,
    pub answers: String,
}

impl Questionnaire {
    /// Parse JSON text and read the questionnaire under `root`.
    ///
    /// Malformed JSON is an error; a missing or non-object root is an empty
    /// questionnaire.
    pub fn from_json(json: &str, root: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        match value.get(root) {
            Some(node) if node.is_object() => Ok(Self::deserialize(node)?),
            _ => Ok(Self::default()),
        }
    }

    /// Flatten into `{{ID}}` → name pairs.
    ///
    /// Tree order: a group's tag, then for each question its tag followed by
    /// its answers' tags. Empty IDs are skipped.
    pub fn substitution_map(&self) -> SubstitutionMap {
        let mut map = SubstitutionMap::new();
        for group in &self.groups {
            push_id_tag(&mut map, &group.id, &group.name);
            for question in &group.questions {
                push_id_tag(&mut map, &question.id, &question.name);
                for answer in &question.answers {
                    push_id_tag(&mut map, &answer.id, &answer.name);
                }
            }
        }
        map
    }

    /// One row per question, answers joined with ", "
    pub fn rows(&self) -> Vec<QuestionRow> {
        self.groups
            .iter()
            .flat_map(|group| {
                group.questions.iter().map(move |question| QuestionRow {
                    group: group.name.clone(),
                    question: question.name.clone(),
                    answers: question
                        .answers
                        .iter()
                        .map(|a| a.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            })
            .collect()
    }
}

fn push_id_tag(map: &mut SubstitutionMap, id: &str, name: &str) {
    if !id.is_empty() {
        map.push(format!("{{{{{}}}}}", id), name);
    }
}

fn text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_text(&value))
}

fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter(Value::is_object)
        .map(|item| serde_json::from_value(item).map_err(D::Error::custom))
        .collect()
}
