//! Event log model: timestamped activity occurrences grouped by case.

mod ingest;

pub use ingest::parse_timestamp;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub case_id: String,
    pub activity: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Remaining columns of the source row, verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Event {
    pub fn new(
        case_id: impl Into<String>,
        activity: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            case_id: case_id.into(),
            activity: activity.into(),
            timestamp,
            resource: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Row positions of one case, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Case<'a> {
    pub id: &'a str,
    pub rows: Vec<usize>,
}

/// Group row positions by case id. Cases come out in first-occurrence order.
pub fn group_cases<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<Case<'a>> {
    let mut position: HashMap<&'a str, usize> = HashMap::new();
    let mut cases: Vec<Case<'a>> = Vec::new();
    for (row, id) in ids.into_iter().enumerate() {
        let slot = *position.entry(id).or_insert_with(|| {
            cases.push(Case {
                id,
                rows: Vec::new(),
            });
            cases.len() - 1
        });
        cases[slot].rows.push(row);
    }
    cases
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn cases(&self) -> Vec<Case<'_>> {
        group_cases(self.events.iter().map(|e| e.case_id.as_str()))
    }

    /// Distinct case ids in first-occurrence order.
    pub fn case_ids(&self) -> Vec<&str> {
        self.cases().into_iter().map(|c| c.id).collect()
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
