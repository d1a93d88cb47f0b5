//! Health event records.
//!
//! Every record carries a small set of common fields; the stream-specific
//! body is a tagged variant whose tag is serialized as `event_type`.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub const EVENT_SOURCE: &str = "event-generator";
pub const SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    SymptomReport,
    ClinicVisit,
    EnvironmentalConditions,
}

impl StreamType {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamType::SymptomReport => "symptom_report",
            StreamType::ClinicVisit => "clinic_visit",
            StreamType::EnvironmentalConditions => "environmental_conditions",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symptom_report" => Ok(StreamType::SymptomReport),
            "clinic_visit" => Ok(StreamType::ClinicVisit),
            "environmental_conditions" => Ok(StreamType::EnvironmentalConditions),
            other => Err(format!("unknown stream type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomReport {
    pub patient_id: String,
    pub age: u32,
    pub region: String,
    pub symptoms: Vec<String>,
    pub severity: String,
    pub duration_days: u32,
    pub reported_via: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicVisit {
    pub visit_id: String,
    pub patient_id: String,
    pub clinic_id: String,
    pub region: String,
    pub visit_type: String,
    pub primary_complaint: String,
    pub temperature_f: f64,
    pub diagnosis_code: String,
    pub prescribed_medication: bool,
    pub follow_up_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalConditions {
    pub region: String,
    pub station_id: String,
    pub temperature_f: f64,
    pub humidity_percent: u32,
    pub air_quality_index: u32,
    pub pollen_count: u32,
    pub uv_index: u32,
    pub wind_speed_mph: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    SymptomReport(SymptomReport),
    ClinicVisit(ClinicVisit),
    EnvironmentalConditions(EnvironmentalConditions),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// ISO-8601 UTC.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl EventRecord {
    pub fn new(timestamp: String, payload: EventPayload) -> Self {
        Self {
            timestamp,
            source: None,
            schema_version: None,
            payload,
        }
    }

    pub fn event_type(&self) -> StreamType {
        match self.payload {
            EventPayload::SymptomReport(_) => StreamType::SymptomReport,
            EventPayload::ClinicVisit(_) => StreamType::ClinicVisit,
            EventPayload::EnvironmentalConditions(_) => StreamType::EnvironmentalConditions,
        }
    }

    /// Attach the producer metadata shared by all streams.
    pub fn stamp(&mut self) {
        self.source = Some(EVENT_SOURCE.to_string());
        self.schema_version = Some(SCHEMA_VERSION.to_string());
    }

    /// First non-empty of patient id, visit id, station id.
    pub fn partition_key(&self) -> Option<&str> {
        let (patient, visit, station) = match &self.payload {
            EventPayload::SymptomReport(r) => (Some(r.patient_id.as_str()), None, None),
            EventPayload::ClinicVisit(v) => {
                (Some(v.patient_id.as_str()), Some(v.visit_id.as_str()), None)
            }
            EventPayload::EnvironmentalConditions(e) => (None, None, Some(e.station_id.as_str())),
        };
        [patient, visit, station]
            .into_iter()
            .flatten()
            .find(|id| !id.is_empty())
    }

    /// JSON encoding shared verbatim by every destination of a tick.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str) -> EventRecord {
        EventRecord::new(
            "2024-01-01T00:00:00.000000Z".into(),
            EventPayload::EnvironmentalConditions(EnvironmentalConditions {
                region: "Boston".into(),
                station_id: id.into(),
                temperature_f: 71.5,
                humidity_percent: 40,
                air_quality_index: 12,
                pollen_count: 100,
                uv_index: 3,
                wind_speed_mph: 4.2,
            }),
        )
    }

    fn visit(patient: &str, visit: &str) -> EventRecord {
        EventRecord::new(
            "2024-01-01T00:00:00.000000Z".into(),
            EventPayload::ClinicVisit(ClinicVisit {
                visit_id: visit.into(),
                patient_id: patient.into(),
                clinic_id: "C1".into(),
                region: "Newton".into(),
                visit_type: "follow_up".into(),
                primary_complaint: "cough".into(),
                temperature_f: 99.1,
                diagnosis_code: "ICD123".into(),
                prescribed_medication: false,
                follow_up_required: true,
            }),
        )
    }

    #[test]
    fn stream_names_round_trip() {
        for stream in [
            StreamType::SymptomReport,
            StreamType::ClinicVisit,
            StreamType::EnvironmentalConditions,
        ] {
            assert_eq!(stream.as_str().parse::<StreamType>(), Ok(stream));
        }
        assert!("heart_rate".parse::<StreamType>().is_err());
    }

    #[test]
    fn partition_key_prefers_patient_then_visit() {
        assert_eq!(visit("P12345", "V100000").partition_key(), Some("P12345"));
        assert_eq!(visit("", "V100000").partition_key(), Some("V100000"));
        assert_eq!(station("S7").partition_key(), Some("S7"));
        assert_eq!(station("").partition_key(), None);
    }

    #[test]
    fn encoded_record_is_flat_with_metadata() {
        let mut record = station("S7");
        record.stamp();
        let value: serde_json::Value =
            serde_json::from_slice(&record.encode().expect("encode")).expect("json");

        assert_eq!(value["event_type"], "environmental_conditions");
        assert_eq!(value["station_id"], "S7");
        assert_eq!(value["source"], EVENT_SOURCE);
        assert_eq!(value["schema_version"], SCHEMA_VERSION);
        assert_eq!(value["timestamp"], "2024-01-01T00:00:00.000000Z");
    }

    #[test]
    fn unstamped_record_omits_metadata() {
        let value: serde_json::Value =
            serde_json::from_slice(&station("S1").encode().expect("encode")).expect("json");
        assert!(value.get("source").is_none());
        assert!(value.get("schema_version").is_none());
    }
}
