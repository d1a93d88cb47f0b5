//! Synthetic health event generation.

use chrono::{SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::event::{
    ClinicVisit, EnvironmentalConditions, EventPayload, EventRecord, StreamType, SymptomReport,
};

pub const SYMPTOMS: &[&str] = &[
    "fever",
    "cough",
    "fatigue",
    "headache",
    "sore_throat",
    "shortness_of_breath",
    "body_aches",
    "loss_of_taste",
    "loss_of_smell",
    "nausea",
    "diarrhea",
    "congestion",
];

pub const VISIT_TYPES: &[&str] = &[
    "routine_checkup",
    "emergency",
    "follow_up",
    "vaccination",
    "diagnostic_test",
    "consultation",
];

const SEVERITIES: &[&str] = &["mild", "moderate", "severe"];
const REPORT_CHANNELS: &[&str] = &["mobile_app", "web_portal", "phone_hotline"];

/// Produces one event per call. A seed makes both stream selection and field
/// values reproducible.
pub struct Synthesizer {
    rng: StdRng,
    regions: Vec<String>,
}

impl Synthesizer {
    pub fn new(regions: Vec<String>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, regions }
    }

    /// Uniform pick from the configured stream names.
    pub fn pick_stream<'a>(&mut self, streams: &'a [String]) -> Option<&'a str> {
        streams.choose(&mut self.rng).map(String::as_str)
    }

    pub fn generate(&mut self, stream_type: &str) -> Option<EventRecord> {
        let payload = match stream_type.parse::<StreamType>() {
            Ok(StreamType::SymptomReport) => EventPayload::SymptomReport(self.symptom_report()),
            Ok(StreamType::ClinicVisit) => EventPayload::ClinicVisit(self.clinic_visit()),
            Ok(StreamType::EnvironmentalConditions) => {
                EventPayload::EnvironmentalConditions(self.environmental_conditions())
            }
            Err(_) => {
                warn!(stream_type, "Unknown stream type");
                return None;
            }
        };
        Some(EventRecord::new(now_iso8601(), payload))
    }

    fn symptom_report(&mut self) -> SymptomReport {
        let count = self.rng.gen_range(1..=4);
        let symptoms = SYMPTOMS
            .choose_multiple(&mut self.rng, count)
            .map(|s| s.to_string())
            .collect();
        SymptomReport {
            patient_id: self.patient_id(),
            age: self.rng.gen_range(1..=90),
            region: self.region(),
            symptoms,
            severity: self.pick(SEVERITIES),
            duration_days: self.rng.gen_range(1..=14),
            reported_via: self.pick(REPORT_CHANNELS),
        }
    }

    fn clinic_visit(&mut self) -> ClinicVisit {
        ClinicVisit {
            visit_id: format!("V{}", self.rng.gen_range(100_000..=999_999)),
            patient_id: self.patient_id(),
            clinic_id: format!("C{}", self.rng.gen_range(1..=50)),
            region: self.region(),
            visit_type: self.pick(VISIT_TYPES),
            primary_complaint: self.pick(SYMPTOMS),
            temperature_f: round1(self.rng.gen_range(97.0..=104.0)),
            diagnosis_code: format!("ICD{}", self.rng.gen_range(100..=999)),
            prescribed_medication: self.rng.gen_bool(0.5),
            follow_up_required: self.rng.gen_bool(0.5),
        }
    }

    fn environmental_conditions(&mut self) -> EnvironmentalConditions {
        EnvironmentalConditions {
            region: self.region(),
            station_id: format!("S{}", self.rng.gen_range(1..=20)),
            temperature_f: round1(self.rng.gen_range(20.0..=95.0)),
            humidity_percent: self.rng.gen_range(30..=95),
            air_quality_index: self.rng.gen_range(0..=200),
            pollen_count: self.rng.gen_range(0..=500),
            uv_index: self.rng.gen_range(0..=11),
            wind_speed_mph: round1(self.rng.gen_range(0.0..=25.0)),
        }
    }

    fn patient_id(&mut self) -> String {
        format!("P{}", self.rng.gen_range(10_000..=99_999))
    }

    fn region(&mut self) -> String {
        self.regions
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string())
    }

    fn pick(&mut self, options: &[&str]) -> String {
        options
            .choose(&mut self.rng)
            .map(|s| s.to_string())
            .unwrap_or_default()
    }
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
