//! Gateway wire messages.
//!
//! Inbound frames are JSON objects discriminated by ad hoc `type` / `topic`
//! fields. They are decoded exactly once, here, into [`InboundMessage`] so the
//! rest of the crate matches on a closed set of variants. Outbound commands
//! are built from [`Command`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::identity::{Role, SubjectId};

const TYPE_ALERT: &str = "alerta";
const TYPE_RECORD_CREATED: &str = "medical_record_created";
const TOPIC_STATUS: &str = "sensor";

/// Errors raised while decoding an inbound frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("invalid value for `{field}`: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// A vital sign the gateway streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    HeartRate,
    OxygenSaturation,
    Temperature,
    /// Compound: one reading carries systolic and diastolic values.
    BloodPressure,
    Ecg,
}

impl Metric {
    /// Look up the metric for a gateway topic. Unknown topics yield `None`.
    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic {
            "ritmo_cardiaco" => Some(Metric::HeartRate),
            "oxigeno" => Some(Metric::OxygenSaturation),
            "temperatura" => Some(Metric::Temperature),
            "presion" | "presión" => Some(Metric::BloodPressure),
            "ecg" => Some(Metric::Ecg),
            _ => None,
        }
    }

    /// The gateway topic for this metric.
    pub fn topic(&self) -> &'static str {
        match self {
            Metric::HeartRate => "ritmo_cardiaco",
            Metric::OxygenSaturation => "oxigeno",
            Metric::Temperature => "temperatura",
            Metric::BloodPressure => "presion",
            Metric::Ecg => "ecg",
        }
    }

    /// Payload field holding the reading inside `data`.
    fn field(&self) -> &'static str {
        match self {
            Metric::HeartRate => "heart_rate",
            Metric::OxygenSaturation => "oxygen_saturation",
            Metric::Temperature => "temperature",
            Metric::BloodPressure => "blood_pressure",
            Metric::Ecg => "ecg",
        }
    }
}

/// Value carried by a sensor sample.
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Scalar(f64),
    Pressure { systolic: f64, diastolic: f64 },
    /// Several consecutive samples (ECG bursts), oldest first.
    Waveform(Vec<f64>),
}

/// Who a message is about and which supervisor it was routed for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Addressing {
    pub subject: Option<SubjectId>,
    pub supervisor: Option<SubjectId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorSample {
    pub metric: Metric,
    pub reading: Reading,
    pub addressing: Addressing,
    /// Unix seconds, when the gateway stamped the sample.
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub addressing: Addressing,
    pub codes: Vec<String>,
}

/// Vital signs attached to a freshly created medical record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordVitals {
    #[serde(default, deserialize_with = "lenient_number")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub blood_pressure: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub oxygen_saturation: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub heart_rate: Option<f64>,
}

/// Notice that the backend stored a new medical record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordCreated {
    pub patient_id: Option<SubjectId>,
    pub doctor_id: Option<SubjectId>,
    pub record_id: Option<u64>,
    pub timestamp: Option<f64>,
    pub vitals: RecordVitals,
    pub message: String,
}

/// Notifications delivered whether or not a measurement is running.
#[derive(Debug, Clone, PartialEq)]
pub enum OutOfBandNotice {
    RecordCreated(RecordCreated),
}

/// A decoded gateway frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    SensorSample(SensorSample),
    Alert(AlertMessage),
    /// Latest sensor hardware status, passed through as-is.
    StatusSnapshot(Value),
    OutOfBand(OutOfBandNotice),
}

/// A gateway frame as it appears on the wire.
///
/// Every field is optional; which ones are present depends on the
/// discriminant (`type` or `topic`).
#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    patient_id: Option<Value>,
    #[serde(default)]
    doctor_id: Option<Value>,
    #[serde(default)]
    alertas: Option<Value>,
    #[serde(default)]
    record_id: Option<Value>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl InboundMessage {
    /// Decode a text frame.
    ///
    /// Returns `Ok(None)` for well-formed frames this client has no use for
    /// (unknown topics, acknowledgements).
    pub fn decode(text: &str) -> Result<Option<Self>, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        let wire: WireMessage = serde_json::from_value(value)?;

        match wire.kind.as_deref() {
            Some(TYPE_RECORD_CREATED) => {
                let record = decode_record(&wire)?;
                return Ok(Some(InboundMessage::OutOfBand(
                    OutOfBandNotice::RecordCreated(record),
                )));
            }
            Some(TYPE_ALERT) => {
                let codes = match &wire.alertas {
                    None => Vec::new(),
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect(),
                    Some(other) => return Err(invalid("alertas", other)),
                };
                return Ok(Some(InboundMessage::Alert(AlertMessage {
                    addressing: decode_addressing(&wire)?,
                    codes,
                })));
            }
            _ => {}
        }

        let Some(topic) = wire.topic.as_deref() else {
            return Ok(None);
        };
        if topic == TOPIC_STATUS {
            return Ok(Some(InboundMessage::StatusSnapshot(
                wire.data.unwrap_or(Value::Null),
            )));
        }
        let Some(metric) = Metric::from_topic(topic) else {
            return Ok(None);
        };
        let data = wire.data.as_ref().ok_or(DecodeError::MissingField("data"))?;

        Ok(Some(InboundMessage::SensorSample(SensorSample {
            metric,
            reading: decode_reading(metric, data)?,
            addressing: decode_addressing(&wire)?,
            timestamp: lookup(wire.timestamp.as_ref(), wire.data.as_ref(), "timestamp")
                .and_then(number),
        })))
    }
}

/// Commands sent to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Announce who is on this connection.
    Identify { user_id: SubjectId, role: Role },
    /// Tell the gateway which patient a doctor is watching.
    DoctorConfig {
        doctor_id: SubjectId,
        patient_id: SubjectId,
    },
    Start { patient_id: SubjectId },
    Stop { patient_id: SubjectId },
}

impl Command {
    pub fn to_json(&self) -> Value {
        match self {
            Command::Identify { user_id, role } => json!({
                "user_id": user_id.0,
                "rol": role.wire_name(),
            }),
            Command::DoctorConfig {
                doctor_id,
                patient_id,
            } => json!({
                "action": "doctor_config",
                "doctor_id": doctor_id.0,
                "patient_id": patient_id.0,
            }),
            Command::Start { patient_id } => json!({
                "action": "start",
                "patient_id": patient_id.0,
            }),
            Command::Stop { patient_id } => json!({
                "action": "stop",
                "patient_id": patient_id.0,
            }),
        }
    }

    /// Serialized text frame.
    pub fn to_frame(&self) -> String {
        self.to_json().to_string()
    }
}

/// Field lookup at the top level first, then inside `data`.
fn lookup<'a>(top: Option<&'a Value>, data: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    top.or_else(|| data.and_then(|d| d.get(key)).filter(|v| !v.is_null()))
}

fn decode_addressing(wire: &WireMessage) -> Result<Addressing, DecodeError> {
    let data = wire.data.as_ref();
    Ok(Addressing {
        subject: subject_id(lookup(wire.patient_id.as_ref(), data, "patient_id"), "patient_id")?,
        supervisor: subject_id(lookup(wire.doctor_id.as_ref(), data, "doctor_id"), "doctor_id")?,
    })
}

fn subject_id(value: Option<&Value>, key: &'static str) -> Result<Option<SubjectId>, DecodeError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.map(|id| Some(SubjectId(id))).ok_or_else(|| invalid(key, value))
}

/// Finite numbers, or strings holding one.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_finite(s),
        _ => None,
    };
    n.filter(|v| v.is_finite())
}

/// `"NaN"`, `"inf"` and out-of-range literals are rejected.
fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Lenient number field: absent, null or unparseable values become `None`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.as_ref().and_then(number))
}

/// Blood pressure is usually `"118/76"`, but anything else is kept as text.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn decode_reading(metric: Metric, data: &Value) -> Result<Reading, DecodeError> {
    let raw = data
        .get(metric.field())
        .or_else(|| data.get("value"))
        .unwrap_or(data);

    match metric {
        Metric::BloodPressure => parse_pressure(raw).ok_or_else(|| invalid("blood_pressure", raw)),
        Metric::Ecg => match raw {
            Value::Array(items) => items
                .iter()
                .map(number)
                .collect::<Option<Vec<_>>>()
                .map(Reading::Waveform)
                .ok_or_else(|| invalid("ecg", raw)),
            other => number(other).map(Reading::Scalar).ok_or_else(|| invalid("ecg", raw)),
        },
        _ => number(raw)
            .map(Reading::Scalar)
            .ok_or_else(|| invalid(metric.field(), raw)),
    }
}

/// `"120/80"` or `{"systolic": 120, "diastolic": 80}`.
fn parse_pressure(raw: &Value) -> Option<Reading> {
    let (systolic, diastolic) = match raw {
        Value::String(s) => {
            let (sys, dia) = s.split_once('/')?;
            (parse_finite(sys)?, parse_finite(dia)?)
        }
        Value::Object(_) => (number(raw.get("systolic")?)?, number(raw.get("diastolic")?)?),
        _ => return None,
    };
    Some(Reading::Pressure {
        systolic,
        diastolic,
    })
}

fn decode_record(wire: &WireMessage) -> Result<RecordCreated, DecodeError> {
    let vitals = match &wire.data {
        Some(data @ Value::Object(_)) => RecordVitals::deserialize(data)?,
        _ => RecordVitals::default(),
    };

    let record_id = match &wire.record_id {
        None => None,
        Some(v) => Some(v.as_u64().ok_or_else(|| invalid("record_id", v))?),
    };

    Ok(RecordCreated {
        patient_id: subject_id(wire.patient_id.as_ref(), "patient_id")?,
        doctor_id: subject_id(wire.doctor_id.as_ref(), "doctor_id")?,
        record_id,
        timestamp: wire.timestamp.as_ref().and_then(number),
        vitals,
        message: wire.message.clone().unwrap_or_default(),
    })
}

fn invalid(field: &'static str, value: &Value) -> DecodeError {
    DecodeError::InvalidValue {
        field,
        value: value.to_string(),
    }
}
