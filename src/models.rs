use serde::{Deserialize, Serialize, Serializer};

/// Bounding box in source image pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One candidate region produced by the plate detector, corners in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRegion {
    pub label: String,
    pub confidence: f32,
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl DetectionRegion {
    /// Integer crop rectangle, truncating the corners toward zero and clamping
    /// to the image. Never smaller than 1x1 so a hit always yields a crop.
    pub fn crop_box(&self, img_width: u32, img_height: u32) -> BoundingBox {
        let clamp = |v: f32, max: u32| (v.max(0.0) as u32).min(max);
        let x_min = clamp(self.x_min, img_width.saturating_sub(1));
        let y_min = clamp(self.y_min, img_height.saturating_sub(1));
        let x_max = clamp(self.x_max, img_width).max(x_min + 1);
        let y_max = clamp(self.y_max, img_height).max(y_min + 1);
        BoundingBox {
            x: x_min,
            y: y_min,
            width: x_max - x_min,
            height: y_max - y_min,
        }
    }
}

/// One line of text reported by the OCR engine
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub region: BoundingBox,
    pub text: String,
    pub confidence: f32,
}

/// Confidence score kept as the exact decimal text of the engine's value,
/// so persisting it never goes through a lossy float column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(String);

impl Confidence {
    /// Returns `None` for NaN and infinities.
    pub fn from_score(score: f32) -> Option<Self> {
        score.is_finite().then(|| Self(score.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Confidence {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parsed: f64 = value
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid confidence value: {}", value))?;
        if !parsed.is_finite() {
            anyhow::bail!("Invalid confidence value: {}", value);
        }
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlateType {
    /// Three letters followed by four digits
    Mercosul,
    /// Three letters, digit, letter, two digits
    Brazil,
    #[serde(rename = "type_plate_not_detect")]
    NotDetected,
}

impl PlateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlateType::Mercosul => "Mercosul",
            PlateType::Brazil => "Brazil",
            PlateType::NotDetected => "type_plate_not_detect",
        }
    }
}

impl TryFrom<&str> for PlateType {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Mercosul" => Ok(PlateType::Mercosul),
            "Brazil" => Ok(PlateType::Brazil),
            "type_plate_not_detect" => Ok(PlateType::NotDetected),
            _ => Err(anyhow::anyhow!("Invalid type_plate value: {}", value)),
        }
    }
}

/// Fields the OCR stage writes onto an existing record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateReading {
    pub detected_text: Vec<String>,
    pub plate_accuracy: Vec<Confidence>,
    pub type_plate: PlateType,
    #[serde(serialize_with = "flag_as_int")]
    pub error_type_plate: bool,
    pub num_letters: u32,
    pub num_numbers: u32,
    pub amount_characters: u32,
}

/// (PK, timestamp) handle of a result row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub pk: String,
    pub timestamp: String,
}

/// One row of the result table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRecord {
    #[serde(rename = "PK")]
    pub pk: String,
    pub timestamp: String,
    pub image_path: String,
    pub cropped_image_path: String,
    #[serde(serialize_with = "flag_as_int")]
    pub detected: bool,
    #[serde(flatten)]
    pub reading: Option<PlateReading>,
}

impl DetectionRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey {
            pk: self.pk.clone(),
            timestamp: self.timestamp.clone(),
        }
    }
}

fn flag_as_int<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}

const METADATA_PREFIX: &str = "metadata/";
const METADATA_SUFFIX: &str = ".metadata.json";

/// Correlation payload written next to a cropped plate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataSidecar {
    pub timestamp: String,
    pub image_name: String,
}

#[derive(Deserialize)]
struct RawSidecar {
    timestamp: Option<String>,
    image_name: Option<String>,
}

impl MetadataSidecar {
    pub fn new(timestamp: impl Into<String>, image_key: &str) -> Self {
        Self {
            timestamp: timestamp.into(),
            image_name: basename(image_key).to_string(),
        }
    }

    /// Object key of the sidecar describing `image_key`
    pub fn object_key(image_key: &str) -> String {
        format!("{}{}{}", METADATA_PREFIX, basename(image_key), METADATA_SUFFIX)
    }

    pub fn is_sidecar_key(key: &str) -> bool {
        key.starts_with(METADATA_PREFIX) && key.ends_with(METADATA_SUFFIX)
    }

    /// Parse a sidecar body. Bodies that are not JSON, or lack either field,
    /// yield `None`; empty strings count as missing.
    pub fn parse(body: &[u8]) -> Option<Self> {
        let raw: RawSidecar = serde_json::from_slice(body).ok()?;
        let timestamp = raw.timestamp.filter(|s| !s.is_empty())?;
        let image_name = raw.image_name.filter(|s| !s.is_empty())?;
        Some(Self {
            timestamp,
            image_name,
        })
    }

    pub fn to_json(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Last path segment of an object key
pub fn basename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_key_uses_basename() {
        assert_eq!(
            MetadataSidecar::object_key("uploads/123_car.jpg"),
            "metadata/123_car.jpg.metadata.json"
        );
        assert!(MetadataSidecar::is_sidecar_key("metadata/123_car.jpg.metadata.json"));
        assert!(!MetadataSidecar::is_sidecar_key("123_car.jpg"));
    }

    #[test]
    fn sidecar_parse_rejects_missing_fields() {
        assert!(MetadataSidecar::parse(br#"{"timestamp":"t"}"#).is_none());
        assert!(MetadataSidecar::parse(br#"{"timestamp":"","image_name":"a.jpg"}"#).is_none());
        assert!(MetadataSidecar::parse(b"not json").is_none());

        let sidecar = MetadataSidecar::parse(br#"{"timestamp":"t","image_name":"a.jpg"}"#).unwrap();
        assert_eq!(sidecar.image_name, "a.jpg");
        assert_eq!(sidecar.timestamp, "t");
    }

    #[test]
    fn crop_box_truncates_and_clamps() {
        let region = DetectionRegion {
            label: "plate".into(),
            confidence: 0.9,
            x_min: 10.9,
            y_min: -3.0,
            x_max: 60.7,
            y_max: 500.0,
        };
        let bbox = region.crop_box(100, 80);
        assert_eq!(bbox, BoundingBox { x: 10, y: 0, width: 50, height: 80 });
    }

    #[test]
    fn degenerate_box_still_has_area() {
        let region = DetectionRegion {
            label: "plate".into(),
            confidence: 0.9,
            x_min: 20.0,
            y_min: 20.0,
            x_max: 20.0,
            y_max: 10.0,
        };
        let bbox = region.crop_box(100, 80);
        assert_eq!((bbox.width, bbox.height), (1, 1));
    }

    #[test]
    fn confidence_keeps_decimal_text() {
        let conf = Confidence::from_score(0.9876).unwrap();
        assert_eq!(conf.as_str(), "0.9876");
        assert!(Confidence::from_score(f32::NAN).is_none());
        assert!(Confidence::try_from("abc".to_string()).is_err());
    }

    #[test]
    fn record_serializes_with_table_attribute_names() {
        let record = DetectionRecord {
            pk: "1_car.jpg".into(),
            timestamp: "2024-01-01T00:00:00.000001".into(),
            image_path: "file:///raw/1_car.jpg".into(),
            cropped_image_path: String::new(),
            detected: false,
            reading: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["PK"], "1_car.jpg");
        assert_eq!(json["detected"], 0);
        assert!(json.get("detected_text").is_none());
    }
}
