use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key in `extra` holding values the model returned for a typed field that
/// could not be coerced into that field's shape
pub const UNCOERCED_KEY: &str = "_uncoerced";

/// One entry of a profile's work history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub role: Option<String>,
    pub company: Option<String>,
    pub duration: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a profile's education history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub degree: Option<String>,
    pub institute: Option<String>,
    pub year: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Structured profile as returned by the model.
///
/// Every field is optional because the model is not guaranteed to fill any of
/// them. Keys the schema does not know, and values that could not be coerced
/// into the expected shape, are kept in `extra` and written back out verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub name: Option<String>,
    pub headline: Option<String>,
    pub about: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileRecord {
    /// Coerce an arbitrary JSON value into a record.
    ///
    /// Returns `None` only when the top-level value is not an object. Values
    /// that cannot be coerced into their typed field are moved under
    /// [`UNCOERCED_KEY`] so they never collide with the typed field's key.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };

        let mut fields = Coercion::new(map);
        let name = fields.string("name");
        let headline = fields.string("headline");
        let about = fields.string("about");
        let skills = fields.list("skills", coerce_skills);
        let experience = fields.list("experience", |v| coerce_entries(v, experience_from_map));
        let education = fields.list("education", |v| coerce_entries(v, education_from_map));

        Some(Self {
            name,
            headline,
            about,
            skills,
            experience,
            education,
            extra: fields.finish(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.headline.is_none()
            && self.about.is_none()
            && self.skills.is_empty()
            && self.experience.is_empty()
            && self.education.is_empty()
            && self.extra.is_empty()
    }
}

/// Result of the extraction stage.
///
/// `Raw` is the degraded form used when the model's answer could not be read
/// as a JSON object; it is a successful outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedRecord {
    Raw { raw: String },
    Profile(ProfileRecord),
}

impl ExtractedRecord {
    pub const fn is_raw(&self) -> bool {
        matches!(self, Self::Raw { .. })
    }

    pub const fn as_profile(&self) -> Option<&ProfileRecord> {
        match self {
            Self::Profile(profile) => Some(profile),
            Self::Raw { .. } => None,
        }
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Raw { raw } => Some(raw),
            Self::Profile(_) => None,
        }
    }
}

impl From<ProfileRecord> for ExtractedRecord {
    fn from(profile: ProfileRecord) -> Self {
        Self::Profile(profile)
    }
}

/// Typed fields taken out of a JSON object, with whatever did not fit set aside.
struct Coercion {
    map: Map<String, Value>,
    uncoerced: Map<String, Value>,
}

impl Coercion {
    fn new(map: Map<String, Value>) -> Self {
        Self {
            map,
            uncoerced: Map::new(),
        }
    }

    /// Scalars are stringified; anything else is set aside.
    fn string(&mut self, key: &str) -> Option<String> {
        let value = self.map.remove(key)?;
        if is_scalar(&value) {
            scalar_to_string(value)
        } else {
            self.uncoerced.insert(key.to_string(), value);
            None
        }
    }

    fn list<T>(
        &mut self,
        key: &str,
        coerce: impl FnOnce(Value) -> Result<Vec<T>, Value>,
    ) -> Vec<T> {
        let Some(value) = self.map.remove(key) else {
            return Vec::new();
        };
        coerce(value).unwrap_or_else(|original| {
            self.uncoerced.insert(key.to_string(), original);
            Vec::new()
        })
    }

    /// Remaining keys, plus the set-aside values under [`UNCOERCED_KEY`].
    fn finish(mut self) -> Map<String, Value> {
        if self.uncoerced.is_empty() {
            return self.map;
        }
        match self.map.get_mut(UNCOERCED_KEY) {
            Some(Value::Object(existing)) => existing.extend(self.uncoerced),
            _ => {
                self.map
                    .insert(UNCOERCED_KEY.to_string(), Value::Object(self.uncoerced));
            }
        }
        self.map
    }
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn coerce_skills(value: Value) -> Result<Vec<String>, Value> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()),
        Value::Array(items) => {
            if items.iter().all(is_scalar) {
                Ok(items.into_iter().filter_map(scalar_to_string).collect())
            } else {
                Err(Value::Array(items))
            }
        }
        other => Err(other),
    }
}

fn coerce_entries<T>(
    value: Value,
    convert: fn(Map<String, Value>) -> T,
) -> Result<Vec<T>, Value> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(vec![convert(map)]),
        Value::Array(items) => {
            if items.iter().all(Value::is_object) {
                Ok(items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(map) => Some(convert(map)),
                        _ => None,
                    })
                    .collect())
            } else {
                Err(Value::Array(items))
            }
        }
        other => Err(other),
    }
}

fn experience_from_map(map: Map<String, Value>) -> Experience {
    let mut fields = Coercion::new(map);
    Experience {
        role: fields.string("role"),
        company: fields.string("company"),
        duration: fields.string("duration"),
        extra: fields.finish(),
    }
}

fn education_from_map(map: Map<String, Value>) -> Education {
    let mut fields = Coercion::new(map);
    Education {
        degree: fields.string("degree"),
        institute: fields.string("institute"),
        year: fields.string("year"),
        extra: fields.finish(),
    }
}

const fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null
    )
}
