//! Typed-parameter constraints: `{id:int}`, `{id:int,min=1,max=100}`,
//! `{slug:alpha,len=8}`, `{id:regex,pattern=^[a-f0-9]+$}`, and so on.

use regex::Regex;
use std::sync::Arc;

/// The base type tag for a typed path parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Uint,
    Float,
    Bool,
    Uuid,
    Digit,
    Alpha,
    Alphanumeric,
    Regex,
    String,
}

impl ParamKind {
    fn parse(tag: &str) -> Option<ParamKind> {
        Some(match tag {
            "int" => ParamKind::Int,
            "uint" => ParamKind::Uint,
            "float" => ParamKind::Float,
            "bool" => ParamKind::Bool,
            "uuid" => ParamKind::Uuid,
            "digit" => ParamKind::Digit,
            "alpha" => ParamKind::Alpha,
            "alphanumeric" => ParamKind::Alphanumeric,
            "regex" => ParamKind::Regex,
            "string" => ParamKind::String,
            _ => return None,
        })
    }
}

/// A compiled refinement on a named path parameter.
#[derive(Debug, Clone)]
pub struct ParamConstraint {
    pub kind: ParamKind,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub len: Option<usize>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
    pub pattern: Option<Arc<Regex>>,
}

impl PartialEq for ParamConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.min == other.min
            && self.max == other.max
            && self.len == other.len
            && self.min_len == other.min_len
            && self.max_len == other.max_len
            && self.pattern.as_ref().map(|r| r.as_str()) == other.pattern.as_ref().map(|r| r.as_str())
    }
}

static UUID_RE: &str =
    r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";

impl ParamConstraint {
    /// Parse the inside of a `{name:type,opt=val,...}` segment, given the
    /// part after the first `:`.
    pub fn parse(spec: &str) -> Result<ParamConstraint, String> {
        let mut parts = spec.split(',');
        let type_tag = parts.next().unwrap_or_default().trim();
        let kind = ParamKind::parse(type_tag)
            .ok_or_else(|| format!("unknown parameter type '{type_tag}'"))?;

        let mut min = None;
        let mut max = None;
        let mut len = None;
        let mut min_len = None;
        let mut max_len = None;
        let mut pattern_src = None;

        for opt in parts {
            let opt = opt.trim();
            if opt.is_empty() {
                continue;
            }
            let (key, value) = opt
                .split_once('=')
                .ok_or_else(|| format!("malformed constraint option '{opt}'"))?;
            match key.trim() {
                "min" => min = Some(parse_f64(value)?),
                "max" => max = Some(parse_f64(value)?),
                "len" => len = Some(parse_usize(value)?),
                "min_len" => min_len = Some(parse_usize(value)?),
                "max_len" => max_len = Some(parse_usize(value)?),
                "pattern" => pattern_src = Some(value.trim().to_string()),
                other => return Err(format!("unknown constraint option '{other}'")),
            }
        }

        if kind == ParamKind::Regex && pattern_src.is_none() {
            return Err("regex constraint requires pattern=...".to_string());
        }
        let pattern = match pattern_src {
            Some(src) => Some(Arc::new(
                Regex::new(&src).map_err(|e| format!("invalid regex pattern: {e}"))?,
            )),
            None => None,
        };

        Ok(ParamConstraint {
            kind,
            min,
            max,
            len,
            min_len,
            max_len,
            pattern,
        })
    }

    /// Validate a captured path segment against this constraint.
    #[must_use]
    pub fn validate(&self, segment: &str) -> bool {
        if !self.length_ok(segment) {
            return false;
        }
        match self.kind {
            ParamKind::Int => segment.parse::<i64>().ok().is_some_and(|v| self.bounds_ok(v as f64)),
            ParamKind::Uint => segment.parse::<u64>().ok().is_some_and(|v| self.bounds_ok(v as f64)),
            ParamKind::Float => segment.parse::<f64>().ok().is_some_and(|v| self.bounds_ok(v)),
            ParamKind::Bool => matches!(segment, "true" | "false"),
            ParamKind::Uuid => uuid_regex().is_match(segment),
            ParamKind::Digit => !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()),
            ParamKind::Alpha => !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_alphabetic()),
            ParamKind::Alphanumeric => {
                !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_alphanumeric())
            }
            ParamKind::Regex => self
                .pattern
                .as_ref()
                .is_some_and(|re| re.is_match(segment)),
            ParamKind::String => true,
        }
    }

    fn length_ok(&self, segment: &str) -> bool {
        let n = segment.chars().count();
        if let Some(len) = self.len {
            if n != len {
                return false;
            }
        }
        if let Some(min_len) = self.min_len {
            if n < min_len {
                return false;
            }
        }
        if let Some(max_len) = self.max_len {
            if n > max_len {
                return false;
            }
        }
        true
    }

    fn bounds_ok(&self, value: f64) -> bool {
        if let Some(min) = self.min {
            if value < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return false;
            }
        }
        true
    }
}

fn parse_f64(s: &str) -> Result<f64, String> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| format!("expected number, got '{s}'"))
}

fn parse_usize(s: &str) -> Result<usize, String> {
    s.trim()
        .parse::<usize>()
        .map_err(|_| format!("expected non-negative integer, got '{s}'"))
}

fn uuid_regex() -> &'static Regex {
    static RE: once_cell::sync::OnceCell<Regex> = once_cell::sync::OnceCell::new();
    #[allow(clippy::unwrap_used)]
    RE.get_or_init(|| Regex::new(UUID_RE).unwrap())
}
