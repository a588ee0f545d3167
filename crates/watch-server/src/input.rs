use chrono::{DateTime, Utc};
use thiserror::Error;

/// 一条输入观测：`<name> <value> [rfc3339 时间戳]`
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub metric_name: String,
    pub value: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// 一行输入的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum InputLine {
    Observation(Observation),
    /// 空行，结束当前批次
    BatchEnd,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected `<name> <value> [timestamp]`, got {0} fields")]
    FieldCount(usize),

    #[error("invalid value {0:?}")]
    Value(String),

    #[error("invalid RFC 3339 timestamp {0:?}")]
    Timestamp(String),
}

pub fn parse_line(line: &str) -> Result<InputLine, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(InputLine::BatchEnd);
    }
    if line.starts_with('#') {
        return Ok(InputLine::Comment);
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    if !(2..=3).contains(&fields.len()) {
        return Err(ParseError::FieldCount(fields.len()));
    }

    let value = fields[1]
        .parse::<f64>()
        .map_err(|_| ParseError::Value(fields[1].to_string()))?;

    let timestamp = match fields.get(2) {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map_err(|_| ParseError::Timestamp(raw.to_string()))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    Ok(InputLine::Observation(Observation {
        metric_name: fields[0].to_string(),
        value,
        timestamp,
    }))
}
