use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use uuid::Uuid;

/// Checks a string against a named format, returning a message on failure.
pub type FormatChecker = Arc<dyn Fn(&str) -> Result<(), String> + Send + Sync>;

/// Registry from format name to checker.
#[derive(Clone)]
pub struct FormatRegistry {
    checkers: HashMap<String, FormatChecker>,
}

impl FormatRegistry {
    pub fn empty() -> Self {
        Self {
            checkers: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, checker: F)
    where
        F: Fn(&str) -> Result<(), String> + Send + Sync + 'static,
    {
        self.checkers.insert(name.into(), Arc::new(checker));
    }

    pub fn get(&self, name: &str) -> Option<FormatChecker> {
        self.checkers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checkers.contains_key(name)
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("date", check_date);
        registry.register("time", check_time);
        registry.register("date-time", check_date_time);
        registry.register("email", check_email);
        registry.register("hostname", check_hostname);
        registry.register("ipv4", check_ipv4);
        registry.register("ipv6", check_ipv6);
        registry.register("uri", check_uri);
        registry.register("uuid", check_uuid);
        registry.register("regex", check_regex);
        registry.register("json-pointer", check_json_pointer);
        registry
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.checkers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FormatRegistry")
            .field("formats", &names)
            .finish()
    }
}

fn rejected(value: &str, format: &str) -> String {
    format!("'{value}' is not a valid {format}.")
}

fn check_date(value: &str) -> Result<(), String> {
    let valid = is_padded_date(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
    if valid {
        Ok(())
    } else {
        Err(rejected(value, "date"))
    }
}

/// `YYYY-MM-DD` with ASCII digits in every numeric position.
fn is_padded_date(value: &str) -> bool {
    value.len() == 10
        && value.bytes().enumerate().all(|(i, byte)| match i {
            4 | 7 => byte == b'-',
            _ => byte.is_ascii_digit(),
        })
}

fn check_time(value: &str) -> Result<(), String> {
    if is_rfc3339(&format!("1970-01-01T{value}")) {
        Ok(())
    } else {
        Err(rejected(value, "time"))
    }
}

fn check_date_time(value: &str) -> Result<(), String> {
    let valid = matches!(value.as_bytes().get(10), Some(b'T' | b't')) && is_rfc3339(value);
    if valid {
        Ok(())
    } else {
        Err(rejected(value, "date-time"))
    }
}

/// RFC 3339 date-time, also admitting a leap second in the seconds field.
fn is_rfc3339(value: &str) -> bool {
    let normalized = match (value.get(..17), value.get(17..19), value.get(19..)) {
        (Some(head), Some("60"), Some(tail)) => Cow::Owned(format!("{head}59{tail}")),
        _ => Cow::Borrowed(value),
    };
    DateTime::parse_from_rfc3339(&normalized).is_ok()
}

fn check_email(value: &str) -> Result<(), String> {
    let valid = value.rsplit_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !local.starts_with('.')
            && !local.ends_with('.')
            && !local.contains("..")
            && (check_hostname(domain).is_ok() || is_bracketed_ip(domain))
    });
    if valid {
        Ok(())
    } else {
        Err(rejected(value, "email"))
    }
}

fn is_bracketed_ip(domain: &str) -> bool {
    domain
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .is_some_and(|inner| {
            inner.parse::<Ipv4Addr>().is_ok()
                || inner
                    .strip_prefix("IPv6:")
                    .is_some_and(|v6| v6.parse::<Ipv6Addr>().is_ok())
        })
}

fn check_hostname(value: &str) -> Result<(), String> {
    static LABEL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = LABEL_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("Valid regex")
    });
    let trimmed = value.strip_suffix('.').unwrap_or(value);
    let valid = !trimmed.is_empty()
        && trimmed.len() <= 253
        && trimmed.split('.').all(|label| regex.is_match(label));
    if valid {
        Ok(())
    } else {
        Err(rejected(value, "hostname"))
    }
}

fn check_ipv4(value: &str) -> Result<(), String> {
    value
        .parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| rejected(value, "ipv4"))
}

fn check_ipv6(value: &str) -> Result<(), String> {
    value
        .parse::<Ipv6Addr>()
        .map(|_| ())
        .map_err(|_| rejected(value, "ipv6"))
}

fn check_uri(value: &str) -> Result<(), String> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| format!("'{value}' is not a valid uri: {e}"))
}

fn check_uuid(value: &str) -> Result<(), String> {
    let hyphenated = value.len() == 36
        && [8, 13, 18, 23]
            .iter()
            .all(|&i| value.as_bytes().get(i) == Some(&b'-'));
    if hyphenated && Uuid::try_parse(value).is_ok() {
        Ok(())
    } else {
        Err(rejected(value, "uuid"))
    }
}

fn check_regex(value: &str) -> Result<(), String> {
    Regex::new(&crate::keywords::string::translate_pattern(value))
        .map(|_| ())
        .map_err(|e| format!("'{value}' is not a valid regex: {e}"))
}

fn check_json_pointer(value: &str) -> Result<(), String> {
    let well_formed = value.is_empty() || value.starts_with('/');
    let escapes_ok = value
        .match_indices('~')
        .all(|(i, _)| matches!(value.as_bytes().get(i + 1), Some(b'0' | b'1')));
    if well_formed && escapes_ok {
        Ok(())
    } else {
        Err(rejected(value, "json-pointer"))
    }
}
