//! Validates and sanitizes configuration payloads inside the embedded context.
//!
//! Every rule must pass before anything is handed downstream. Accepted values
//! are coerced to their expected primitive type and trimmed; fields the
//! schema does not know are dropped.
//!
//! 在嵌入上下文内校验并净化配置负载。所有规则通过后才会向下游传递。
//! 接受的值被转换为预期的基本类型并去除首尾空白，未知字段一律丢弃。

use crate::crypto::Token;
use crate::error::ValidationErrors;
use crate::protocol::message::ConfigPayload;
use serde::Serialize;
use serde_json::{Map, Value};

/// A checkout that completes an existing, prepared transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceCheckout {
    pub reference_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(flatten)]
    pub details: CheckoutDetails,
}

/// A checkout fully described by the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectCheckout {
    pub merchant_key: String,
    pub amount: f64,
    pub email: String,
    pub phone_number: String,
    #[serde(flatten)]
    pub details: CheckoutDetails,
}

/// Descriptive fields that are optional in both shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The only form in which configuration reaches the widget's logic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SanitizedConfig {
    Reference(ReferenceCheckout),
    Direct(DirectCheckout),
}

impl SanitizedConfig {
    pub fn details(&self) -> &CheckoutDetails {
        match self {
            SanitizedConfig::Reference(r) => &r.details,
            SanitizedConfig::Direct(d) => &d.details,
        }
    }
}

/// Validates an incoming `CONFIG_PAYLOAD` against the session token and the
/// checkout schema.
///
/// A missing token is a failure, never a default.
///
/// 根据会话令牌和结账结构校验传入的 `CONFIG_PAYLOAD`。缺失令牌即视为失败。
pub fn validate(
    payload: &ConfigPayload,
    expected_token: &Token,
) -> Result<SanitizedConfig, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    match payload.fields.get("token") {
        Some(Value::String(candidate)) if expected_token.matches(candidate) => {}
        _ => errors.push("token", "missing or invalid handshake token"),
    }
    if payload.fields.get("ready") != Some(&Value::Bool(true)) {
        errors.push("ready", "payload is not marked ready");
    }

    let sanitized = sanitize(&payload.fields, &mut errors);
    match sanitized {
        Some(config) if errors.is_empty() => Ok(config),
        _ => Err(errors),
    }
}

/// Applies only the schema rules, without token or ready checks.
///
/// The host uses this to reject a bad `open()` call before creating a frame.
pub fn validate_schema(
    fields: &Map<String, Value>,
) -> Result<SanitizedConfig, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    match sanitize(fields, &mut errors) {
        Some(config) if errors.is_empty() => Ok(config),
        _ => Err(errors),
    }
}

fn sanitize(fields: &Map<String, Value>, errors: &mut ValidationErrors) -> Option<SanitizedConfig> {
    let reference_code = optional_string(fields, "referenceCode", errors);
    let details = CheckoutDetails {
        currency: optional_string(fields, "currency", errors),
        first_name: optional_string(fields, "firstName", errors),
        last_name: optional_string(fields, "lastName", errors),
        provider: optional_string(fields, "provider", errors),
        title: optional_string(fields, "title", errors),
        description: optional_string(fields, "description", errors),
    };

    match reference_code {
        Some(reference_code) => {
            // Direct fields become optional, but must still be well formed.
            let merchant_key = optional_string(fields, "merchantKey", errors);
            let amount = amount(fields, false, errors);
            let email = email(fields, false, errors);
            let phone_number = optional_string(fields, "phoneNumber", errors);
            Some(SanitizedConfig::Reference(ReferenceCheckout {
                reference_code,
                merchant_key,
                amount,
                email,
                phone_number,
                details,
            }))
        }
        None => {
            let merchant_key = required_string(fields, "merchantKey", errors);
            let amount = amount(fields, true, errors);
            let email = email(fields, true, errors);
            let phone_number = required_string(fields, "phoneNumber", errors);
            Some(SanitizedConfig::Direct(DirectCheckout {
                merchant_key: merchant_key?,
                amount: amount?,
                email: email?,
                phone_number: phone_number?,
                details,
            }))
        }
    }
}

fn required_string(
    fields: &Map<String, Value>,
    key: &'static str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Some(Value::String(_)) => {
            errors.push(key, "must not be empty");
            None
        }
        None | Some(Value::Null) => {
            errors.push(key, "is required");
            None
        }
        Some(_) => {
            errors.push(key, "must be a string");
            None
        }
    }
}

fn optional_string(
    fields: &Map<String, Value>,
    key: &'static str,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => {
            errors.push(key, "must be a scalar value");
            None
        }
    }
}

fn amount(
    fields: &Map<String, Value>,
    required: bool,
    errors: &mut ValidationErrors,
) -> Option<f64> {
    let parsed = match fields.get("amount") {
        None | Some(Value::Null) => {
            if required {
                errors.push("amount", "is required");
            }
            return None;
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(value) if value.is_finite() && value > 0.0 => Some(value),
        _ => {
            errors.push("amount", "must be a positive number");
            None
        }
    }
}

fn email(
    fields: &Map<String, Value>,
    required: bool,
    errors: &mut ValidationErrors,
) -> Option<String> {
    let raw = if required {
        required_string(fields, "email", errors)?
    } else {
        match fields.get("email") {
            None | Some(Value::Null) => return None,
            Some(Value::String(s)) if s.trim().is_empty() => return None,
            Some(Value::String(s)) => s.trim().to_owned(),
            Some(_) => {
                errors.push("email", "must be a string");
                return None;
            }
        }
    };
    if is_valid_email(&raw) {
        Some(raw)
    } else {
        errors.push("email", "is not a valid email address");
        None
    }
}

/// A syntactic check: one `@`, a non-empty local part and a dotted domain.
pub fn is_valid_email(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let mut labels = domain.split('.');
    let count = labels.clone().count();
    count >= 2 && labels.all(|label| !label.is_empty())
}
