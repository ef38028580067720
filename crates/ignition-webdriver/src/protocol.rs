//! WebDriver wire format: request bodies and response decoding

use ignition_browser_api::{BrowserError, BrowserKind, BrowserResult, ElementRef, Locator, SessionOptions};
use serde_json::{Value, json};

/// Key under which W3C drivers return element references
pub(crate) const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4a4e31ed4f1e";

/// Body for `POST /session`
pub(crate) fn new_session_body(options: &SessionOptions) -> Value {
    let args = options.browser_args();

    let always_match = match options.browser {
        BrowserKind::Chrome => json!({
            "browserName": "chrome",
            "goog:chromeOptions": { "args": args },
        }),
        BrowserKind::Firefox => json!({
            "browserName": "firefox",
            "moz:firefoxOptions": { "args": args },
        }),
    };

    json!({ "capabilities": { "alwaysMatch": always_match } })
}

/// Body for `POST /session/{id}/element`
pub(crate) fn find_element_body(locator: &Locator) -> Value {
    json!({ "using": "css selector", "value": locator.to_css() })
}

/// Body for `POST /session/{id}/element/{eid}/value`
pub(crate) fn send_keys_body(text: &str) -> Value {
    json!({ "text": text })
}

/// Split a response into its `value` or a typed error
pub(crate) fn decode_response(status: u16, body: &str) -> BrowserResult<Value> {
    let parsed: Value = serde_json::from_str(body).map_err(|e| {
        BrowserError::Protocol(format!("HTTP {status}: body is not JSON ({e})"))
    })?;

    let value = parsed.get("value").cloned().unwrap_or(Value::Null);

    if (200..300).contains(&status) {
        return Ok(value);
    }

    Err(decode_error(status, &value))
}

fn decode_error(status: u16, value: &Value) -> BrowserError {
    let error = value
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error")
        .to_string();
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match error.as_str() {
        "no such element" | "stale element reference" => BrowserError::NoSuchElement(message),
        "timeout" | "script timeout" => BrowserError::Timeout(message),
        "session not created" | "invalid session id" => BrowserError::SessionUnavailable(message),
        _ => BrowserError::Command {
            error,
            message: format!("HTTP {status}: {message}"),
        },
    }
}

/// Pull the session ID out of a `POST /session` result
pub(crate) fn parse_session_id(value: &Value) -> BrowserResult<String> {
    value
        .get("sessionId")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Protocol("new session response has no sessionId".into()))
}

/// Pull the element reference out of a find result
pub(crate) fn parse_element(value: &Value) -> BrowserResult<ElementRef> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(ElementRef::new)
        .ok_or_else(|| BrowserError::Protocol(format!("not an element reference: {value}")))
}

pub(crate) fn parse_bool(value: &Value) -> BrowserResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| BrowserError::Protocol(format!("expected boolean, got {value}")))
}

pub(crate) fn parse_string(value: &Value) -> BrowserResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Protocol(format!("expected string, got {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chrome_session_body_carries_args() {
        let body = new_session_body(&SessionOptions::default());
        let caps = &body["capabilities"]["alwaysMatch"];
        assert_eq!(caps["browserName"], "chrome");

        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--headless"));
        assert!(args.iter().any(|a| a == "--window-size=1920,1080"));
    }

    #[test]
    fn firefox_session_body() {
        let options = SessionOptions {
            browser: BrowserKind::Firefox,
            ..Default::default()
        };
        let body = new_session_body(&options);
        let caps = &body["capabilities"]["alwaysMatch"];
        assert_eq!(caps["browserName"], "firefox");
        assert!(caps["moz:firefoxOptions"]["args"].is_array());
    }

    #[test]
    fn find_body_uses_css() {
        let body = find_element_body(&Locator::id("login"));
        assert_eq!(body["using"], "css selector");
        assert_eq!(body["value"], "[id=\"login\"]");
    }

    #[test]
    fn success_response_yields_value() {
        let value = decode_response(200, r#"{"value":{"sessionId":"abc","capabilities":{}}}"#)
            .unwrap();
        assert_eq!(parse_session_id(&value).unwrap(), "abc");
    }

    #[test]
    fn element_reference_parsing() {
        let body = format!(r#"{{"value":{{"{ELEMENT_KEY}":"e-17"}}}}"#);
        let value = decode_response(200, &body).unwrap();
        assert_eq!(parse_element(&value).unwrap(), ElementRef::new("e-17"));
        assert!(parse_element(&Value::Null).is_err());
    }

    #[test]
    fn error_responses_are_classified() {
        let missing = decode_response(
            404,
            r#"{"value":{"error":"no such element","message":"gone","stacktrace":""}}"#,
        );
        assert!(matches!(missing, Err(BrowserError::NoSuchElement(m)) if m == "gone"));

        let timeout = decode_response(500, r#"{"value":{"error":"timeout","message":"slow"}}"#);
        assert!(matches!(timeout, Err(BrowserError::Timeout(_))));

        let other = decode_response(
            400,
            r#"{"value":{"error":"element not interactable","message":"covered"}}"#,
        );
        assert!(
            matches!(other, Err(BrowserError::Command { error, .. }) if error == "element not interactable")
        );
    }

    #[test]
    fn non_json_body_is_protocol_error() {
        let result = decode_response(502, "<html>Bad Gateway</html>");
        assert!(matches!(result, Err(BrowserError::Protocol(_))));
    }

    #[test]
    fn scalar_parsers() {
        assert!(parse_bool(&json!(true)).unwrap());
        assert!(parse_bool(&json!("yes")).is_err());
        assert_eq!(parse_string(&json!("Offline")).unwrap(), "Offline");
    }
}
