//! 分類サービスのレスポンスパーサー
//!
//! 成功時: `{ "success": true, "result": { "class": "...", "confidence": 0.87 } }`
//! 失敗時: `{ "success": false, "error": "..." }` またはプレーンテキスト

use crate::error::{Error, Result};
use crate::types::Classification;
use serde::Deserialize;

#[derive(Deserialize)]
struct ClassifyEnvelope {
    result: Option<Classification>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: String,
}

/// 成功レスポンスをパースする
///
/// # Arguments
/// * `body` - レスポンスボディ
///
/// # Returns
/// * `Ok(Classification)` - パース成功（confidenceは0.0-1.0に収まる）
/// * `Err(Error::Parse)` - JSONが不正、resultがない、confidenceが範囲外
pub fn parse_classify_response(body: &str) -> Result<Classification> {
    let envelope: ClassifyEnvelope = serde_json::from_str(body.trim())
        .map_err(|e| Error::Parse(format!("レスポンスJSONパースエラー: {}", e)))?;

    let classification = match envelope.result {
        Some(c) => c,
        None => {
            return Err(Error::Parse(match envelope.error {
                Some(msg) => format!("resultがありません: {}", msg),
                None => "resultがありません".to_string(),
            }))
        }
    };

    if classification.label.trim().is_empty() {
        return Err(Error::Parse("classが空です".into()));
    }

    let confidence = classification.confidence;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(Error::Parse(format!(
            "confidenceが範囲外です: {}",
            confidence
        )));
    }

    Ok(classification)
}

/// エラーレスポンスから表示用メッセージを取り出す
///
/// 抽出優先順位:
/// 1. JSONの `error` フィールド
/// 2. テキストボディ（前後の空白を除去）
/// 3. `fallback`（ボディが空の場合）
pub fn error_message_from_body(body: &str, fallback: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }

    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(trimmed) {
        if !envelope.error.trim().is_empty() {
            return envelope.error.trim().to_string();
        }
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_response() {
        let body = r#"{"success": true, "result": {"class": "benign-keratosis", "confidence": 0.87}}"#;
        let c = parse_classify_response(body).unwrap();
        assert_eq!(c.label, "benign-keratosis");
        assert!((c.confidence - 0.87).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_without_success_flag() {
        let body = r#"{"result": {"class": "none", "confidence": 0.31}}"#;
        let c = parse_classify_response(body).unwrap();
        assert!(c.is_inconclusive());
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = parse_classify_response("<html>Bad Gateway</html>");
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_parse_missing_result() {
        let result = parse_classify_response(r#"{"success": false, "error": "No image provided"}"#);
        match result {
            Err(Error::Parse(msg)) => assert!(msg.contains("No image provided")),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_confidence_out_of_range() {
        let body = r#"{"result": {"class": "eczema", "confidence": 1.5}}"#;
        assert!(parse_classify_response(body).is_err());

        let body = r#"{"result": {"class": "eczema", "confidence": -0.1}}"#;
        assert!(parse_classify_response(body).is_err());
    }

    #[test]
    fn test_parse_empty_label() {
        let body = r#"{"result": {"class": "  ", "confidence": 0.7}}"#;
        assert!(parse_classify_response(body).is_err());
    }

    #[test]
    fn test_error_message_from_json_envelope() {
        let body = r#"{"success": false, "error": "Image too large. Maximum size is 5MB"}"#;
        assert_eq!(
            error_message_from_body(body, "Bad Request"),
            "Image too large. Maximum size is 5MB"
        );
    }

    #[test]
    fn test_error_message_from_text() {
        assert_eq!(
            error_message_from_body("  upstream timed out\n", "Gateway Timeout"),
            "upstream timed out"
        );
    }

    #[test]
    fn test_error_message_fallback() {
        assert_eq!(
            error_message_from_body("", "Internal Server Error"),
            "Internal Server Error"
        );
    }
}
