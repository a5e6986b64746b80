// Firestoreトリガーイベントのデコード
//
// トリガーランタイムからJSON形式で届く`document.written`イベントデータを
// ドメインのChangeEventに変換する。Firestoreの型付き値
// （{"stringValue": "..."}等）は素のJSON値に変換する。

use crate::domain::{ChangeEvent, DocumentSnapshot, Payload};
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// イベントデコードのエラー型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventDecodeError {
    /// ドキュメント名を特定できない
    #[error("ドキュメント名がありません: valueにもoldValueにもsubjectにも含まれていません")]
    MissingDocumentName,

    /// 型付き値の形式が不正
    #[error("不正なFirestore値: field={field}, reason={reason}")]
    InvalidValue {
        /// 不正だったフィールドのパス
        field: String,
        /// 理由
        reason: String,
    },
}

/// Firestoreドキュメント（イベント内の表現）
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreDocument {
    /// 完全なリソース名（projects/{p}/databases/{d}/documents/{path}）
    #[serde(default)]
    pub name: String,
    /// 型付きフィールド
    #[serde(default)]
    pub fields: Map<String, Value>,
    /// 作成日時
    #[serde(default)]
    pub create_time: Option<String>,
    /// 更新日時
    #[serde(default)]
    pub update_time: Option<String>,
}

impl FirestoreDocument {
    /// イベント内で実体を持つか
    ///
    /// 削除・作成イベントでは欠落側が`{}`として届くことがある。
    fn is_present(&self) -> bool {
        !self.name.is_empty() || !self.fields.is_empty()
    }

    /// 型付きフィールドを素のJSONマップに変換
    pub fn decode_fields(&self) -> Result<Payload, EventDecodeError> {
        decode_map("", &self.fields)
    }
}

/// 更新されたフィールドパス
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMask {
    #[serde(default)]
    pub field_paths: Vec<String>,
}

/// Firestore `document.written` イベントデータ
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreEvent {
    /// 変更前のドキュメント（作成時は欠落）
    #[serde(default)]
    pub old_value: Option<FirestoreDocument>,
    /// 変更後のドキュメント（削除時は欠落）
    #[serde(default)]
    pub value: Option<FirestoreDocument>,
    /// 更新マスク
    #[serde(default)]
    pub update_mask: Option<UpdateMask>,
}

impl FirestoreEvent {
    /// ChangeEventに変換
    ///
    /// # 引数
    /// * `subject` - CloudEventの`subject`（例: "documents/users/u1"）。
    ///   ドキュメント名がイベント本体に無い場合のフォールバック
    ///
    /// # エラー
    /// - `MissingDocumentName`: ドキュメントIDを特定できない
    /// - `InvalidValue`: 型付き値の形式が不正
    pub fn into_change_event(self, subject: Option<&str>) -> Result<ChangeEvent, EventDecodeError> {
        let before = self.old_value.filter(FirestoreDocument::is_present);
        let after = self.value.filter(FirestoreDocument::is_present);

        let id = [&after, &before]
            .into_iter()
            .flatten()
            .find_map(|doc| document_id(&doc.name))
            .or_else(|| subject.and_then(document_id))
            .ok_or(EventDecodeError::MissingDocumentName)?;

        Ok(ChangeEvent::new(
            to_snapshot(&id, before.as_ref())?,
            to_snapshot(&id, after.as_ref())?,
        ))
    }
}

/// リソース名の最終セグメントをドキュメントIDとして取り出す
pub fn document_id(name: &str) -> Option<String> {
    name.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && *segment != "documents")
        .map(str::to_string)
}

fn to_snapshot(
    id: &str,
    document: Option<&FirestoreDocument>,
) -> Result<DocumentSnapshot, EventDecodeError> {
    match document {
        Some(doc) => Ok(DocumentSnapshot::new(id, doc.decode_fields()?)),
        None => Ok(DocumentSnapshot::missing(id)),
    }
}

fn field_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> EventDecodeError {
    EventDecodeError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn decode_map(prefix: &str, fields: &Map<String, Value>) -> Result<Payload, EventDecodeError> {
    fields
        .iter()
        .map(|(key, value)| {
            let path = field_path(prefix, key);
            decode_value(&path, value).map(|decoded| (key.clone(), decoded))
        })
        .collect()
}

/// Firestoreの型付き値を素のJSON値に変換
///
/// 型付き値はちょうど1つのキーを持つオブジェクト。
pub fn decode_value(path: &str, typed: &Value) -> Result<Value, EventDecodeError> {
    let object = typed
        .as_object()
        .ok_or_else(|| invalid(path, "型付き値がオブジェクトではありません"))?;

    let mut entries = object.iter();
    let (kind, inner) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => return Err(invalid(path, "型付き値はキーを1つだけ持つ必要があります")),
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| invalid(path, "booleanValueが真偽値ではありません")),
        "integerValue" => decode_integer(path, inner),
        "doubleValue" => decode_double(path, inner),
        "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| invalid(path, format!("{}が文字列ではありません", kind))),
        "geoPointValue" => decode_geo_point(path, inner),
        "arrayValue" => decode_array(path, inner),
        "mapValue" => {
            let fields = match inner.get("fields") {
                None | Some(Value::Null) => return Ok(Value::Object(Payload::new())),
                Some(Value::Object(fields)) => fields,
                Some(_) => return Err(invalid(path, "mapValue.fieldsがオブジェクトではありません")),
            };
            decode_map(path, fields).map(Value::Object)
        }
        other => Err(invalid(path, format!("未知の値型: {}", other))),
    }
}

fn decode_integer(path: &str, inner: &Value) -> Result<Value, EventDecodeError> {
    // JSON表現ではint64は10進文字列
    let parsed = match inner {
        Value::String(s) => s.parse::<i64>().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    parsed
        .map(Value::from)
        .ok_or_else(|| invalid(path, "integerValueがint64ではありません"))
}

fn decode_double(path: &str, inner: &Value) -> Result<Value, EventDecodeError> {
    let parsed = match inner {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    let value = parsed.ok_or_else(|| invalid(path, "doubleValueが数値ではありません"))?;
    // NaN/InfinityはJSONで表現できないためnull
    Ok(Number::from_f64(value).map_or(Value::Null, Value::Number))
}

fn decode_geo_point(path: &str, inner: &Value) -> Result<Value, EventDecodeError> {
    // proto3 JSONでは0の座標は省略される
    let coordinate = |name: &str| match inner.get(name) {
        None => Ok(0.0),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| invalid(path, format!("geoPointValue.{}が数値ではありません", name))),
    };
    let lat = coordinate("latitude")?;
    let lng = coordinate("longitude")?;

    let mut point = Payload::new();
    point.insert("lat".to_string(), Number::from_f64(lat).map_or(Value::Null, Value::Number));
    point.insert("lng".to_string(), Number::from_f64(lng).map_or(Value::Null, Value::Number));
    Ok(Value::Object(point))
}

fn decode_array(path: &str, inner: &Value) -> Result<Value, EventDecodeError> {
    let values = match inner.get("values") {
        None | Some(Value::Null) => return Ok(Value::Array(Vec::new())),
        Some(Value::Array(values)) => values,
        Some(_) => return Err(invalid(path, "arrayValue.valuesが配列ではありません")),
    };
    values
        .iter()
        .enumerate()
        .map(|(i, v)| decode_value(&format!("{}[{}]", path, i), v))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ChangeKind;
    use serde_json::json;

    const NAME: &str = "projects/demo/databases/(default)/documents/users/u1";

    fn parse(value: Value) -> FirestoreEvent {
        serde_json::from_value(value).expect("イベントのパースに失敗")
    }

    // ==================== document_id テスト ====================

    #[test]
    fn test_document_id_from_resource_name() {
        assert_eq!(document_id(NAME), Some("u1".to_string()));
    }

    #[test]
    fn test_document_id_from_subject() {
        assert_eq!(document_id("documents/users/u2"), Some("u2".to_string()));
    }

    #[test]
    fn test_document_id_subcollection() {
        assert_eq!(
            document_id("documents/users/u1/posts/p9"),
            Some("p9".to_string())
        );
    }

    #[test]
    fn test_document_id_empty() {
        assert_eq!(document_id(""), None);
        assert_eq!(document_id("documents/"), None);
    }

    // ==================== decode_value テスト ====================

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode_value("f", &json!({"nullValue": null})), Ok(Value::Null));
        assert_eq!(decode_value("f", &json!({"booleanValue": true})), Ok(json!(true)));
        assert_eq!(decode_value("f", &json!({"integerValue": "30"})), Ok(json!(30)));
        assert_eq!(decode_value("f", &json!({"doubleValue": 1.5})), Ok(json!(1.5)));
        assert_eq!(
            decode_value("f", &json!({"stringValue": "Alice"})),
            Ok(json!("Alice"))
        );
        assert_eq!(
            decode_value("f", &json!({"timestampValue": "2024-01-01T00:00:00Z"})),
            Ok(json!("2024-01-01T00:00:00Z"))
        );
        assert_eq!(
            decode_value("f", &json!({"referenceValue": NAME})),
            Ok(json!(NAME))
        );
    }

    #[test]
    fn test_decode_double_non_finite_is_null() {
        assert_eq!(decode_value("f", &json!({"doubleValue": "NaN"})), Ok(Value::Null));
        assert_eq!(
            decode_value("f", &json!({"doubleValue": "Infinity"})),
            Ok(Value::Null)
        );
    }

    #[test]
    fn test_decode_geo_point() {
        let decoded = decode_value(
            "loc",
            &json!({"geoPointValue": {"latitude": 35.5, "longitude": 139.25}}),
        );
        assert_eq!(decoded, Ok(json!({"lat": 35.5, "lng": 139.25})));
    }

    #[test]
    fn test_decode_geo_point_omitted_zero() {
        let decoded = decode_value("loc", &json!({"geoPointValue": {"latitude": 10.0}}));
        assert_eq!(decoded, Ok(json!({"lat": 10.0, "lng": 0.0})));
    }

    #[test]
    fn test_decode_array_and_map() {
        let decoded = decode_value(
            "f",
            &json!({"mapValue": {"fields": {
                "tags": {"arrayValue": {"values": [{"stringValue": "a"}, {"integerValue": "2"}]}},
                "empty": {"arrayValue": {}},
                "inner": {"mapValue": {}}
            }}}),
        );
        assert_eq!(
            decoded,
            Ok(json!({"tags": ["a", 2], "empty": [], "inner": {}}))
        );
    }

    #[test]
    fn test_decode_map_preserves_field_order() {
        let decoded = decode_value(
            "f",
            &json!({"mapValue": {"fields": {
                "z": {"integerValue": "1"},
                "a": {"integerValue": "2"}
            }}}),
        )
        .unwrap();
        let keys: Vec<&String> = decoded.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }

    #[test]
    fn test_decode_unknown_type() {
        let result = decode_value("f", &json!({"vectorValue": {}}));
        assert!(matches!(
            result,
            Err(EventDecodeError::InvalidValue { field, reason })
                if field == "f" && reason.contains("vectorValue")
        ));
    }

    #[test]
    fn test_decode_invalid_integer_reports_nested_path() {
        let result = decode_value(
            "stats",
            &json!({"mapValue": {"fields": {"count": {"integerValue": "abc"}}}}),
        );
        assert!(matches!(
            result,
            Err(EventDecodeError::InvalidValue { field, .. }) if field == "stats.count"
        ));
    }

    #[test]
    fn test_decode_invalid_array_element_reports_index() {
        let result = decode_value(
            "tags",
            &json!({"arrayValue": {"values": [{"stringValue": "a"}, {"stringValue": 1}]}}),
        );
        assert!(matches!(
            result,
            Err(EventDecodeError::InvalidValue { field, .. }) if field == "tags[1]"
        ));
    }

    #[test]
    fn test_decode_rejects_multiple_keys() {
        let result = decode_value("f", &json!({"stringValue": "a", "integerValue": "1"}));
        assert!(matches!(result, Err(EventDecodeError::InvalidValue { .. })));
    }

    // ==================== into_change_event テスト ====================

    #[test]
    fn test_create_event() {
        let event = parse(json!({
            "value": {
                "name": NAME,
                "fields": {
                    "name": {"stringValue": "Alice"},
                    "age": {"integerValue": "30"}
                }
            }
        }));

        let change = event.into_change_event(None).expect("変換に失敗");

        assert_eq!(change.kind(), ChangeKind::Create);
        assert!(!change.before().exists());
        assert_eq!(change.after().id(), "u1");
        assert_eq!(
            Value::Object(change.after().data().unwrap().clone()),
            json!({"name": "Alice", "age": 30})
        );
    }

    #[test]
    fn test_update_event() {
        let event = parse(json!({
            "oldValue": {"name": NAME, "fields": {"name": {"stringValue": "Old"}}},
            "value": {"name": NAME, "fields": {"name": {"stringValue": "New"}}},
            "updateMask": {"fieldPaths": ["name"]}
        }));

        let change = event.into_change_event(None).expect("変換に失敗");

        assert_eq!(change.kind(), ChangeKind::Update);
        assert_eq!(change.before().data().unwrap()["name"], "Old");
        assert_eq!(change.after().data().unwrap()["name"], "New");
    }

    #[test]
    fn test_delete_event_with_empty_value() {
        let event = parse(json!({
            "oldValue": {"name": NAME, "fields": {"name": {"stringValue": "Alice"}}},
            "value": {}
        }));

        let change = event.into_change_event(None).expect("変換に失敗");

        assert_eq!(change.kind(), ChangeKind::Delete);
        assert!(!change.after().exists());
        assert_eq!(change.before().key(), "u1");
    }

    #[test]
    fn test_existing_document_without_fields() {
        // nameのみ（フィールドなし）のドキュメントは存在する空ドキュメント
        let event = parse(json!({"value": {"name": NAME}}));

        let change = event.into_change_event(None).expect("変換に失敗");

        assert!(change.after().exists());
        assert!(change.after().data().unwrap().is_empty());
    }

    #[test]
    fn test_subject_fallback() {
        let event = parse(json!({"value": {"fields": {"a": {"booleanValue": false}}}}));

        let change = event
            .into_change_event(Some("documents/items/i7"))
            .expect("変換に失敗");

        assert_eq!(change.after().id(), "i7");
    }

    #[test]
    fn test_missing_document_name() {
        let event = parse(json!({"value": {"fields": {"a": {"booleanValue": false}}}}));
        assert_eq!(
            event.into_change_event(None),
            Err(EventDecodeError::MissingDocumentName)
        );
    }

    #[test]
    fn test_invalid_field_fails_conversion() {
        let event = parse(json!({
            "value": {"name": NAME, "fields": {"age": {"integerValue": "x"}}}
        }));
        assert!(matches!(
            event.into_change_event(None),
            Err(EventDecodeError::InvalidValue { field, .. }) if field == "age"
        ));
    }

    #[test]
    fn test_error_display() {
        let error = EventDecodeError::InvalidValue {
            field: "age".to_string(),
            reason: "bad".to_string(),
        };
        assert!(error.to_string().contains("age"));
        assert!(EventDecodeError::MissingDocumentName
            .to_string()
            .contains("ドキュメント名"));
    }
}
