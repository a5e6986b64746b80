// Algoliaレコードとレコード整形
//
// Algoliaは各レコードに"objectID"を要求する。未指定だと自動採番されるため、
// 同期を保つためにドキュメントIDまたはネストエントリのキーを自前で設定する。

use super::document_shape::{DocumentShape, ShapeError, ShapePolicy};
use super::document_snapshot::{DocumentSnapshot, Payload};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

/// レコード識別子フィールド名
pub const OBJECT_ID_FIELD: &str = "objectID";

/// Algoliaに送信するフラットなレコード
///
/// `fields`は`objectID`キーを含まない。シリアライズ時に`objectID`が先頭に
/// ちょうど1回だけ出力される。
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    object_id: String,
    fields: Payload,
}

impl Record {
    /// 新しいレコードを作成
    ///
    /// `fields`に`objectID`が含まれていても識別子が優先される。
    pub fn new(object_id: impl Into<String>, mut fields: Payload) -> Self {
        fields.shift_remove(OBJECT_ID_FIELD);
        Self {
            object_id: object_id.into(),
            fields,
        }
    }

    /// レコード識別子を取得
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// 識別子以外のフィールドを取得
    pub fn fields(&self) -> &Payload {
        &self.fields
    }

    /// `objectID`を含むJSONオブジェクトに変換
    pub fn to_value(&self) -> Value {
        let mut map = Payload::with_capacity(self.fields.len() + 1);
        map.insert(
            OBJECT_ID_FIELD.to_string(),
            Value::String(self.object_id.clone()),
        );
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(OBJECT_ID_FIELD, &self.object_id)?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// ドキュメントスナップショットをレコード列に整形する
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordShaper {
    policy: ShapePolicy,
}

impl RecordShaper {
    /// 形状ポリシーを指定して作成
    pub fn new(policy: ShapePolicy) -> Self {
        Self { policy }
    }

    /// スナップショットを1件以上のレコードに整形する
    ///
    /// - Flat: ペイロード全体に`objectID = スナップショットID`を付与した1レコード
    /// - Nested: トップレベルの各エントリにつき、`objectID = エントリのキー`と
    ///   エントリ自身のフィールドを浅くマージした1レコード
    ///
    /// # エラー
    /// - `EmptyDocument`: ドキュメントが存在しない、またはフィールドが空
    /// - `InconsistentNesting`: Nestedなのにマップでないエントリがある
    pub fn shape(&self, snapshot: &DocumentSnapshot) -> Result<Vec<Record>, ShapeError> {
        let payload = snapshot.data().ok_or_else(|| ShapeError::EmptyDocument {
            id: snapshot.id().to_string(),
        })?;

        match self.policy.resolve(snapshot.id(), payload)? {
            DocumentShape::Flat => Ok(vec![Record::new(snapshot.id(), payload.clone())]),
            DocumentShape::Nested => payload
                .iter()
                .map(|(key, value)| match value {
                    Value::Object(fields) => Ok(Record::new(key.clone(), fields.clone())),
                    _ => Err(ShapeError::InconsistentNesting { key: key.clone() }),
                })
                .collect(),
        }
    }
}
