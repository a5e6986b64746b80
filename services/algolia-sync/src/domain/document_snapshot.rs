// ドキュメントスナップショット
//
// トリガー発火時点でのFirestoreドキュメントの読み取り専用ビュー。
// ドキュメントIDと、列挙順を保持したフィールドマップを公開する。

use serde_json::{Map, Value};

/// ドキュメントのフィールドマップ（Firestoreから受信した順序を保持）
pub type Payload = Map<String, Value>;

/// Firestoreドキュメントスナップショット
///
/// `data`が`None`の場合はドキュメントが存在しない（作成前または削除後）。
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    /// ドキュメントID（パスの最終セグメント）
    id: String,
    /// フィールドマップ（存在しない場合はNone）
    data: Option<Payload>,
}

impl DocumentSnapshot {
    /// 存在するドキュメントのスナップショットを作成
    pub fn new(id: impl Into<String>, data: Payload) -> Self {
        Self {
            id: id.into(),
            data: Some(data),
        }
    }

    /// 存在しないドキュメントのスナップショットを作成
    pub fn missing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: None,
        }
    }

    /// ドキュメントが存在するか
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// ドキュメントIDを取得
    pub fn id(&self) -> &str {
        &self.id
    }

    /// ドキュメントキーを取得（`id`と同じ値）
    pub fn key(&self) -> &str {
        &self.id
    }

    /// フィールドマップを取得
    pub fn data(&self) -> Option<&Payload> {
        self.data.as_ref()
    }
}
