// ドキュメント形状の判定
//
// ドキュメントをそのまま1レコードにする（Flat）か、
// トップレベルの各エントリをサブドキュメントとして展開する（Nested）かを決める。

use super::document_snapshot::Payload;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// レコード整形時の構造エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    /// フィールドが1つもない（または存在しない）ドキュメント
    #[error("ドキュメントが空です: {id}")]
    EmptyDocument {
        /// ドキュメントID
        id: String,
    },

    /// Nestedと判定されたがマップでないエントリを含む
    #[error("ネスト構造が一貫していません: エントリ {key} がマップではありません")]
    InconsistentNesting {
        /// マップでなかったエントリのキー
        key: String,
    },
}

/// ドキュメントの形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// フィールドがそのまま1レコードになる
    Flat,
    /// トップレベルの各エントリが1レコードになる
    Nested,
}

impl DocumentShape {
    /// 先頭エントリの値から形状を推定する
    ///
    /// 列挙順で最初の値がマップならNested、それ以外はFlat。
    /// 配列、タイムスタンプ（RFC 3339文字列）、参照（パス文字列）はプリミティブとして扱う。
    /// 位置情報は`{lat, lng}`マップにデコードされるためNestedと判定される。
    /// 1フィールドだけを見て文書全体を判定するため、結果は実装定義であり
    /// フィールドの列挙順に依存する。空の場合は`None`。
    pub fn detect(payload: &Payload) -> Option<Self> {
        payload.values().next().map(|first| {
            if first.is_object() {
                DocumentShape::Nested
            } else {
                DocumentShape::Flat
            }
        })
    }
}

impl fmt::Display for DocumentShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentShape::Flat => write!(f, "flat"),
            DocumentShape::Nested => write!(f, "nested"),
        }
    }
}

/// 形状の決定方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShapePolicy {
    /// 先頭エントリから推定し、Nestedの場合は全エントリを検証する
    #[default]
    Detect,
    /// 形状を明示的に指定する
    Declared(DocumentShape),
}

impl ShapePolicy {
    /// ペイロードの形状を決定する
    ///
    /// # エラー
    /// - `EmptyDocument`: ペイロードが空
    /// - `InconsistentNesting`: Nestedなのにマップでないエントリがある
    pub fn resolve(&self, id: &str, payload: &Payload) -> Result<DocumentShape, ShapeError> {
        let detected = DocumentShape::detect(payload).ok_or_else(|| ShapeError::EmptyDocument {
            id: id.to_string(),
        })?;

        let shape = match self {
            ShapePolicy::Detect => detected,
            ShapePolicy::Declared(shape) => *shape,
        };

        if shape == DocumentShape::Nested {
            if let Some((key, _)) = payload.iter().find(|(_, value)| !value.is_object()) {
                return Err(ShapeError::InconsistentNesting { key: key.clone() });
            }
        }

        Ok(shape)
    }
}

impl fmt::Display for ShapePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapePolicy::Detect => write!(f, "detect"),
            ShapePolicy::Declared(shape) => shape.fmt(f),
        }
    }
}

/// ShapePolicyのパースエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("不明なドキュメント形状: {0}（detect, flat, nestedのいずれか）")]
pub struct ParseShapePolicyError(pub String);

impl FromStr for ShapePolicy {
    type Err = ParseShapePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "detect" => Ok(ShapePolicy::Detect),
            "flat" => Ok(ShapePolicy::Declared(DocumentShape::Flat)),
            "nested" => Ok(ShapePolicy::Declared(DocumentShape::Nested)),
            _ => Err(ParseShapePolicyError(s.to_string())),
        }
    }
}
