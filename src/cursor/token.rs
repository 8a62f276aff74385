//! Opaque continuation token encoding.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use super::{Cursor, CursorError};

pub fn encode(cursor: &Cursor) -> String {
    let bytes = serde_json::to_vec(cursor).expect("cursor serialization should not fail");
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode(token: &str) -> Result<Cursor, CursorError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| CursorError::InvalidToken(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| CursorError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Direction;
    use crate::resource::{Identity, Resource};
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        id: String,
        weight: f64,
    }

    impl Resource for Entry {
        const TYPE_NAME: &'static str = "entries";
        fn identity(&self) -> Identity {
            Identity::new().with("id", &self.id)
        }
    }

    #[test]
    fn round_trip() {
        let cursor = Cursor::new::<Entry>("weight", Direction::Descending)
            .with_filter("shelf", &"a")
            .with_since(&1.5)
            .with_page_size(10);

        let token = encode(&cursor);
        let back = decode(&token).unwrap();
        assert_eq!(back, cursor);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            decode("not!base64!"),
            Err(CursorError::InvalidToken(_))
        ));

        let bytes = URL_SAFE_NO_PAD.encode(b"{\"not\":\"a cursor\"}");
        assert!(matches!(decode(&bytes), Err(CursorError::Decode(_))));
    }

    #[test]
    fn token_is_opaque_text() {
        let cursor = Cursor::new::<Entry>("weight", Direction::Ascending);
        let token = encode(&cursor);
        assert!(!token.contains('='));
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
