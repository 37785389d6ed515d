use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::TransportError;

#[derive(Deserialize)]
struct Envelope<T> {
    data: Container<T>,
}

#[derive(Deserialize)]
struct Container<T> {
    results: Vec<T>,
}

/// Pull `data.results` out of a response body.
pub(crate) fn parse_results<T: DeserializeOwned>(body: &str) -> Result<Vec<T>, TransportError> {
    serde_json::from_str::<Envelope<T>>(body)
        .map(|envelope| envelope.data.results)
        .map_err(|e| TransportError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CharacterRecord;

    #[test]
    fn test_parse_results_ignores_envelope_noise() {
        let body = r#"{
            "code": 200,
            "attributionText": "Data provided by Marvel.",
            "data": {"offset": 0, "limit": 50, "total": 1, "count": 1,
                     "results": [{"id": 1011334, "name": "3-D Man"}]}
        }"#;

        let records: Vec<CharacterRecord> = parse_results(body).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "3-D Man");
    }

    #[test]
    fn test_parse_results_rejects_missing_data() {
        let err = parse_results::<CharacterRecord>(r#"{"code": 409, "status": "bad"}"#).unwrap_err();

        assert!(matches!(err, TransportError::Decode(_)));
    }
}
