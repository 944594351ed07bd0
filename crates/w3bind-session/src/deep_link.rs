//! `w3ds://sign` deep links.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use url::form_urlencoded::byte_serialize;
use w3bind_types::{Ename, SessionKind};

/// Payload embedded in the `data` parameter. The wallet shows `message` and
/// signs it verbatim.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LinkData<'a> {
    message: &'a str,
    session_id: &'a str,
    kind: &'static str,
    target_ename: &'a Ename,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_signer: Option<&'a Ename>,
}

/// Builds the deep link a wallet opens to sign for `session_id`.
///
/// Shape: `w3ds://sign?session=<id>&data=<base64 JSON>&redirect_uri=<callback>`,
/// with every parameter percent-encoded.
pub fn build(
    session_id: &str,
    kind: SessionKind,
    message: &str,
    target: &Ename,
    expected_signer: Option<&Ename>,
    callback_url: &str,
) -> Result<String, serde_json::Error> {
    let data = serde_json::to_vec(&LinkData {
        message,
        session_id,
        kind: kind.as_str(),
        target_ename: target,
        expected_signer,
    })?;
    let data = STANDARD.encode(data);

    Ok(format!(
        "w3ds://sign?session={}&data={}&redirect_uri={}",
        encode(session_id),
        encode(&data),
        encode(callback_url),
    ))
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use url::Url;

    #[test]
    fn link_round_trips_through_a_url_parser() {
        let target = Ename::normalize("alice").unwrap();
        let link = build(
            "abc-123",
            SessionKind::Sign,
            "abc-123",
            &target,
            None,
            "https://platform.example/api/signing/callback?x=1",
        )
        .unwrap();
        assert!(link.starts_with("w3ds://sign?session=abc-123&data="));

        let parsed = Url::parse(&link).unwrap();
        let params: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["session"], "abc-123");
        assert_eq!(
            params["redirect_uri"],
            "https://platform.example/api/signing/callback?x=1"
        );

        let data: Value = serde_json::from_slice(&STANDARD.decode(&params["data"]).unwrap()).unwrap();
        assert_eq!(data["message"], "abc-123");
        assert_eq!(data["sessionId"], "abc-123");
        assert_eq!(data["targetEname"], "@alice");
        assert!(data.get("expectedSigner").is_none());
    }
}
